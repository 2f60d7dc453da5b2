//! Lifecycle diagnostics for pipeline operations
//!
//! `open_sink`, `reconfigure` and `stop` each bracket their work with a
//! `start` event and either `end` (with `duration_ms`) or `end_error`
//! (with the error kind and stable code). Extra fields such as
//! `pipeline_id` or `sink` follow the fixed ones.

/// Emit the `start` event of `op`
///
/// # Example
///
/// ```
/// # use eventlog_core::log_op_start;
/// log_op_start!("reconfigure");
/// log_op_start!("reconfigure", sink = "jsonl:/var/log/events.jsonl");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = eventlog_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = eventlog_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Emit the `end` event of `op`; `duration_ms` is required
///
/// # Example
///
/// ```
/// # use eventlog_core::log_op_end;
/// log_op_end!("stop", duration_ms = 42);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = eventlog_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = eventlog_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Emit the `end_error` event of `op` at error level
///
/// `err` is anything convertible into `ExError`, such as `EventLogError`
/// or `&EventLogError`.
///
/// # Example
///
/// ```
/// # use eventlog_core::{log_op_error, errors::EventLogError};
/// let err = EventLogError::sink("memory", "connection reset");
/// log_op_error!("write", &err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        use $crate::errors::ExError;
        let ex_err: ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = eventlog_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
            message = %ex_err,
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        use $crate::errors::ExError;
        let ex_err: ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = eventlog_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
            message = %ex_err,
            $($field)*
        );
    }};
}
