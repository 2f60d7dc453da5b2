//! Error hook
//!
//! Sink failures are returned to the one `log` caller concerned and are
//! additionally reported to an `ErrorHook` so that an application can
//! observe them centrally. Lifecycle failures (`reconfigure`, `stop`) are
//! reported the same way.

use eventlog_core::errors::{EventLogError, ExError};
use eventlog_core_types::schema::EVENT_END_ERROR;
use eventlog_core_types::{PipelineId, WriteId};
use std::sync::Arc;

/// Observer of pipeline errors
pub trait ErrorHook: Send + Sync + 'static {
    fn on_error(&self, error: &ExError);
}

impl<F> ErrorHook for F
where
    F: Fn(&ExError) + Send + Sync + 'static,
{
    fn on_error(&self, error: &ExError) {
        self(error)
    }
}

/// Default hook: one `tracing` error event per failure
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorHook;

impl ErrorHook for TracingErrorHook {
    fn on_error(&self, error: &ExError) {
        tracing::error!(
            component = module_path!(),
            op = error.op().unwrap_or("unknown"),
            event = EVENT_END_ERROR,
            err.kind = ?error.kind(),
            err.code = error.code(),
            sink = error.sink().unwrap_or(""),
            write_id = error.write_id().map(|id| id.get()),
            message = %error,
        );
    }
}

/// Hook plus the context every report from one pipeline carries
pub(crate) struct ErrorReporter {
    hook: Arc<dyn ErrorHook>,
    pipeline_id: PipelineId,
}

impl ErrorReporter {
    pub(crate) fn new(hook: Arc<dyn ErrorHook>, pipeline_id: PipelineId) -> Self {
        Self { hook, pipeline_id }
    }

    pub(crate) fn report(
        &self,
        op: &str,
        error: &EventLogError,
        sink: Option<&str>,
        write_id: Option<WriteId>,
    ) {
        let mut ex_err = ExError::from(error)
            .with_op(op)
            .with_pipeline_id(self.pipeline_id.clone());
        if ex_err.sink().is_none() {
            if let Some(sink) = sink {
                ex_err = ex_err.with_sink(sink);
            }
        }
        if let Some(write_id) = write_id {
            ex_err = ex_err.with_write_id(write_id);
        }
        self.hook.on_error(&ex_err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventlog_core::errors::ExErrorKind;
    use std::sync::Mutex;

    #[test]
    fn test_reporter_attaches_context() {
        let seen: Arc<Mutex<Vec<ExError>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let pipeline_id = PipelineId::new();
        let reporter = ErrorReporter::new(
            Arc::new(move |err: &ExError| sink.lock().unwrap().push(err.clone())),
            pipeline_id.clone(),
        );

        reporter.report(
            "write",
            &EventLogError::io("write", std::io::Error::other("disk full")),
            Some("jsonl:/tmp/e.jsonl"),
            Some(WriteId::new(3)),
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind(), ExErrorKind::Io);
        assert_eq!(seen[0].op(), Some("write"));
        assert_eq!(seen[0].sink(), Some("jsonl:/tmp/e.jsonl"));
        assert_eq!(seen[0].write_id(), Some(WriteId::new(3)));
        assert_eq!(seen[0].pipeline_id(), Some(&pipeline_id));
    }

    #[test]
    fn test_reporter_keeps_sink_named_by_error() {
        let seen: Arc<Mutex<Vec<ExError>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let reporter = ErrorReporter::new(
            Arc::new(move |err: &ExError| sink.lock().unwrap().push(err.clone())),
            PipelineId::new(),
        );

        reporter.report("write", &EventLogError::sink("memory", "rejected"), Some("other"), None);

        assert_eq!(seen.lock().unwrap()[0].sink(), Some("memory"));
    }
}
