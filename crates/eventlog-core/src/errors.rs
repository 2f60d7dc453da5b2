use eventlog_core_types::{PipelineId, WriteId};
use thiserror::Error;

/// Result type alias using EventLogError
pub type Result<T> = std::result::Result<T, EventLogError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// raised by the eventlog crates. Each kind maps to a stable error code that
/// can be used for programmatic error handling, testing, and for the error
/// hook that sink failures are reported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Configuration
    MissingConfiguration,
    InvalidConfiguration,
    NotInitialised,
    UnknownSinkScheme,

    // Caller input
    InvalidInput,
    Serialization,

    // Sink
    Sink,
    SinkClosed,
    Io,

    // Lifecycle
    Stopped,
    TransitionFailed,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::MissingConfiguration => "ERR_MISSING_CONFIGURATION",
            ExErrorKind::InvalidConfiguration => "ERR_INVALID_CONFIGURATION",
            ExErrorKind::NotInitialised => "ERR_NOT_INITIALISED",
            ExErrorKind::UnknownSinkScheme => "ERR_UNKNOWN_SINK_SCHEME",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Sink => "ERR_SINK",
            ExErrorKind::SinkClosed => "ERR_SINK_CLOSED",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Stopped => "ERR_STOPPED",
            ExErrorKind::TransitionFailed => "ERR_TRANSITION_FAILED",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether this kind belongs to the configuration class
    ///
    /// Configuration errors are raised synchronously at the call that needed
    /// the configuration; they never reach a sink.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ExErrorKind::MissingConfiguration
                | ExErrorKind::InvalidConfiguration
                | ExErrorKind::NotInitialised
                | ExErrorKind::UnknownSinkScheme
        )
    }
}

/// Canonical structured error type
///
/// This error type provides a structured representation of errors with
/// classification fields for programmatic handling and rich context for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    sink: Option<String>,
    write_id: Option<WriteId>,
    pipeline_id: Option<PipelineId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            sink: None,
            write_id: None,
            pipeline_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add sink name context
    pub fn with_sink(mut self, sink: impl Into<String>) -> Self {
        self.sink = Some(sink.into());
        self
    }

    /// Add the id of the write this error settled
    pub fn with_write_id(mut self, write_id: WriteId) -> Self {
        self.write_id = Some(write_id);
        self
    }

    /// Add pipeline id context
    pub fn with_pipeline_id(mut self, pipeline_id: PipelineId) -> Self {
        self.pipeline_id = Some(pipeline_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the sink name context, if any
    pub fn sink(&self) -> Option<&str> {
        self.sink.as_deref()
    }

    /// Get the write id context, if any
    pub fn write_id(&self) -> Option<WriteId> {
        self.write_id
    }

    /// Get the pipeline id context, if any
    pub fn pipeline_id(&self) -> Option<&PipelineId> {
        self.pipeline_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(sink) = &self.sink {
            write!(f, " (sink: {})", sink)?;
        }
        if let Some(write_id) = self.write_id {
            write!(f, " (write: {})", write_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for event logging operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventLogError {
    // ===== Configuration Errors =====
    /// A lifecycle operation was given no configuration
    #[error("Pipeline should be initialised with a configuration")]
    MissingConfiguration,

    /// Configuration failed validation
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// `log` was called before the pipeline was configured
    #[error("Pipeline should be initialised before use")]
    NotInitialised,

    /// The sink target names a scheme no adapter is registered for
    #[error("No sink adapter registered for scheme '{scheme}'")]
    UnknownSinkScheme { scheme: String },

    // ===== Caller Input Errors =====
    /// Caller-supplied value has the wrong shape
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Object could not be converted into a loggable form
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    // ===== Sink Errors =====
    /// The sink rejected a write or failed to finish
    #[error("Sink '{sink}' failed: {message}")]
    Sink { sink: String, message: String },

    /// The sink task terminated before the write settled
    #[error("Sink '{sink}' closed before the write settled")]
    SinkClosed { sink: String },

    /// Filesystem failure in a file-backed sink
    #[error("I/O error during {op}: {message}")]
    Io { op: String, message: String },

    // ===== Lifecycle Errors =====
    /// The pipeline has been stopped
    #[error("Pipeline is stopped")]
    Stopped,

    /// A reconfigure or stop sequence failed part-way
    #[error("{op} failed: {message}")]
    TransitionFailed { op: String, message: String },

    // ===== Generic Errors =====
    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EventLogError {
    /// Build an I/O error for the given operation
    pub fn io(op: impl Into<String>, err: std::io::Error) -> Self {
        EventLogError::Io {
            op: op.into(),
            message: err.to_string(),
        }
    }

    /// Build a sink error for the named sink
    pub fn sink(sink: impl Into<String>, message: impl Into<String>) -> Self {
        EventLogError::Sink {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// The canonical kind of this error
    pub fn kind(&self) -> ExErrorKind {
        match self {
            EventLogError::MissingConfiguration => ExErrorKind::MissingConfiguration,
            EventLogError::InvalidConfiguration { .. } => ExErrorKind::InvalidConfiguration,
            EventLogError::NotInitialised => ExErrorKind::NotInitialised,
            EventLogError::UnknownSinkScheme { .. } => ExErrorKind::UnknownSinkScheme,
            EventLogError::InvalidInput { .. } => ExErrorKind::InvalidInput,
            EventLogError::Serialization { .. } => ExErrorKind::Serialization,
            EventLogError::Sink { .. } => ExErrorKind::Sink,
            EventLogError::SinkClosed { .. } => ExErrorKind::SinkClosed,
            EventLogError::Io { .. } => ExErrorKind::Io,
            EventLogError::Stopped => ExErrorKind::Stopped,
            EventLogError::TransitionFailed { .. } => ExErrorKind::TransitionFailed,
            EventLogError::Internal { .. } => ExErrorKind::Internal,
        }
    }
}

/// Conversion from EventLogError to ExError
///
/// Domain errors carry their context as fields; the canonical error lifts
/// the sink name and operation into structured slots.
impl From<EventLogError> for ExError {
    fn from(err: EventLogError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        match err {
            EventLogError::Sink { sink, .. } | EventLogError::SinkClosed { sink } => {
                ExError::new(kind).with_sink(sink).with_message(message)
            }

            EventLogError::Io { op, .. } | EventLogError::TransitionFailed { op, .. } => {
                ExError::new(kind).with_op(op).with_message(message)
            }

            EventLogError::NotInitialised | EventLogError::Stopped => {
                ExError::new(kind).with_op("log").with_message(message)
            }

            _ => ExError::new(kind).with_message(message),
        }
    }
}

impl From<&EventLogError> for ExError {
    fn from(err: &EventLogError) -> Self {
        err.clone().into()
    }
}

/// Conversion from serde_json::Error to EventLogError
impl From<serde_json::Error> for EventLogError {
    fn from(err: serde_json::Error) -> Self {
        EventLogError::Serialization {
            message: err.to_string(),
        }
    }
}
