use eventlog_core::errors::{EventLogError, ExError, ExErrorKind};
use eventlog_core_types::{PipelineId, WriteId};

#[test]
fn test_sink_error_lifts_sink_name() {
    let err = EventLogError::sink("jsonl:/var/log/events.jsonl", "disk full");

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::Sink);
    assert_eq!(ex_err.code(), "ERR_SINK");
    assert_eq!(ex_err.sink(), Some("jsonl:/var/log/events.jsonl"));
    assert!(ex_err.message().contains("disk full"));
}

#[test]
fn test_sink_closed_distinct_from_sink() {
    let err = EventLogError::SinkClosed {
        sink: "memory".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::SinkClosed);
    assert_eq!(ex_err.code(), "ERR_SINK_CLOSED");
    assert_ne!(ex_err.kind(), ExErrorKind::Sink);
    assert_eq!(ex_err.sink(), Some("memory"));
}

#[test]
fn test_invalid_configuration_structured_fields() {
    let err = EventLogError::InvalidConfiguration {
        reason: "collection must not be empty".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::InvalidConfiguration);
    assert!(ex_err.kind().is_configuration());
    assert!(ex_err.message().contains("Invalid configuration"));
}

#[test]
fn test_error_kind_code_mapping() {
    // Test that each kind has a stable, unique code
    let kinds = vec![
        (ExErrorKind::MissingConfiguration, "ERR_MISSING_CONFIGURATION"),
        (ExErrorKind::InvalidConfiguration, "ERR_INVALID_CONFIGURATION"),
        (ExErrorKind::NotInitialised, "ERR_NOT_INITIALISED"),
        (ExErrorKind::UnknownSinkScheme, "ERR_UNKNOWN_SINK_SCHEME"),
        (ExErrorKind::InvalidInput, "ERR_INVALID_INPUT"),
        (ExErrorKind::Serialization, "ERR_SERIALIZATION"),
        (ExErrorKind::Sink, "ERR_SINK"),
        (ExErrorKind::SinkClosed, "ERR_SINK_CLOSED"),
        (ExErrorKind::Io, "ERR_IO"),
        (ExErrorKind::Stopped, "ERR_STOPPED"),
        (ExErrorKind::TransitionFailed, "ERR_TRANSITION_FAILED"),
        (ExErrorKind::Internal, "ERR_INTERNAL"),
    ];

    let mut seen = std::collections::HashSet::new();
    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
        assert!(seen.insert(kind.code()), "Duplicate code {}", kind.code());
    }
}

#[test]
fn test_not_initialised_is_attributed_to_log() {
    let ex_err: ExError = EventLogError::NotInitialised.into();

    assert_eq!(ex_err.kind(), ExErrorKind::NotInitialised);
    assert_eq!(ex_err.op(), Some("log"));
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
    let err = EventLogError::io("open_sink", io);

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::Io);
    assert_eq!(ex_err.op(), Some("open_sink"));
    assert!(ex_err.message().contains("read-only"));
}

#[test]
fn test_unknown_scheme_conversion() {
    let err = EventLogError::UnknownSinkScheme {
        scheme: "kafka".to_string(),
    };

    let ex_err: ExError = (&err).into();

    assert_eq!(ex_err.code(), "ERR_UNKNOWN_SINK_SCHEME");
    assert!(ex_err.message().contains("kafka"));
    assert_eq!(err.kind(), ExErrorKind::UnknownSinkScheme);
}

#[test]
fn test_ex_error_builder_pattern() {
    let pipeline_id = PipelineId::new();
    let ex_err = ExError::new(ExErrorKind::Sink)
        .with_op("write")
        .with_sink("memory")
        .with_write_id(WriteId::new(12))
        .with_pipeline_id(pipeline_id.clone())
        .with_message("rejected");

    assert_eq!(ex_err.kind(), ExErrorKind::Sink);
    assert_eq!(ex_err.op(), Some("write"));
    assert_eq!(ex_err.sink(), Some("memory"));
    assert_eq!(ex_err.write_id(), Some(WriteId::new(12)));
    assert_eq!(ex_err.pipeline_id(), Some(&pipeline_id));
    assert_eq!(ex_err.message(), "rejected");
}

#[test]
fn test_ex_error_display() {
    let ex_err = ExError::new(ExErrorKind::Stopped)
        .with_op("log")
        .with_message("Pipeline is stopped");

    let display_str = format!("{}", ex_err);

    assert!(display_str.contains("ERR_STOPPED"));
    assert!(display_str.contains("log"));
    assert!(display_str.contains("Pipeline is stopped"));
}

#[test]
fn test_domain_errors_compare_by_value() {
    assert_eq!(EventLogError::Stopped, EventLogError::Stopped);
    assert_ne!(
        EventLogError::sink("a", "x"),
        EventLogError::sink("b", "x")
    );
}
