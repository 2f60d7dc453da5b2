//! Canonical schema constants for structured logging and event payloads
//!
//! These constants keep log field names and persisted payload field names
//! consistent across the workspace.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_PIPELINE_ID: &str = "pipeline_id";
pub const FIELD_WRITE_ID: &str = "write_id";
pub const FIELD_SINK: &str = "sink";

// Sizes
pub const FIELD_IN_FLIGHT: &str = "in_flight";
pub const FIELD_BUFFERED: &str = "buffered";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

// Persisted event payload fields (stable contract with log consumers)
pub const PAYLOAD_OBJECT: &str = "object";
pub const PAYLOAD_OBJECT_TYPE: &str = "objectType";
pub const PAYLOAD_ACTION: &str = "action";
pub const PAYLOAD_ACTOR: &str = "actor";
pub const PAYLOAD_WHEN: &str = "when";
pub const PAYLOAD_ATTRIBUTES: &str = "attributes";
pub const PAYLOAD_CALL_STACK: &str = "callStack";

// Logged object envelope keys
pub const OBJECT_SNAPSHOT: &str = "__snapshot";
pub const OBJECT_DELTA: &str = "__delta";
pub const OBJECT_LOG_BEHAVIOUR: &str = "__logBehaviour";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_accessibility() {
        // Verify all constants are non-empty
        assert!(!FIELD_COMPONENT.is_empty());
        assert!(!FIELD_OP.is_empty());
        assert!(!EVENT_START.is_empty());
        assert!(!EVENT_END.is_empty());
        assert!(!EVENT_END_ERROR.is_empty());
    }

    #[test]
    fn test_event_names_are_distinct() {
        assert_ne!(EVENT_START, EVENT_END);
        assert_ne!(EVENT_START, EVENT_END_ERROR);
        assert_ne!(EVENT_END, EVENT_END_ERROR);
    }

    #[test]
    fn test_payload_fields_are_camel_case() {
        for field in [PAYLOAD_OBJECT_TYPE, PAYLOAD_CALL_STACK] {
            assert!(!field.contains('_'), "{} should be camelCase", field);
        }
    }
}
