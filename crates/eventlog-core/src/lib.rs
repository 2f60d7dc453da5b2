//! Eventlog Core - audit event model and structural delta engine
//!
//! This crate provides the pure building blocks of the event pipeline:
//! - Policy-driven structural deltas between two versions of an object graph
//! - The event data model and its stable serialized form
//! - Loggable-object conversion, attribute merging and dotted-path access
//! - Log behaviour policy and payload composition
//! - The error facility and the structured logging facility
//!
//! Nothing in here performs I/O; sinks and the write pipeline live in
//! `eventlog-pipeline`.

pub mod attributes;
pub mod behaviour;
pub mod delta;
pub mod errors;
pub mod event;
pub mod loggable;
pub mod logging_facility;
pub mod payload;

// Re-export commonly used types
pub use attributes::{merge_attributes, Attribute};
pub use behaviour::{ActorKind, Behaviour, BehaviourTable, LoggingOptions, Strictness};
pub use delta::{diff, Delta, DeltaEngine, DeltaPolicy, DeltaValue, DELETED};
pub use errors::{EventLogError, ExError, ExErrorKind, Result};
pub use event::{Action, Event, EventRecord};
pub use loggable::loggable_object;
pub use payload::{ObjectChange, PayloadComposer};
