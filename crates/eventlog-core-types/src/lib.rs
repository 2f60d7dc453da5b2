//! Core types shared across the eventlog crates
//!
//! This crate provides foundational types used by the delta engine,
//! the error facility and the write pipeline:
//!
//! - **Correlation types**: PipelineId, WriteId
//! - **Sensitive data**: Sensitive<T> marker for automatic redaction
//! - **Schema constants**: Canonical log field keys, event names and
//!   event payload field names

pub mod correlation;
pub mod schema;
pub mod sensitive;

pub use correlation::{PipelineId, WriteId};
pub use sensitive::Sensitive;
