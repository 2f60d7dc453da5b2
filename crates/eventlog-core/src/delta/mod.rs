//! Structural delta engine.
//!
//! Computes the minimal, policy-driven difference between two versions of a
//! JSON object graph. The result records new values, removed keys (with the
//! `$DELETED` sentinel) and nested sub-deltas, and is what the payload
//! composer stores under `__delta`.
//!
//! ## Entry point
//!
//! ```
//! use eventlog_core::delta::{diff, DeltaPolicy};
//! use serde_json::json;
//!
//! let delta = diff(&json!({"a": 1, "b": 2}), &json!({"a": 1, "b": 3}), &DeltaPolicy::new());
//! assert_eq!(delta.to_value(), json!({"b": 3}));
//! ```
//!
//! ## Guarantees
//!
//! - **Identity**: diffing a graph against itself yields an empty delta.
//! - **No empty sub-objects**: nested deltas are only emitted when non-empty.
//! - **Whole-value arrays**: arrays are replaced, never diffed per index.
//! - **Determinism**: keys are kept in sorted order, so identical inputs give
//!   identical serialized deltas.

pub mod engine;
pub mod model;

pub use engine::{diff, diff_serializable, DeltaEngine};
pub use model::{
    Delta, DeltaPolicy, DeltaValue, DELETED, DELETED_KEYS_FIELD, IDENTITY_PATHS, REFERENCE_KEY,
};
