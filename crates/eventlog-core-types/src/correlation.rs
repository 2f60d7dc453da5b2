//! Correlation types for pipeline and write tracking
//!
//! `PipelineId` tags every log line emitted by one pipeline instance so that
//! several pipelines in the same process can be told apart. `WriteId` is the
//! monotonic sequence number that keys the in-flight registry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one pipeline instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineId(String);

impl PipelineId {
    /// Generate a new random PipelineId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for PipelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence number assigned to a write at submission time
///
/// Ids are handed out in submission order, so comparing two ids tells which
/// `log` call was accepted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WriteId(u64);

impl WriteId {
    /// Wrap a raw sequence value
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Get the raw sequence value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WriteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "w{}", self.0)
    }
}
