//! Event data model.
//!
//! An [`Event`] is built by the caller right before it is logged. The
//! pipeline normalizes it into an [`EventRecord`], the immutable form that
//! sinks persist. Serialized field names are a stable contract with log
//! consumers.

use crate::attributes::{attributes_to_value, Attribute};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Lifecycle action that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Updated,
    Deleted,
    Fetched,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Created,
        Action::Updated,
        Action::Deleted,
        Action::Fetched,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Deleted => "deleted",
            Action::Fetched => "fetched",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action '{}'", s))
    }
}

/// An event as submitted by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    object: Value,
    object_type: String,
    action: Action,
    actor: Option<Value>,
    when: Option<DateTime<Utc>>,
    attributes: Option<Value>,
    call_stack: Option<Vec<String>>,
}

impl Event {
    /// Create an event for `object` of type `object_type`
    pub fn new(object: Value, object_type: impl Into<String>, action: Action) -> Self {
        Self {
            object,
            object_type: object_type.into(),
            action,
            actor: None,
            when: None,
            attributes: None,
            call_stack: None,
        }
    }

    /// Set the actor responsible for the action
    pub fn with_actor(mut self, actor: Value) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Set the time of the action (defaults to the submission time)
    pub fn with_when(mut self, when: DateTime<Utc>) -> Self {
        self.when = Some(when);
        self
    }

    /// Attach attributes
    pub fn with_attributes(mut self, attributes: Vec<Attribute>) -> Self {
        self.attributes = Some(attributes_to_value(attributes));
        self
    }

    /// Attach attributes in an already-serialized, caller-defined shape
    pub fn with_attributes_value(mut self, attributes: Value) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Attach the call stack that triggered the action
    pub fn with_call_stack(mut self, call_stack: Vec<String>) -> Self {
        self.call_stack = Some(call_stack);
        self
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    /// Normalize into the persisted record using the current time
    pub fn normalize(self) -> EventRecord {
        self.normalize_at(Utc::now())
    }

    /// Normalize into the persisted record, defaulting `when` to `now`
    pub fn normalize_at(self, now: DateTime<Utc>) -> EventRecord {
        EventRecord {
            object: self.object,
            object_type: self.object_type,
            action: self.action,
            actor: self.actor.unwrap_or(Value::Null),
            when: self.when.unwrap_or(now),
            attributes: self.attributes,
            call_stack: self.call_stack,
        }
    }
}

/// Normalized event as written to sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub object: Value,
    pub object_type: String,
    pub action: Action,
    #[serde(default)]
    pub actor: Value,
    pub when: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_stack: Option<Vec<String>>,
}
