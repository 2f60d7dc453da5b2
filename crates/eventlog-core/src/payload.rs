//! Payload composition.
//!
//! [`PayloadComposer`] turns an object change into the [`Event`] that gets
//! logged. The logged object always carries the identity paths (`_id`,
//! `__v`) plus, depending on the resolved [`Behaviour`], a `__snapshot` of
//! the current state and/or a `__delta` against the previous state. The
//! behaviour actually applied is recorded under `__logBehaviour`.

#![allow(clippy::result_large_err)]

use crate::behaviour::{sanitize_actor, Behaviour, LoggingOptions};
use crate::delta::{DeltaEngine, DeltaPolicy, IDENTITY_PATHS};
use crate::errors::Result;
use crate::event::{Action, Event};
use crate::loggable::{loggable_object, loggable_value};
use chrono::{DateTime, Utc};
use eventlog_core_types::schema::{OBJECT_DELTA, OBJECT_LOG_BEHAVIOUR, OBJECT_SNAPSHOT};
use serde::Serialize;
use serde_json::{Map, Value};

/// A change to one object, as observed by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectChange {
    model: String,
    action: Action,
    previous: Option<Value>,
    current: Value,
    actor: Option<Value>,
    known_modified: Vec<String>,
    attributes: Option<Value>,
    call_stack: Option<Vec<String>>,
    when: Option<DateTime<Utc>>,
}

impl ObjectChange {
    fn new(model: impl Into<String>, action: Action, previous: Option<Value>, current: Value) -> Self {
        Self {
            model: model.into(),
            action,
            previous,
            current,
            actor: None,
            known_modified: Vec::new(),
            attributes: None,
            call_stack: None,
            when: None,
        }
    }

    pub fn created(model: impl Into<String>, current: Value) -> Self {
        Self::new(model, Action::Created, None, current)
    }

    /// An update from `previous` to `current`
    pub fn updated(model: impl Into<String>, previous: Value, current: Value) -> Self {
        Self::new(model, Action::Updated, Some(previous), current)
    }

    /// A deletion; `current` is the state at the time of removal
    pub fn deleted(model: impl Into<String>, current: Value) -> Self {
        Self::new(model, Action::Deleted, None, current)
    }

    pub fn fetched(model: impl Into<String>, current: Value) -> Self {
        Self::new(model, Action::Fetched, None, current)
    }

    /// Build a change from serializable states
    ///
    /// # Errors
    ///
    /// - `Serialization` if a state cannot be represented as JSON
    pub fn from_serializable<P, C>(
        model: impl Into<String>,
        action: Action,
        previous: Option<&P>,
        current: &C,
    ) -> Result<Self>
    where
        P: Serialize + ?Sized,
        C: Serialize + ?Sized,
    {
        let previous = previous.map(|p| loggable_object(p, None)).transpose()?;
        let current = loggable_object(current, None)?;
        Ok(Self::new(model, action, previous, current))
    }

    pub fn with_actor(mut self, actor: Value) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Paths the caller knows were modified by this change
    pub fn with_known_modified<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_modified = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_call_stack(mut self, call_stack: Vec<String>) -> Self {
        self.call_stack = Some(call_stack);
        self
    }

    pub fn with_when(mut self, when: DateTime<Utc>) -> Self {
        self.when = Some(when);
        self
    }
}

/// Builds logged payloads according to [`LoggingOptions`]
#[derive(Debug, Clone, Default)]
pub struct PayloadComposer {
    options: LoggingOptions,
    engine: DeltaEngine,
}

impl PayloadComposer {
    pub fn new(options: LoggingOptions) -> Self {
        Self {
            options,
            engine: DeltaEngine::default(),
        }
    }

    /// Use a custom delta engine (e.g. a different aggregate key)
    pub fn with_engine(mut self, engine: DeltaEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn options(&self) -> &LoggingOptions {
        &self.options
    }

    /// Compose the event for `change`.
    ///
    /// Returns `None` for an update that changed nothing once the skip paths
    /// and identity paths are ignored; such updates are not logged.
    pub fn compose(&self, change: ObjectChange) -> Option<Event> {
        let ObjectChange {
            model,
            action,
            previous,
            current,
            actor,
            known_modified,
            attributes,
            call_stack,
            when,
        } = change;

        let current = loggable_value(current, None);
        let (actor, actor_kind) = sanitize_actor(actor.map(|a| loggable_value(a, None)));
        if actor.is_none() {
            tracing::warn!(
                component = module_path!(),
                action = action.as_str(),
                model = model.as_str(),
                "Actor not set for logged change"
            );
        }

        let mut behaviour = self.options.table.get(action, actor_kind);
        let mut object = identity_of(&current);

        match action {
            Action::Updated => {
                let previous = previous
                    .map(|p| loggable_value(p, None))
                    .unwrap_or_else(|| Value::Object(Map::new()));
                let change_check = DeltaPolicy::new()
                    .skip(self.options.skip.iter().cloned())
                    .skip(IDENTITY_PATHS.iter().copied());
                if self.engine.diff(&previous, &current, &change_check).is_empty() {
                    tracing::debug!(
                        component = module_path!(),
                        model = model.as_str(),
                        "Update changed nothing loggable, skipping"
                    );
                    return None;
                }

                if matches!(behaviour, Behaviour::Snapshot | Behaviour::SnapshotAndDelta) {
                    object.insert(OBJECT_SNAPSHOT.to_string(), current.clone());
                }
                if matches!(behaviour, Behaviour::Delta | Behaviour::SnapshotAndDelta) {
                    let policy = DeltaPolicy::with_identity_paths().known_modified(known_modified);
                    let delta = self.engine.diff(&previous, &current, &policy);
                    object.insert(OBJECT_DELTA.to_string(), delta.to_value());
                }
            }
            Action::Created | Action::Deleted | Action::Fetched => {
                // Without a previous state only a snapshot or the identity can be logged.
                if behaviour != Behaviour::Id {
                    behaviour = Behaviour::Snapshot;
                    object.insert(OBJECT_SNAPSHOT.to_string(), current);
                }
            }
        }

        object.insert(
            OBJECT_LOG_BEHAVIOUR.to_string(),
            Value::String(behaviour.as_str().to_string()),
        );

        let object_type = format!("{}{}", self.options.object_type_prefix, model);
        let mut event = Event::new(Value::Object(object), object_type, action);
        if let Some(actor) = actor {
            event = event.with_actor(actor);
        }
        if let Some(attributes) = attributes {
            event = event.with_attributes_value(loggable_value(attributes, None));
        }
        if let Some(call_stack) = call_stack {
            event = event.with_call_stack(call_stack);
        }
        if let Some(when) = when {
            event = event.with_when(when);
        }
        Some(event)
    }
}

/// The identity paths of `current` as a fresh object
fn identity_of(current: &Value) -> Map<String, Value> {
    match loggable_value(current.clone(), Some(IDENTITY_PATHS)) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
