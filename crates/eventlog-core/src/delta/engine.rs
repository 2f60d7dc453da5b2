//! Delta computation engine.
//!
//! The core entry point is [`DeltaEngine::diff`], which accepts two versions
//! of a JSON object graph and a [`DeltaPolicy`] and produces a [`Delta`].

#![allow(clippy::result_large_err)]

use crate::delta::model::{Delta, DeltaPolicy, IDENTITY_PATHS, REFERENCE_KEY};
use crate::errors::Result;
use crate::loggable;
use serde::Serialize;
use serde_json::{Map, Value};

const DEFAULT_AGGREGATE_KEY: &str = "_id";

/// Policy-driven structural diff over `serde_json::Value` graphs.
///
/// An *embedded aggregate* is a nested object carrying the aggregate key
/// (`_id` by default). Aggregates are diffed with a fresh policy that always
/// includes the identity paths, so every nested change can be attributed to
/// the aggregate that owns it.
#[derive(Debug, Clone)]
pub struct DeltaEngine {
    identity_paths: Vec<String>,
    aggregate_key: String,
}

impl Default for DeltaEngine {
    fn default() -> Self {
        Self {
            identity_paths: IDENTITY_PATHS.iter().map(|p| p.to_string()).collect(),
            aggregate_key: DEFAULT_AGGREGATE_KEY.to_string(),
        }
    }
}

impl DeltaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the paths always carried by an embedded aggregate's delta
    pub fn with_identity_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identity_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Override the key that marks an object as an embedded aggregate
    pub fn with_aggregate_key(mut self, key: impl Into<String>) -> Self {
        self.aggregate_key = key.into();
        self
    }

    /// Compute the delta between `previous` and `current`.
    ///
    /// Non-object roots are treated as objects without keys, so diffing a
    /// scalar against an object reports every key of the object as added.
    pub fn diff(&self, previous: &Value, current: &Value, policy: &DeltaPolicy) -> Delta {
        let empty = Map::new();
        let prev = previous.as_object().unwrap_or(&empty);
        let cur = current.as_object().unwrap_or(&empty);
        self.diff_maps(prev, cur, policy)
    }

    fn diff_maps(
        &self,
        previous: &Map<String, Value>,
        current: &Map<String, Value>,
        policy: &DeltaPolicy,
    ) -> Delta {
        let mut delta = Delta::new();
        let mut removed = Vec::new();

        for (key, prev_value) in previous {
            match current.get(key) {
                Some(cur_value) => self.diff_common(&mut delta, key, prev_value, cur_value, policy),
                None => removed.push(key.as_str()),
            }
        }

        for (key, cur_value) in current {
            if !previous.contains_key(key) {
                delta.set(key, cur_value.clone());
            }
        }

        for key in removed {
            delta.mark_deleted(key);
        }

        delta
    }

    fn diff_common(
        &self,
        delta: &mut Delta,
        key: &str,
        previous: &Value,
        current: &Value,
        policy: &DeltaPolicy,
    ) {
        if policy.is_skipped(key) {
            return;
        }
        if policy.is_always_included(key) {
            delta.set(key, current.clone());
            return;
        }
        if policy.is_known_modified(key) {
            if previous == current {
                tracing::warn!(
                    component = module_path!(),
                    path = key,
                    "Logging path listed as modified although its value did not change"
                );
            }
            delta.set(key, current.clone());
            return;
        }
        if previous == current {
            return;
        }

        match (previous, current) {
            (Value::Null, _) => delta.set(key, current.clone()),
            (_, Value::Null) => delta.set(key, Value::Null),
            (Value::Object(prev), Value::Object(cur)) => {
                self.diff_objects(delta, key, prev, cur, policy)
            }
            // Differing JSON types, arrays and changed scalars are replaced wholesale.
            _ => delta.set(key, current.clone()),
        }
    }

    fn diff_objects(
        &self,
        delta: &mut Delta,
        key: &str,
        previous: &Map<String, Value>,
        current: &Map<String, Value>,
        policy: &DeltaPolicy,
    ) {
        match (is_reference(previous), is_reference(current)) {
            // Values are known to differ, so the referenced ids differ.
            (true, true) => return delta.set(key, Value::Object(current.clone())),
            (false, false) => {}
            _ => return delta.set(key, Value::Object(current.clone())),
        }

        let nested = if self.is_aggregate(previous) && self.is_aggregate(current) {
            let aggregate_policy =
                DeltaPolicy::new().always_include(self.identity_paths.iter().cloned());
            self.diff_maps(previous, current, &aggregate_policy)
        } else {
            self.diff_maps(previous, current, &policy.for_nested_object())
        };

        if !nested.is_empty() {
            delta.nest(key, nested);
        }
    }

    fn is_aggregate(&self, object: &Map<String, Value>) -> bool {
        object.contains_key(&self.aggregate_key)
    }
}

/// An identifier reference is an object whose only key is `$oid`.
fn is_reference(object: &Map<String, Value>) -> bool {
    object.len() == 1 && object.contains_key(REFERENCE_KEY)
}

/// Compute a delta with the default engine.
pub fn diff(previous: &Value, current: &Value, policy: &DeltaPolicy) -> Delta {
    DeltaEngine::default().diff(previous, current, policy)
}

/// Convert two serializable values into loggable JSON and diff them.
///
/// # Errors
///
/// - `Serialization` if either value cannot be represented as JSON
pub fn diff_serializable<P, C>(previous: &P, current: &C, policy: &DeltaPolicy) -> Result<Delta>
where
    P: Serialize + ?Sized,
    C: Serialize + ?Sized,
{
    let previous = loggable::loggable_object(previous, None)?;
    let current = loggable::loggable_object(current, None)?;
    Ok(diff(&previous, &current, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::model::{DeltaValue, DELETED};
    use serde_json::json;

    #[test]
    fn test_identical_graphs_yield_empty_delta() {
        let doc = json!({"a": 1, "b": {"c": [1, 2]}, "d": null});
        assert!(diff(&doc, &doc, &DeltaPolicy::new()).is_empty());
    }

    #[test]
    fn test_scalar_root_treated_as_empty_object() {
        let delta = diff(&json!(5), &json!({"a": 1}), &DeltaPolicy::new());
        assert_eq!(delta.to_value(), json!({"a": 1}));
    }

    #[test]
    fn test_references_compared_by_id() {
        let prev = json!({"owner": {"$oid": "65a1"}});
        let cur = json!({"owner": {"$oid": "65a2"}});
        let delta = diff(&prev, &cur, &DeltaPolicy::new());
        assert_eq!(
            delta.get("owner"),
            Some(&DeltaValue::Set(json!({"$oid": "65a2"})))
        );
    }

    #[test]
    fn test_reference_replaced_by_plain_object_emits_current() {
        let prev = json!({"owner": {"$oid": "65a1"}});
        let cur = json!({"owner": {"name": "x"}});
        let delta = diff(&prev, &cur, &DeltaPolicy::new());
        assert_eq!(delta.to_value(), json!({"owner": {"name": "x"}}));
    }

    #[test]
    fn test_custom_aggregate_key() {
        let engine = DeltaEngine::new()
            .with_aggregate_key("id")
            .with_identity_paths(["id"]);
        let prev = json!({"item": {"id": 1, "qty": 1}});
        let cur = json!({"item": {"id": 1, "qty": 2}});
        let delta = engine.diff(&prev, &cur, &DeltaPolicy::new());
        assert_eq!(delta.to_value(), json!({"item": {"id": 1, "qty": 2}}));
    }

    #[test]
    fn test_removed_key_in_nested_object() {
        let prev = json!({"meta": {"a": 1, "b": 2}});
        let cur = json!({"meta": {"a": 1}});
        let delta = diff(&prev, &cur, &DeltaPolicy::new());
        assert_eq!(
            delta.to_value(),
            json!({"meta": {"b": DELETED, "__deletedKeys": ["b"]}})
        );
    }
}
