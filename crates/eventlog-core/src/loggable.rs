//! Conversion of caller objects into loggable JSON.
//!
//! A loggable object is plain JSON with no operator keys: any key starting
//! with `$` is dropped (with a warning), except identifier references such as
//! `{"$oid": "65a1..."}` which are kept as opaque leaves.

#![allow(clippy::result_large_err)]

use crate::delta::REFERENCE_KEY;
use crate::errors::{EventLogError, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize `value` and strip it down to its loggable form.
///
/// When `paths` is given, only those top-level keys are kept.
///
/// # Errors
///
/// - `Serialization` if the value cannot be represented as JSON (e.g. a map
///   with non-string keys)
pub fn loggable_object<T>(value: &T, paths: Option<&[&str]>) -> Result<Value>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_value(value).map_err(|e| EventLogError::Serialization {
        message: format!("object is not loggable: {}", e),
    })?;
    Ok(loggable_value(json, paths))
}

/// Strip an already-serialized JSON value down to its loggable form.
pub fn loggable_value(value: Value, paths: Option<&[&str]>) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_object(map, paths)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| loggable_value(item, None))
                .collect(),
        ),
        other => other,
    }
}

fn strip_object(map: Map<String, Value>, paths: Option<&[&str]>) -> Map<String, Value> {
    if is_reference(&map) {
        return map;
    }
    let mut out = Map::new();
    for (key, value) in map {
        if key.starts_with('$') {
            tracing::warn!(
                component = module_path!(),
                key = key.as_str(),
                "Skipping property since it starts with $"
            );
            continue;
        }
        if let Some(paths) = paths {
            if !paths.contains(&key.as_str()) {
                continue;
            }
        }
        out.insert(key, loggable_value(value, None));
    }
    out
}

fn is_reference(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.contains_key(REFERENCE_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_operator_keys_are_dropped_recursively() {
        let value = json!({
            "name": "a",
            "$locals": {"x": 1},
            "nested": {"$init": true, "keep": 1},
            "items": [{"$op": 1, "v": 2}]
        });
        assert_eq!(
            loggable_value(value, None),
            json!({"name": "a", "nested": {"keep": 1}, "items": [{"v": 2}]})
        );
    }

    #[test]
    fn test_references_are_kept_whole() {
        let value = json!({"owner": {"$oid": "65a1"}});
        assert_eq!(loggable_value(value.clone(), None), value);
    }

    #[test]
    fn test_path_filter_applies_to_top_level_only() {
        let value = json!({"_id": 1, "__v": 0, "name": "a", "meta": {"name": "b"}});
        let filtered = loggable_value(value, Some(&["_id", "__v"]));
        assert_eq!(filtered, json!({"_id": 1, "__v": 0}));
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(loggable_object(&"text", None).unwrap(), json!("text"));
        assert_eq!(loggable_object(&7, None).unwrap(), json!(7));
    }

    #[test]
    fn test_non_string_map_keys_are_serialization_errors() {
        let mut map = HashMap::new();
        map.insert((1, 2), "pair");
        let err = loggable_object(&map, None).unwrap_err();
        assert!(matches!(err, EventLogError::Serialization { .. }));
    }
}
