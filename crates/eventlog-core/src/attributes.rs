//! Event attributes and dotted-path access.
//!
//! Attributes are `{name, value}` pairs carried alongside an event. They are
//! merged by name, with the later value winning. `get_spath` / `set_spath`
//! address values inside a JSON graph by a dotted path (`"a.b.c"`); when the
//! path crosses an array the remaining path is applied to every item.

#![allow(clippy::result_large_err)]

use crate::errors::{EventLogError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named attribute attached to an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Value,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// JSON form `{"name": ..., "value": ...}`
    pub fn into_value(self) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name));
        map.insert("value".to_string(), self.value);
        Value::Object(map)
    }

    /// Parse one attribute; entries without a non-empty string `name` are ignored
    fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let name = object.get("name")?.as_str().filter(|n| !n.is_empty())?;
        Some(Self {
            name: name.to_string(),
            value: object.get("value").cloned().unwrap_or(Value::Null),
        })
    }
}

/// Convert attributes into the JSON array carried by an event
pub fn attributes_to_value(attributes: Vec<Attribute>) -> Value {
    Value::Array(attributes.into_iter().map(Attribute::into_value).collect())
}

/// Merge `new_attributes` into `current`.
///
/// `new_attributes` may be a single attribute object or an array of them.
/// `null`, an empty array, or an object without a name leave `current`
/// unchanged (and `None` stays `None`). An attribute whose name already
/// exists replaces that entry's value in place; new names are appended.
///
/// # Errors
///
/// - `InvalidInput` if `new_attributes` is a scalar
pub fn merge_attributes(
    current: Option<Vec<Attribute>>,
    new_attributes: &Value,
) -> Result<Option<Vec<Attribute>>> {
    let incoming: Vec<Attribute> = match new_attributes {
        Value::Null => return Ok(current),
        Value::Array(items) => items.iter().filter_map(Attribute::from_json).collect(),
        Value::Object(_) => Attribute::from_json(new_attributes).into_iter().collect(),
        other => {
            return Err(EventLogError::InvalidInput {
                reason: format!(
                    "expected attributes to be an object or an array, got {}",
                    json_type_name(other)
                ),
            })
        }
    };
    if incoming.is_empty() {
        return Ok(current);
    }

    let mut merged = current.unwrap_or_default();
    for attribute in incoming {
        match merged.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => existing.value = attribute.value,
            None => merged.push(attribute),
        }
    }
    Ok(Some(merged))
}

/// Read the value at a dotted path.
///
/// An empty path returns the whole value. Returns `None` when a component is
/// missing and `Some(Value::Null)` when a component is `null`. Crossing an
/// array yields an array with the remaining path applied to each item
/// (missing item values become `null`).
pub fn get_spath(object: &Value, spath: &str) -> Option<Value> {
    if spath.is_empty() {
        return Some(object.clone());
    }
    let components: Vec<&str> = spath.split('.').collect();
    get_components(object, &components)
}

fn get_components(object: &Value, components: &[&str]) -> Option<Value> {
    let mut current = object;
    for (i, component) in components.iter().enumerate() {
        if let Value::Array(items) = current {
            let rest = &components[i..];
            return Some(Value::Array(
                items
                    .iter()
                    .map(|item| get_components(item, rest).unwrap_or(Value::Null))
                    .collect(),
            ));
        }
        match current.get(*component) {
            None => return None,
            Some(Value::Null) => return Some(Value::Null),
            Some(next) => current = next,
        }
    }
    Some(current.clone())
}

/// Write `value` at a dotted path, creating missing intermediate objects.
///
/// Crossing an array applies the remaining path to every item; if `value`
/// is itself an array, item `j` receives `value[min(j, len - 1)]`.
///
/// # Errors
///
/// - `InvalidInput` if the path is empty or traverses a scalar
pub fn set_spath(object: &mut Value, spath: &str, value: Value) -> Result<()> {
    if spath.is_empty() {
        return Err(EventLogError::InvalidInput {
            reason: "spath is required".to_string(),
        });
    }
    let components: Vec<&str> = spath.split('.').collect();
    set_components(object, &components, value)
}

fn set_components(object: &mut Value, components: &[&str], value: Value) -> Result<()> {
    let Some((head, rest)) = components.split_first() else {
        *object = value;
        return Ok(());
    };

    match object {
        Value::Array(items) => {
            for (j, item) in items.iter_mut().enumerate() {
                let item_value = match &value {
                    Value::Array(values) if !values.is_empty() => {
                        values[j.min(values.len() - 1)].clone()
                    }
                    other => other.clone(),
                };
                set_components(item, components, item_value)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            if rest.is_empty() {
                map.insert(head.to_string(), value);
                return Ok(());
            }
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_components(child, rest, value)
        }
        other => Err(EventLogError::InvalidInput {
            reason: format!(
                "cannot set '{}' on a {} value",
                head,
                json_type_name(other)
            ),
        }),
    }
}

/// Merge `attributes` into the attribute list stored at `spath` of `model`.
///
/// # Errors
///
/// - `InvalidInput` if `attributes` is a scalar, the stored value is not an
///   attribute list, or the path cannot be written
pub fn update_attributes(model: &mut Value, spath: &str, attributes: &Value) -> Result<()> {
    let current = match get_spath(model, spath) {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(items.iter().filter_map(Attribute::from_json).collect()),
        Some(other) => {
            return Err(EventLogError::InvalidInput {
                reason: format!(
                    "'{}' holds a {} value, not an attribute list",
                    spath,
                    json_type_name(&other)
                ),
            })
        }
    };
    match merge_attributes(current, attributes)? {
        Some(merged) => set_spath(model, spath, attributes_to_value(merged)),
        None => Ok(()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
