//! Delta output and policy types.
//!
//! Collections use `BTreeMap`/`BTreeSet` for deterministic serialization.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Sentinel stored in place of a removed key's value.
pub const DELETED: &str = "$DELETED";

/// Field listing the keys removed at one level of the delta.
pub const DELETED_KEYS_FIELD: &str = "__deletedKeys";

/// Identifier paths that are always carried by an embedded aggregate's delta.
pub const IDENTITY_PATHS: &[&str] = &["_id", "__v"];

/// Key marking an identifier reference value, e.g. `{"$oid": "65a1..."}`.
pub const REFERENCE_KEY: &str = "$oid";

/// One entry of a delta.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaValue {
    /// The key is new or its value changed; carries the current value.
    Set(Value),
    /// The key was removed.
    Deleted,
    /// Both sides are nested objects; carries their (non-empty) delta.
    Nested(Delta),
}

impl DeltaValue {
    /// JSON form of this entry
    pub fn to_value(&self) -> Value {
        match self {
            DeltaValue::Set(value) => value.clone(),
            DeltaValue::Deleted => Value::String(DELETED.to_string()),
            DeltaValue::Nested(delta) => delta.to_value(),
        }
    }
}

/// Difference between two versions of an object graph at one level.
///
/// Serializes to the stable wire form consumed by log readers:
/// `{"<key>": <new value> | "$DELETED" | {<nested delta>}, "__deletedKeys": [...]}`
/// where `__deletedKeys` is omitted when nothing was removed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delta {
    entries: BTreeMap<String, DeltaValue>,
    deleted_keys: Vec<String>,
}

impl Delta {
    /// Create an empty delta
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no key changed (a delta with only deleted keys is not empty)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of changed keys at this level
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entry for a key, if it changed
    pub fn get(&self, key: &str) -> Option<&DeltaValue> {
        self.entries.get(key)
    }

    /// All entries in key order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &DeltaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys removed at this level, in the order they were found
    pub fn deleted_keys(&self) -> &[String] {
        &self.deleted_keys
    }

    pub(crate) fn set(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), DeltaValue::Set(value));
    }

    pub(crate) fn nest(&mut self, key: &str, delta: Delta) {
        self.entries
            .insert(key.to_string(), DeltaValue::Nested(delta));
    }

    pub(crate) fn mark_deleted(&mut self, key: &str) {
        self.entries.insert(key.to_string(), DeltaValue::Deleted);
        self.deleted_keys.push(key.to_string());
    }

    /// JSON form of the whole delta
    pub fn to_value(&self) -> Value {
        let mut map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_value()))
            .collect();
        if !self.deleted_keys.is_empty() {
            map.insert(
                DELETED_KEYS_FIELD.to_string(),
                Value::Array(
                    self.deleted_keys
                        .iter()
                        .map(|k| Value::String(k.clone()))
                        .collect(),
                ),
            );
        }
        Value::Object(map)
    }
}

impl Serialize for Delta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = usize::from(!self.deleted_keys.is_empty());
        let mut map = serializer.serialize_map(Some(self.entries.len() + extra))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, &value.to_value())?;
        }
        if !self.deleted_keys.is_empty() {
            map.serialize_entry(DELETED_KEYS_FIELD, &self.deleted_keys)?;
        }
        map.end()
    }
}

impl From<Delta> for Value {
    fn from(delta: Delta) -> Self {
        delta.to_value()
    }
}

/// Inclusion/exclusion policy applied to the common keys of one level.
///
/// Precedence, highest first: `skip`, `always_include`, `known_modified`.
/// Keys are matched by name at every level the policy reaches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaPolicy {
    always_include: BTreeSet<String>,
    known_modified: BTreeSet<String>,
    skip: BTreeSet<String>,
}

impl DeltaPolicy {
    /// Empty policy: pure structural comparison
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that always includes the identity paths (`_id`, `__v`)
    pub fn with_identity_paths() -> Self {
        Self::new().always_include(IDENTITY_PATHS.iter().copied())
    }

    /// Keys emitted with their current value even when unchanged
    pub fn always_include<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.always_include.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Keys the caller claims were modified
    pub fn known_modified<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_modified.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Keys that never appear in the delta
    pub fn skip<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn is_always_included(&self, key: &str) -> bool {
        self.always_include.contains(key)
    }

    pub fn is_known_modified(&self, key: &str) -> bool {
        self.known_modified.contains(key)
    }

    pub fn is_skipped(&self, key: &str) -> bool {
        self.skip.contains(key)
    }

    /// Policy for a plain nested object: same `always_include`, nothing else
    pub(crate) fn for_nested_object(&self) -> Self {
        Self {
            always_include: self.always_include.clone(),
            known_modified: BTreeSet::new(),
            skip: BTreeSet::new(),
        }
    }
}
