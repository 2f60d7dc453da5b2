//! Delta engine tests: identity, additions/removals, policy precedence,
//! nested recursion and the documented scenarios.
//!
//! All tests operate on in-memory JSON graphs (no I/O).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use eventlog_core::delta::{
    diff, diff_serializable, DeltaEngine, DeltaPolicy, DeltaValue, DELETED, DELETED_KEYS_FIELD,
};
use eventlog_core::logging_facility::test_capture::init_test_capture;
use proptest::prelude::*;
use serde::Serialize;
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_changed_scalar_is_emitted() {
    let delta = diff(&json!({"a": 1, "b": 2}), &json!({"a": 1, "b": 3}), &DeltaPolicy::new());
    assert_eq!(delta.to_value(), json!({"b": 3}));
}

#[test]
fn test_changed_array_is_replaced_wholesale() {
    let delta = diff(
        &json!({"a": [1, 2, 3]}),
        &json!({"a": [1, 2, 3, 4]}),
        &DeltaPolicy::new(),
    );
    assert_eq!(delta.to_value(), json!({"a": [1, 2, 3, 4]}));
}

#[test]
fn test_changed_nested_object_yields_sub_delta() {
    let delta = diff(&json!({"a": {"x": 1}}), &json!({"a": {"x": 2}}), &DeltaPolicy::new());
    assert_eq!(delta.to_value(), json!({"a": {"x": 2}}));
    assert!(matches!(delta.get("a"), Some(DeltaValue::Nested(_))));
}

#[test]
fn test_added_key_is_emitted() {
    let delta = diff(&json!({"a": 1}), &json!({"a": 1, "b": {"c": 1}}), &DeltaPolicy::new());
    assert_eq!(delta.to_value(), json!({"b": {"c": 1}}));
}

#[test]
fn test_removed_key_is_marked_deleted() {
    // Given a graph and the same graph with one key removed
    let x = json!({"a": 1, "b": 2, "c": 3});
    let y = json!({"a": 1, "c": 3});

    // When diffing
    let delta = diff(&x, &y, &DeltaPolicy::new());

    // Then exactly that key is reported with the sentinel
    assert_eq!(delta.len(), 1);
    assert_eq!(delta.get("b"), Some(&DeltaValue::Deleted));
    assert_eq!(delta.deleted_keys(), ["b".to_string()]);
    assert_eq!(
        delta.to_value(),
        json!({"b": DELETED, DELETED_KEYS_FIELD: ["b"]})
    );
}

#[test]
fn test_null_transitions() {
    let delta = diff(
        &json!({"set": null, "cleared": {"x": 1}}),
        &json!({"set": {"x": 1}, "cleared": null}),
        &DeltaPolicy::new(),
    );
    assert_eq!(delta.to_value(), json!({"set": {"x": 1}, "cleared": null}));
}

#[test]
fn test_type_change_emits_current() {
    let delta = diff(&json!({"a": "1"}), &json!({"a": 1}), &DeltaPolicy::new());
    assert_eq!(delta.to_value(), json!({"a": 1}));

    let delta = diff(&json!({"a": [1]}), &json!({"a": {"0": 1}}), &DeltaPolicy::new());
    assert_eq!(delta.to_value(), json!({"a": {"0": 1}}));
}

// ---------------------------------------------------------------------------
// Policy precedence
// ---------------------------------------------------------------------------

#[test]
fn test_always_include_on_unchanged_graph() {
    let x = json!({"_id": "o1", "name": "a"});
    let delta = diff(&x, &x, &DeltaPolicy::new().always_include(["_id"]));
    assert_eq!(delta.to_value(), json!({"_id": "o1"}));
}

#[test]
fn test_skip_wins_over_known_modified_and_always_include() {
    let policy = DeltaPolicy::new()
        .skip(["status"])
        .known_modified(["status"])
        .always_include(["status"]);
    let delta = diff(&json!({"status": "open"}), &json!({"status": "closed"}), &policy);
    assert!(delta.is_empty());
}

#[test]
fn test_known_modified_unchanged_emits_and_warns() {
    let capture = init_test_capture();
    let path = "known_modified_unchanged_unique_1";
    let x = json!({ path: "same", "other": 1 });

    let delta = diff(&x, &x, &DeltaPolicy::new().known_modified([path]));

    assert_eq!(delta.to_value(), json!({ path: "same" }));
    assert_eq!(
        capture.warnings_with("path", path).len(),
        1,
        "Expected exactly one policy anomaly warning"
    );
}

#[test]
fn test_known_modified_changed_does_not_warn() {
    let capture = init_test_capture();
    let path = "known_modified_changed_unique_2";

    let delta = diff(
        &json!({ path: 1 }),
        &json!({ path: 2 }),
        &DeltaPolicy::new().known_modified([path]),
    );

    assert_eq!(delta.to_value(), json!({ path: 2 }));
    assert!(capture.warnings_with("path", path).is_empty());
}

#[test]
fn test_policy_does_not_leak_into_nested_objects_except_always_include() {
    // skip/known_modified apply to the top level only
    let policy = DeltaPolicy::new()
        .skip(["note"])
        .always_include(["kind"]);
    let prev = json!({"meta": {"note": "a", "kind": "k", "n": 1}, "note": "x"});
    let cur = json!({"meta": {"note": "b", "kind": "k", "n": 2}, "note": "y"});

    let delta = diff(&prev, &cur, &policy);

    assert_eq!(
        delta.to_value(),
        json!({"meta": {"note": "b", "kind": "k", "n": 2}})
    );
}

// ---------------------------------------------------------------------------
// Aggregates and references
// ---------------------------------------------------------------------------

#[test]
fn test_embedded_aggregate_carries_identity_paths() {
    let prev = json!({"item": {"_id": "i1", "__v": 3, "qty": 1, "sku": "s"}});
    let cur = json!({"item": {"_id": "i1", "__v": 3, "qty": 2, "sku": "s"}});

    let delta = diff(&prev, &cur, &DeltaPolicy::new());

    assert_eq!(
        delta.to_value(),
        json!({"item": {"_id": "i1", "__v": 3, "qty": 2}})
    );
}

#[test]
fn test_embedded_aggregate_resets_caller_policy() {
    let policy = DeltaPolicy::new().always_include(["sku"]);
    let prev = json!({"item": {"_id": "i1", "qty": 1, "sku": "s"}});
    let cur = json!({"item": {"_id": "i1", "qty": 2, "sku": "s"}});

    let delta = diff(&prev, &cur, &policy);

    assert_eq!(delta.to_value(), json!({"item": {"_id": "i1", "qty": 2}}));
}

#[test]
fn test_unchanged_reference_is_omitted() {
    let x = json!({"owner": {"$oid": "65a1"}});
    assert!(diff(&x, &x.clone(), &DeltaPolicy::new()).is_empty());
}

#[test]
fn test_engine_with_custom_identity_paths() {
    let engine = DeltaEngine::new().with_identity_paths(["_id", "rev"]);
    let prev = json!({"item": {"_id": "i1", "rev": 1, "__v": 0, "qty": 1}});
    let cur = json!({"item": {"_id": "i1", "rev": 1, "__v": 0, "qty": 2}});

    let delta = engine.diff(&prev, &cur, &DeltaPolicy::new());

    assert_eq!(
        delta.to_value(),
        json!({"item": {"_id": "i1", "rev": 1, "qty": 2}})
    );
}

// ---------------------------------------------------------------------------
// Serializable inputs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Order {
    #[serde(rename = "_id")]
    id: String,
    status: String,
    lines: Vec<u32>,
}

#[test]
fn test_diff_serializable_structs() {
    let prev = Order {
        id: "o1".to_string(),
        status: "open".to_string(),
        lines: vec![1],
    };
    let cur = Order {
        id: "o1".to_string(),
        status: "paid".to_string(),
        lines: vec![1],
    };

    let delta = diff_serializable(&prev, &cur, &DeltaPolicy::with_identity_paths()).unwrap();

    assert_eq!(delta.to_value(), json!({"_id": "o1", "status": "paid"}));
}

#[test]
fn test_serialized_delta_is_stable() {
    let prev = json!({"z": 1, "a": 1, "gone": true});
    let cur = json!({"z": 2, "a": 2});
    let first = serde_json::to_string(&diff(&prev, &cur, &DeltaPolicy::new())).unwrap();
    let second = serde_json::to_string(&diff(&prev, &cur, &DeltaPolicy::new())).unwrap();
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(|n| json!(n)),
        "[a-z]{0,6}".prop_map(Value::String),
    ]
}

fn json_graph() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,4}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn json_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z_]{1,4}", json_graph(), 0..8)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

/// Wrap `value` in `depth` levels of single-key objects
fn nest(value: Value, depth: usize) -> Value {
    (0..depth).fold(value, |inner, i| json!({ format!("level{}", i): inner }))
}

proptest! {
    #[test]
    fn prop_diff_identity(x in json_object()) {
        prop_assert!(diff(&x, &x, &DeltaPolicy::new()).is_empty());
    }

    #[test]
    fn prop_diff_of_deep_clone_is_empty(x in json_object(), depth in 0usize..12) {
        let deep = nest(x, depth);
        let copy = deep.clone();
        let delta = diff(&deep, &copy, &DeltaPolicy::new());
        prop_assert!(delta.is_empty());
        prop_assert_eq!(delta.to_value(), json!({}));
    }

    #[test]
    fn prop_always_include_reports_unchanged_key(x in json_object()) {
        if let Some(key) = x.as_object().and_then(|m| m.keys().next().cloned()) {
            let delta = diff(&x, &x, &DeltaPolicy::new().always_include([key.clone()]));
            prop_assert_eq!(delta.len(), 1);
            prop_assert_eq!(delta.get(&key), Some(&DeltaValue::Set(x[&key].clone())));
        }
    }

    #[test]
    fn prop_single_removal(x in json_object()) {
        if let Some(key) = x.as_object().and_then(|m| m.keys().next().cloned()) {
            let mut y = x.clone();
            y.as_object_mut().unwrap().remove(&key);
            let delta = diff(&x, &y, &DeltaPolicy::new());
            prop_assert_eq!(delta.len(), 1);
            prop_assert_eq!(delta.get(&key), Some(&DeltaValue::Deleted));
            prop_assert_eq!(delta.deleted_keys(), [key]);
        }
    }

    #[test]
    fn prop_skipped_key_never_appears(x in json_object(), replacement in json_leaf()) {
        if let Some(key) = x.as_object().and_then(|m| m.keys().next().cloned()) {
            let mut y = x.clone();
            y[&key] = replacement;
            let policy = DeltaPolicy::new().skip([key.clone()]).known_modified([key.clone()]);
            prop_assert!(diff(&x, &y, &policy).get(&key).is_none());
        }
    }
}
