//! Payload composition tests: behaviour resolution, change detection,
//! actor handling and the persisted record shape.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use eventlog_core::attributes::update_attributes;
use eventlog_core::behaviour::{
    ActorKind, Behaviour, BehaviourTable, LoggingOptions, Strictness,
};
use eventlog_core::event::{Action, EventRecord};
use eventlog_core::payload::{ObjectChange, PayloadComposer};
use serde::Serialize;
use serde_json::{json, Value};

fn compose(composer: &PayloadComposer, change: ObjectChange) -> Option<EventRecord> {
    composer.compose(change).map(|event| event.normalize())
}

#[test]
fn test_snapshot_and_delta_behaviour() {
    // Given options that log both snapshot and delta for system updates
    let options = LoggingOptions {
        table: BehaviourTable::default().with(
            Action::Updated,
            ActorKind::System,
            Behaviour::SnapshotAndDelta,
        ),
        ..LoggingOptions::default()
    };
    let composer = PayloadComposer::new(options);

    // When an object is updated
    let record = compose(
        &composer,
        ObjectChange::updated(
            "Sample",
            json!({"_id": "s1", "__v": 0, "name": "a", "count": 1}),
            json!({"_id": "s1", "__v": 1, "name": "a", "count": 2}),
        ),
    )
    .expect("update should be logged");

    // Then both representations are carried
    assert_eq!(record.action, Action::Updated);
    assert_eq!(
        record.object,
        json!({
            "_id": "s1",
            "__v": 1,
            "__snapshot": {"_id": "s1", "__v": 1, "name": "a", "count": 2},
            "__delta": {"_id": "s1", "__v": 1, "count": 2},
            "__logBehaviour": "snapshotAndDelta"
        })
    );
}

#[test]
fn test_custom_skip_paths_suppress_trivial_updates() {
    let options = LoggingOptions::from_json(
        &json!({"skip": ["lastSeen"]}),
        Strictness::Strict,
    )
    .unwrap();
    let composer = PayloadComposer::new(options);

    let change = ObjectChange::updated(
        "Session",
        json!({"_id": 1, "lastSeen": 10}),
        json!({"_id": 1, "lastSeen": 11}),
    );

    assert!(compose(&composer, change).is_none());
}

#[test]
fn test_removed_field_appears_in_delta() {
    let composer = PayloadComposer::default();
    let record = compose(
        &composer,
        ObjectChange::updated(
            "Sample",
            json!({"_id": 1, "nick": "x", "name": "a"}),
            json!({"_id": 1, "name": "a"}),
        ),
    )
    .unwrap();

    assert_eq!(
        record.object["__delta"],
        json!({"_id": 1, "nick": "$DELETED", "__deletedKeys": ["nick"]})
    );
}

#[test]
fn test_known_modified_paths_are_forced_into_delta() {
    let composer = PayloadComposer::default();
    let change = ObjectChange::updated(
        "Sample",
        json!({"_id": 1, "name": "a", "tags": ["x"]}),
        json!({"_id": 1, "name": "b", "tags": ["x"]}),
    )
    .with_known_modified(["tags"]);

    let record = compose(&composer, change).unwrap();

    assert_eq!(
        record.object["__delta"],
        json!({"_id": 1, "name": "b", "tags": ["x"]})
    );
}

#[test]
fn test_operator_keys_never_reach_payload() {
    let composer = PayloadComposer::default();
    let record = compose(
        &composer,
        ObjectChange::created(
            "Sample",
            json!({"_id": 1, "$locals": {"cache": true}, "owner": {"$oid": "65a1"}}),
        ),
    )
    .unwrap();

    assert_eq!(
        record.object["__snapshot"],
        json!({"_id": 1, "owner": {"$oid": "65a1"}})
    );
}

#[test]
fn test_fetched_logs_identity_only() {
    let composer = PayloadComposer::default();
    let record = compose(
        &composer,
        ObjectChange::fetched("Sample", json!({"_id": 1, "__v": 2, "secret": "s"})),
    )
    .unwrap();

    assert_eq!(
        record.object,
        json!({"_id": 1, "__v": 2, "__logBehaviour": "id"})
    );
}

#[test]
fn test_attributes_and_call_stack_are_carried() {
    // Given attributes accumulated on a model
    let mut model = json!({});
    update_attributes(&mut model, "attrs", &json!({"name": "tenant", "value": "a"})).unwrap();
    update_attributes(&mut model, "attrs", &json!([{"name": "batch", "value": 7}])).unwrap();

    // When composing a deletion carrying them
    let change = ObjectChange::deleted("Sample", json!({"_id": 1}))
        .with_attributes(model["attrs"].clone())
        .with_call_stack(vec!["remove@jobs.rs:42".to_string()]);
    let record = compose(&PayloadComposer::default(), change).unwrap();

    // Then the persisted record carries both
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(
        value["attributes"],
        json!([{"name": "tenant", "value": "a"}, {"name": "batch", "value": 7}])
    );
    assert_eq!(value["callStack"], json!(["remove@jobs.rs:42"]));
    assert_eq!(value["actor"], Value::Null);
}

#[derive(Serialize)]
struct Invoice {
    #[serde(rename = "_id")]
    id: u32,
    total: u32,
}

#[test]
fn test_change_from_serializable_states() {
    let change = ObjectChange::from_serializable(
        "Invoice",
        Action::Updated,
        Some(&Invoice { id: 9, total: 10 }),
        &Invoice { id: 9, total: 12 },
    )
    .unwrap()
    .with_actor(json!({"name": "billing"}));

    let record = compose(&PayloadComposer::default(), change).unwrap();

    assert_eq!(record.object_type, "Invoice");
    assert_eq!(record.actor, json!({"name": "billing"}));
    assert_eq!(record.object["__delta"], json!({"_id": 9, "total": 12}));
}

