//! Error handling and edge case tests.

use normalized_sync::{
    Document, NormalizedStore, Query, QueryDescriptor, QueryFingerprint, StoreError,
};
use serde_json::json;

fn doc(id: &str, v: i64) -> Document {
    Document::new(id).with("v", v)
}

// --- Missing ids ---

#[test]
fn test_set_without_id() {
    let store = NormalizedStore::new();
    store.set(doc("a", 1)).unwrap();

    let result = store.set(Document::new(""));
    assert!(matches!(result, Err(StoreError::MissingId { operation: "set" })));

    // Nothing applied
    assert_eq!(store.len(), 1);
}

#[test]
fn test_batch_with_missing_id_is_rejected_whole() {
    let store = NormalizedStore::new();
    store.initialize(vec![doc("a", 1)]).unwrap();
    let before = store.snapshot();

    let result = store.set_many(vec![doc("b", 2), Document::new(""), doc("c", 3)]);
    assert!(matches!(result, Err(StoreError::MissingId { .. })));

    let result = store.initialize(vec![Document::new("")]);
    assert!(matches!(result, Err(StoreError::MissingId { .. })));

    let after = store.snapshot();
    assert!(after.ptr_eq(&before));
    assert_eq!(after.ids(), vec!["a"]);
}

#[test]
fn test_update_and_remove_without_id() {
    let store = NormalizedStore::<Document>::new();

    assert!(matches!(
        store.update(Document::new("").with("v", 1)),
        Err(StoreError::MissingId { operation: "update" })
    ));
    assert!(matches!(
        store.remove(""),
        Err(StoreError::MissingId { operation: "remove" })
    ));
    assert!(store.is_empty());
}

#[test]
fn test_error_messages() {
    let err = StoreError::MissingId { operation: "set" };
    assert_eq!(err.to_string(), "Entity without id passed to set");

    let err = StoreError::feed("socket closed");
    assert_eq!(err.to_string(), "Feed error: socket closed");
}

// --- Unknown ids are not errors ---

#[test]
fn test_remove_unknown_id() {
    let store = NormalizedStore::new();
    store.initialize(vec![doc("a", 1)]).unwrap();

    store.remove("missing").unwrap();
    assert_eq!(store.snapshot().ids(), vec!["a"]);
}

#[test]
fn test_update_unknown_id_creates_partial_entry() {
    let store = NormalizedStore::new();
    store.update(Document::new("z").with("v", 9)).unwrap();

    let z: Document = store.get("z").unwrap();
    assert_eq!(z, doc("z", 9));
    assert_eq!(z.fields.len(), 1);
}

#[test]
fn test_empty_batches() {
    let store = NormalizedStore::new();
    store.initialize(vec![doc("a", 1)]).unwrap();

    store.set_many(vec![]).unwrap();
    assert_eq!(store.len(), 1);

    store.initialize(vec![]).unwrap();
    assert!(store.is_empty());
    assert!(store.values().is_empty());
}

// --- Documents ---

#[test]
fn test_document_from_non_object() {
    let result = Document::from_value(json!([1, 2, 3]));
    assert!(matches!(result, Err(StoreError::Deserialization(_))));
}

#[test]
fn test_document_from_value_without_id() {
    for value in [json!({"v": 1}), json!({"id": ""}), json!({"id": 7})] {
        let result = Document::from_value(value);
        assert!(matches!(result, Err(StoreError::MissingId { .. })));
    }
}

#[test]
fn test_document_json_shape() {
    let d = Document::from_value(json!({"id": "a", "v": 1, "owner": {"id": "u1"}})).unwrap();
    assert_eq!(d.id, "a");
    assert_eq!(d.get("owner"), Some(&json!({"id": "u1"})));
    assert_eq!(d.to_value(), json!({"id": "a", "v": 1, "owner": {"id": "u1"}}));
}

// --- Queries ---

#[test]
fn test_query_from_json_rejects_bad_shapes() {
    assert!(matches!(
        Query::from_json("", json!({})),
        Err(StoreError::InvalidQuery(_))
    ));
    assert!(matches!(
        Query::from_json("Todo", json!({"where": [1]})),
        Err(StoreError::InvalidQuery(_))
    ));
    assert!(matches!(
        Query::from_json("Todo", json!({"limit": -1})),
        Err(StoreError::InvalidQuery(_))
    ));
}

#[test]
fn test_query_from_json_tolerates_missing_keys() {
    let query = Query::from_json("Todo", json!({})).unwrap();
    assert_eq!(query.collection(), "Todo");
    assert!(query.constraints().is_empty());
    assert!(query.includes().is_empty());
    assert_eq!(query.limit_value(), None);
}

#[test]
fn test_fingerprint_round_trips_query() {
    let query = Query::new("Todo")
        .equal_to("done", false)
        .include("owner")
        .descending("createdAt")
        .limit(20);

    let fingerprint = QueryFingerprint::of(&query).unwrap();
    let decoded: Query = fingerprint.decode().unwrap();

    assert_eq!(QueryFingerprint::of(&decoded).unwrap(), fingerprint);
    assert_eq!(decoded.includes(), vec!["owner"]);
    assert_eq!(decoded.limit_value(), Some(20));
}
