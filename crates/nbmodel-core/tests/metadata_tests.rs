use nbmodel_core::{MetadataChange, MetadataStore};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

fn recording_store() -> (MetadataStore, Arc<Mutex<Vec<MetadataChange>>>) {
    let mut store = MetadataStore::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.on_change(move |change| {
        sink.lock().expect("listener lock").push(change.clone());
    });
    (store, seen)
}

#[test]
fn set_then_get_returns_equal_value() {
    let mut store = MetadataStore::new();
    store.set("kernelspec", json!({ "name": "python3" }));
    assert_eq!(store.get("kernelspec"), Some(&json!({ "name": "python3" })));
    assert!(store.has("kernelspec"));
    assert_eq!(store.size(), 1);
}

#[test]
fn effective_set_emits_one_change_with_payload() {
    let (mut store, seen) = recording_store();
    store.set("foo", json!(1));

    let events = seen.lock().expect("listener lock");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, "foo");
    assert_eq!(events[0].old_value, None);
    assert_eq!(events[0].new_value, Some(json!(1)));
}

#[test]
fn identical_set_emits_nothing() {
    let (mut store, seen) = recording_store();
    store.set("foo", json!({ "nested": [1, 2, 3] }));
    store.set("foo", json!({ "nested": [1, 2, 3] }));
    assert_eq!(seen.lock().expect("listener lock").len(), 1);
}

#[test]
fn overwrite_carries_previous_value() {
    let (mut store, seen) = recording_store();
    store.set("foo", json!("a"));
    store.set("foo", json!("b"));

    let events = seen.lock().expect("listener lock");
    assert_eq!(events[1].old_value, Some(json!("a")));
    assert_eq!(events[1].new_value, Some(json!("b")));
}

#[test]
fn delete_emits_removal_change() {
    let (mut store, seen) = recording_store();
    store.set("foo", json!(1));
    let change = store.delete("foo").expect("delete is effective");
    assert_eq!(change.new_value, None);
    assert_eq!(change.old_value, Some(json!(1)));
    assert!(!store.has("foo"));
    assert_eq!(seen.lock().expect("listener lock").len(), 2);

    assert!(store.delete("foo").is_none());
}

#[test]
fn listeners_run_in_registration_order() {
    let mut store = MetadataStore::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&order);
    store.on_change(move |_| first.lock().expect("lock").push("first"));
    let second = Arc::clone(&order);
    store.on_change(move |_| second.lock().expect("lock").push("second"));

    store.set("k", json!(true));
    assert_eq!(*order.lock().expect("lock"), vec!["first", "second"]);
}

#[test]
fn removed_listener_stops_firing() {
    let (mut store, seen) = recording_store();
    store.set("a", json!(1));
    // recording_store registered listener id 1.
    assert!(store.off_change(1));
    store.set("b", json!(2));
    assert_eq!(seen.lock().expect("listener lock").len(), 1);
}

#[test]
fn replace_all_emits_only_effective_changes() {
    let (mut store, seen) = recording_store();
    store.set("keep", json!("same"));
    store.set("stale", json!("old"));
    store.set("update", json!(1));
    seen.lock().expect("listener lock").clear();

    let mut next = Map::new();
    next.insert("keep".into(), json!("same"));
    next.insert("update".into(), json!(2));
    next.insert("fresh".into(), Value::Bool(true));
    let changed = store.replace_all(next);

    // stale removed, update changed, fresh added; keep untouched.
    assert_eq!(changed, 3);
    let events = seen.lock().expect("listener lock");
    assert_eq!(events.len(), 3);
    assert!(events.iter().any(|c| c.key == "stale" && c.new_value.is_none()));
    assert!(events.iter().all(|c| c.key != "keep"));
    assert_eq!(store.size(), 3);
}
