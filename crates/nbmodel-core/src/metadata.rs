//! Document-level metadata store.
//!
//! A key→value mapping with synchronous change notification. A `set` that
//! assigns a value deep-equal to the current one is a no-op and emits
//! nothing; an effective mutation emits exactly one [`MetadataChange`]
//! before the call returns, to listeners in registration order.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Payload of a metadata mutation: the key, the previous value (`None`
/// when the key was absent) and the new value (`None` on deletion).
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

type MetadataListener = Box<dyn FnMut(&MetadataChange) + Send + Sync>;

pub struct MetadataStore {
    entries: IndexMap<String, Value>,
    next_listener_id: u64,
    listeners: BTreeMap<u64, MetadataListener>,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            next_listener_id: 1,
            listeners: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Assigns `value` to `key`. Returns the emitted change, or `None` when
    /// the value deep-equals the current one (no event in that case).
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<MetadataChange> {
        let key = key.into();
        let old_value = self.entries.get(&key).cloned();
        if old_value.as_ref() == Some(&value) {
            return None;
        }
        self.entries.insert(key.clone(), value.clone());
        let change = MetadataChange {
            key,
            old_value,
            new_value: Some(value),
        };
        self.emit(&change);
        Some(change)
    }

    /// Removes `key`. Returns the emitted change, or `None` when the key
    /// was absent.
    pub fn delete(&mut self, key: &str) -> Option<MetadataChange> {
        let old_value = self.entries.shift_remove(key)?;
        let change = MetadataChange {
            key: key.to_owned(),
            old_value: Some(old_value),
            new_value: None,
        };
        self.emit(&change);
        Some(change)
    }

    /// Wholesale replacement, used when loading a document. Emits one
    /// change per key that is effectively removed, changed, or added; keys
    /// whose value is unchanged emit nothing. Returns the number of
    /// effective changes.
    pub fn replace_all(&mut self, entries: Map<String, Value>) -> usize {
        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|k| !entries.contains_key(k.as_str()))
            .cloned()
            .collect();

        let mut changes = 0;
        for key in stale {
            if self.delete(&key).is_some() {
                changes += 1;
            }
        }
        for (key, value) in entries {
            if self.set(key, value).is_some() {
                changes += 1;
            }
        }
        changes
    }

    /// Snapshot of the entries as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn on_change<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(&MetadataChange) + Send + Sync + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        self.listeners.insert(id, Box::new(listener));
        id
    }

    pub fn off_change(&mut self, listener_id: u64) -> bool {
        self.listeners.remove(&listener_id).is_some()
    }

    pub(crate) fn clear_all(&mut self) {
        self.entries.clear();
        self.listeners.clear();
    }

    fn emit(&mut self, change: &MetadataChange) {
        for listener in self.listeners.values_mut() {
            listener(change);
        }
    }
}
