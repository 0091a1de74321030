//! Per-session key/value bag

use parking_lot::RwLock;
use serde_json::Value;

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    value: Value,
    immutable: bool,
}

/// Insertion-ordered key/value bag guarded by its own lock, so concurrent
/// requests on one session never block requests on other sessions.
#[derive(Debug, Default)]
pub struct MemStore {
    entries: RwLock<Vec<Entry>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`. Returns false when an immutable entry already holds the key.
    pub fn save(&self, key: &str, value: Value, immutable: bool) -> bool {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter_mut().find(|e| e.key == key) {
            if entry.immutable {
                return false;
            }
            entry.value = value;
            entry.immutable = immutable;
            return true;
        }

        entries.push(Entry {
            key: key.to_string(),
            value,
            immutable,
        });
        true
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.clone())
    }

    /// Calls `visitor` for each entry of a snapshot taken under the read lock.
    /// The visitor runs without the lock held, so it may touch the store.
    pub fn visit(&self, visitor: &mut dyn FnMut(&str, &Value)) {
        let snapshot = self.entries.read().clone();
        for entry in &snapshot {
            visitor(&entry.key, &entry.value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.key != key);
        entries.len() != before
    }

    pub fn reset(&self) {
        self.entries.write().clear();
    }
}
