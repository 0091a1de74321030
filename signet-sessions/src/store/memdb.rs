//! In-memory reference backend

use super::{Database, LifeTime, MemStore};
use chrono::Duration;
use parking_lot::RwLock;
use serde_json::Value;
use signet_core::SessionResult;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// In-memory session database.
///
/// Structural changes (`acquire`, `release`) take the exclusive lock on the
/// identifier map. Per-session operations take the shared lock only long enough
/// to clone the bag handle, then work on the bag under its own lock.
#[derive(Debug, Default)]
pub struct MemDb {
    values: RwLock<HashMap<String, Arc<MemStore>>>,
}

impl MemDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn bag(&self, sid: &str) -> Option<Arc<MemStore>> {
        self.values.read().get(sid).cloned()
    }

    /// Number of tracked session identifiers
    pub fn session_count(&self) -> usize {
        self.values.read().len()
    }

    pub fn contains(&self, sid: &str) -> bool {
        self.values.read().contains_key(sid)
    }
}

impl Database for MemDb {
    fn name(&self) -> &str {
        "memory"
    }

    fn acquire(&self, sid: &str, _expires: Duration) -> SessionResult<Option<LifeTime>> {
        self.values
            .write()
            .insert(sid.to_string(), Arc::new(MemStore::new()));
        // Lifetime is managed by the session manager for memory-based storage
        Ok(None)
    }

    fn on_update_expiration(&self, _sid: &str, _expires: Duration) -> SessionResult<()> {
        Ok(())
    }

    fn set(
        &self,
        sid: &str,
        _lifetime: &LifeTime,
        key: &str,
        value: Value,
        immutable: bool,
    ) -> SessionResult<bool> {
        match self.bag(sid) {
            Some(bag) => Ok(bag.save(key, value, immutable)),
            None => {
                debug!("Ignoring write of {} to unknown session {}", key, sid);
                Ok(false)
            }
        }
    }

    fn get(&self, sid: &str, key: &str) -> SessionResult<Option<Value>> {
        Ok(self.bag(sid).and_then(|bag| bag.get(key)))
    }

    fn visit(&self, sid: &str, visitor: &mut dyn FnMut(&str, &Value)) -> SessionResult<()> {
        if let Some(bag) = self.bag(sid) {
            bag.visit(visitor);
        }
        Ok(())
    }

    fn len(&self, sid: &str) -> SessionResult<usize> {
        Ok(self.bag(sid).map_or(0, |bag| bag.len()))
    }

    fn delete(&self, sid: &str, key: &str) -> SessionResult<bool> {
        Ok(self.bag(sid).is_some_and(|bag| bag.remove(key)))
    }

    fn clear(&self, sid: &str) -> SessionResult<()> {
        if let Some(bag) = self.bag(sid) {
            bag.reset();
        }
        Ok(())
    }

    fn release(&self, sid: &str) -> SessionResult<()> {
        self.values.write().remove(sid);
        Ok(())
    }
}
