//! Per-session handle exposed to request handlers

use crate::store::{Database, LifeTime};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use signet_core::SessionResult;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct Flash {
    value: Value,
    /// Set once read; the entry is dropped at the next request for this session
    consumed: bool,
}

/// Server-side state of one session.
///
/// Values go to the backend that acquired the session, even after another
/// backend is registered. Flash messages stay on the handle and live for one
/// request after they are read.
pub struct Session {
    sid: String,
    is_new: AtomicBool,
    destroyed: AtomicBool,
    lifetime: Mutex<LifeTime>,
    flashes: Mutex<HashMap<String, Flash>>,
    database: Arc<dyn Database>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("sid", &self.sid)
            .field("is_new", &self.is_new())
            .field("destroyed", &self.is_destroyed())
            .field("lifetime", &self.lifetime())
            .field("database", &self.database.name())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(sid: String, lifetime: LifeTime, database: Arc<dyn Database>) -> Self {
        Self {
            sid,
            is_new: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
            lifetime: Mutex::new(lifetime),
            flashes: Mutex::new(HashMap::new()),
            database,
        }
    }

    pub fn id(&self) -> &str {
        &self.sid
    }

    /// Whether the session was created by the request that resolved it
    pub fn is_new(&self) -> bool {
        self.is_new.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn lifetime(&self) -> LifeTime {
        *self.lifetime.lock()
    }

    pub fn has_expired(&self) -> bool {
        self.lifetime.lock().has_expired()
    }

    /// Backend holding this session's values
    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }

    pub(crate) fn mark_resolved(&self) {
        self.is_new.store(false, Ordering::Release);
    }

    pub(crate) fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::Release);
    }

    pub(crate) fn shift_lifetime(&self, ttl: chrono::Duration) {
        self.lifetime.lock().shift(ttl);
    }

    fn write(&self, key: &str, value: Value, immutable: bool) -> SessionResult<bool> {
        let lifetime = self.lifetime();
        let stored = self
            .database
            .set(&self.sid, &lifetime, key, value, immutable)?;
        if !stored {
            debug!("Write of {} to session {} was ignored", key, self.sid);
        }
        Ok(stored)
    }

    /// Store `value` under `key`. Returns false if an immutable entry holds the key.
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> SessionResult<bool> {
        self.write(key, serde_json::to_value(value)?, false)
    }

    /// Store `value` under `key` and refuse later overwrites
    pub fn set_immutable<T: Serialize>(&self, key: &str, value: T) -> SessionResult<bool> {
        self.write(key, serde_json::to_value(value)?, true)
    }

    pub fn get(&self, key: &str) -> SessionResult<Option<Value>> {
        self.database.get(&self.sid, key)
    }

    /// Deserialize the value under `key` into `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> SessionResult<Option<T>> {
        match self.get(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn get_or(&self, key: &str, default: Value) -> SessionResult<Value> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// String value under `key`. Non-string values read as `None`.
    pub fn get_string(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self
            .get(key)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    /// Integer value under `key`, parsing numeric strings
    pub fn get_i64(&self, key: &str) -> SessionResult<Option<i64>> {
        Ok(self.get(key)?.and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }))
    }

    pub fn get_f64(&self, key: &str) -> SessionResult<Option<f64>> {
        Ok(self.get(key)?.and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }))
    }

    pub fn get_bool(&self, key: &str) -> SessionResult<Option<bool>> {
        Ok(self.get(key)?.and_then(|v| match v {
            Value::Bool(b) => Some(b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }))
    }

    /// Snapshot of every value
    pub fn get_all(&self) -> SessionResult<Map<String, Value>> {
        let mut all = Map::new();
        self.visit(|key, value| {
            all.insert(key.to_string(), value.clone());
        })?;
        Ok(all)
    }

    /// Add `n` to the integer under `key` (missing counts as 0) and return the result
    pub fn increment(&self, key: &str, n: i64) -> SessionResult<i64> {
        let next = self.get_i64(key)?.unwrap_or(0).saturating_add(n);
        self.set(key, next)?;
        Ok(next)
    }

    pub fn decrement(&self, key: &str, n: i64) -> SessionResult<i64> {
        self.increment(key, n.saturating_neg())
    }

    pub fn delete(&self, key: &str) -> SessionResult<bool> {
        self.database.delete(&self.sid, key)
    }

    /// Remove every value, keeping the session
    pub fn clear(&self) -> SessionResult<()> {
        self.database.clear(&self.sid)
    }

    pub fn visit<F>(&self, mut visitor: F) -> SessionResult<()>
    where
        F: FnMut(&str, &Value),
    {
        self.database.visit(&self.sid, &mut visitor)
    }

    pub fn len(&self) -> SessionResult<usize> {
        self.database.len(&self.sid)
    }

    pub fn is_empty(&self) -> SessionResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn set_flash<T: Serialize>(&self, key: &str, value: T) -> SessionResult<()> {
        let value = serde_json::to_value(value)?;
        self.flashes.lock().insert(
            key.to_string(),
            Flash {
                value,
                consumed: false,
            },
        );
        Ok(())
    }

    /// Read a flash message. It stays readable for the rest of this request.
    pub fn get_flash(&self, key: &str) -> Option<Value> {
        let mut flashes = self.flashes.lock();
        flashes.get_mut(key).map(|flash| {
            flash.consumed = true;
            flash.value.clone()
        })
    }

    /// Read a flash message without consuming it
    pub fn peek_flash(&self, key: &str) -> Option<Value> {
        self.flashes.lock().get(key).map(|flash| flash.value.clone())
    }

    pub fn has_flashes(&self) -> bool {
        !self.flashes.lock().is_empty()
    }

    /// Read and consume every flash message
    pub fn get_flashes(&self) -> Map<String, Value> {
        let mut flashes = self.flashes.lock();
        flashes
            .iter_mut()
            .map(|(key, flash)| {
                flash.consumed = true;
                (key.clone(), flash.value.clone())
            })
            .collect()
    }

    pub fn delete_flash(&self, key: &str) -> bool {
        self.flashes.lock().remove(key).is_some()
    }

    pub fn clear_flashes(&self) {
        self.flashes.lock().clear();
    }

    /// Drop flashes consumed by an earlier request
    pub(crate) fn run_flash_gc(&self) {
        self.flashes.lock().retain(|_, flash| !flash.consumed);
    }
}
