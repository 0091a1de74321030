//! Session Store - pluggable backends for per-session key/value state
//!
//! Every backend implements [`Database`]. [`MemDb`] is the in-memory reference
//! backend; external databases plug in through the same trait.

pub mod lifetime;
pub mod memdb;
pub mod memstore;

pub use lifetime::{clamp_ttl, LifeTime};
pub use memdb::MemDb;
pub use memstore::MemStore;

use chrono::Duration;
use serde_json::Value;
use signet_core::{SessionError, SessionResult};

/// Contract any session backend must satisfy.
///
/// Operations on unknown identifiers return zero values (`None`, `0`, `false`)
/// instead of failing. Backends report their own I/O failures as
/// [`SessionError::Storage`].
pub trait Database: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str {
        "database"
    }

    /// Allocate empty state for `sid`, resetting any existing state.
    ///
    /// Returns the lifetime the backend tracks, or `None` when the backend leaves
    /// expiration to the session manager.
    fn acquire(&self, sid: &str, expires: Duration) -> SessionResult<Option<LifeTime>>;

    /// Backends without server-tracked TTL may succeed without doing anything.
    fn on_update_expiration(&self, _sid: &str, _expires: Duration) -> SessionResult<()> {
        Err(SessionError::NotImplemented)
    }

    /// Insert or overwrite `key`. Returns false if the write was ignored because the
    /// existing entry is immutable or the session is unknown.
    fn set(
        &self,
        sid: &str,
        lifetime: &LifeTime,
        key: &str,
        value: Value,
        immutable: bool,
    ) -> SessionResult<bool>;

    fn get(&self, sid: &str, key: &str) -> SessionResult<Option<Value>>;

    /// Visit every entry of `sid`. Ordering is backend-defined.
    fn visit(&self, sid: &str, visitor: &mut dyn FnMut(&str, &Value)) -> SessionResult<()>;

    fn len(&self, sid: &str) -> SessionResult<usize>;

    fn delete(&self, sid: &str, key: &str) -> SessionResult<bool>;

    /// Remove every key of `sid`, keeping the (now empty) entry
    fn clear(&self, sid: &str) -> SessionResult<()>;

    /// Remove the entry for `sid` entirely
    fn release(&self, sid: &str) -> SessionResult<()>;
}
