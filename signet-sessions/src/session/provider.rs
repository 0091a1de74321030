//! Session provider - tracks live sessions and their backends

use super::Session;
use crate::store::{Database, LifeTime, MemDb};
use chrono::Duration;
use parking_lot::RwLock;
use signet_core::{SessionError, SessionResult};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback fired with the identifier of a session that was removed entirely
pub type DestroyListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Registered store backends. The most recently registered one acquires new
/// sessions; existing sessions keep the backend that acquired them.
pub struct Databases {
    backends: RwLock<Vec<Arc<dyn Database>>>,
}

impl Databases {
    pub fn new(initial: Arc<dyn Database>) -> Self {
        Self {
            backends: RwLock::new(vec![initial]),
        }
    }

    /// Backend that acquires new sessions
    pub fn active(&self) -> Arc<dyn Database> {
        let backends = self.backends.read();
        // Never empty: constructed with one backend and only ever appended to
        Arc::clone(&backends[backends.len() - 1])
    }

    pub fn register(&self, database: Arc<dyn Database>) {
        self.backends.write().push(database);
    }

    pub fn all(&self) -> Vec<Arc<dyn Database>> {
        self.backends.read().clone()
    }

    pub fn len(&self) -> usize {
        self.backends.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owns the identifier to session mapping, the backends and the destroy listeners
pub struct Provider {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    databases: Arc<Databases>,
    listeners: RwLock<Vec<DestroyListener>>,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider {
    /// Provider backed by a fresh [`MemDb`]
    pub fn new() -> Self {
        Self::with_database(Arc::new(MemDb::new()))
    }

    pub fn with_database(database: Arc<dyn Database>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            databases: Arc::new(Databases::new(database)),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a backend; sessions created from now on live in it
    pub fn register_database(&self, database: Arc<dyn Database>) {
        info!("Registering session database: {}", database.name());
        self.databases.register(database);
    }

    pub fn register_destroy_listener(&self, listener: DestroyListener) {
        self.listeners.write().push(listener);
    }

    pub fn databases(&self) -> &Arc<Databases> {
        &self.databases
    }

    fn create(
        &self,
        sessions: &mut HashMap<String, Arc<Session>>,
        sid: &str,
        expires: Duration,
    ) -> SessionResult<Arc<Session>> {
        let database = self.databases.active();
        let lifetime = database
            .acquire(sid, expires)?
            .unwrap_or_else(|| LifeTime::begin(expires));

        info!("Created session {} in {}", sid, database.name());
        let session = Arc::new(Session::new(sid.to_string(), lifetime, database));
        sessions.insert(sid.to_string(), Arc::clone(&session));
        Ok(session)
    }

    /// Allocate a fresh session for `sid`, resetting any state it had
    pub fn init(&self, sid: &str, expires: Duration) -> SessionResult<Arc<Session>> {
        let mut sessions = self.sessions.write();
        self.create(&mut sessions, sid, expires)
    }

    /// Look up a live session for the resolved identifier `sid`, creating it
    /// when unknown. The result is never marked new since the client already
    /// holds the identifier.
    ///
    /// An expired session is destroyed, firing listeners, and replaced by a
    /// fresh one under the same identifier.
    pub fn read(&self, sid: &str, expires: Duration) -> SessionResult<Arc<Session>> {
        let existing = self.sessions.read().get(sid).cloned();
        if let Some(session) = existing {
            if !session.has_expired() {
                return Ok(resumed(session));
            }
            debug!("Session {} has expired", sid);
            self.destroy(sid)?;
        }

        // Another request may have created it since the read lock was released
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get(sid) {
            if !session.has_expired() {
                return Ok(resumed(Arc::clone(session)));
            }
        }
        let session = self.create(&mut sessions, sid, expires)?;
        session.mark_resolved();
        Ok(session)
    }

    pub fn get(&self, sid: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(sid).cloned()
    }

    pub fn contains(&self, sid: &str) -> bool {
        self.sessions.read().contains_key(sid)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the deadline of `sid`. The session's backend is asked first and
    /// the deadline only moves when it accepts.
    pub fn update_expiration(&self, sid: &str, expires: Duration) -> SessionResult<()> {
        let session = self.get(sid).ok_or(SessionError::NotFound)?;
        session.database().on_update_expiration(sid, expires)?;
        session.shift_lifetime(expires);
        Ok(())
    }

    /// Release `sid` from every backend and notify listeners.
    ///
    /// Listeners only fire for sessions this provider tracked. Every backend is
    /// released even if one fails; the first failure is returned.
    pub fn destroy(&self, sid: &str) -> SessionResult<()> {
        let removed = self.sessions.write().remove(sid);

        let mut first_error = None;
        for database in self.databases.all() {
            if let Err(e) = database.release(sid) {
                e.log();
                first_error.get_or_insert(e);
            }
        }

        if let Some(session) = removed {
            session.mark_destroyed();
            info!("Destroyed session {}", sid);
            self.notify_destroyed(sid);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Destroy every tracked session, continuing past failures
    pub fn destroy_all(&self) -> SessionResult<()> {
        let sids: Vec<String> = self.sessions.read().keys().cloned().collect();

        let mut first_error = None;
        for sid in sids {
            if let Err(e) = self.destroy(&sid) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Destroy every session whose deadline has passed. Returns how many were removed.
    pub fn purge_expired(&self) -> SessionResult<usize> {
        let expired: Vec<String> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, session)| session.has_expired())
            .map(|(sid, _)| sid.clone())
            .collect();

        let mut first_error = None;
        for sid in &expired {
            if let Err(e) = self.destroy(sid) {
                first_error.get_or_insert(e);
            }
        }

        if !expired.is_empty() {
            debug!("Purged {} expired sessions", expired.len());
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(expired.len()),
        }
    }

    fn notify_destroyed(&self, sid: &str) {
        // Snapshot so listeners may register further listeners
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(sid))).is_err() {
                warn!("Destroy listener panicked for session {}", sid);
            }
        }
    }
}

fn resumed(session: Arc<Session>) -> Arc<Session> {
    session.mark_resolved();
    session.run_flash_gc();
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use signet_core::storage_error;

    fn recorder(provider: &Provider) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        provider.register_destroy_listener(Arc::new(move |sid: &str| {
            sink.lock().push(sid.to_string());
        }));
        seen
    }

    #[test]
    fn test_init_and_read() {
        let provider = Provider::new();
        let created = provider.init("s1", Duration::zero()).unwrap();
        assert!(created.is_new());
        created.set("k", "v").unwrap();

        let read = provider.read("s1", Duration::zero()).unwrap();
        assert!(!read.is_new());
        assert_eq!(read.get_string("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_read_unknown_creates_resolved_session() {
        let provider = Provider::new();
        let session = provider.read("fresh", Duration::zero()).unwrap();
        assert!(!session.is_new());
        assert!(provider.contains("fresh"));
    }

    #[test]
    fn test_destroy_fires_listeners_once() {
        let provider = Provider::new();
        let seen = recorder(&provider);
        let session = provider.init("s1", Duration::zero()).unwrap();

        provider.destroy("s1").unwrap();
        provider.destroy("s1").unwrap();

        assert_eq!(*seen.lock(), vec!["s1".to_string()]);
        assert!(session.is_destroyed());
        assert_eq!(session.len().unwrap(), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let provider = Provider::new();
        provider.register_destroy_listener(Arc::new(|_: &str| panic!("listener failure")));
        let seen = recorder(&provider);

        provider.init("a", Duration::zero()).unwrap();
        provider.init("b", Duration::zero()).unwrap();
        provider.destroy_all().unwrap();

        let mut seen = seen.lock().clone();
        seen.sort();
        assert_eq!(seen, vec!["a".to_string(), "b".to_string()]);
        assert!(provider.is_empty());
    }

    #[test]
    fn test_expired_session_is_replaced() {
        let provider = Provider::new();
        let seen = recorder(&provider);
        let old = provider.init("s1", Duration::zero()).unwrap();
        old.set("k", 1).unwrap();
        provider.update_expiration("s1", Duration::seconds(-1)).unwrap();

        let fresh = provider.read("s1", Duration::zero()).unwrap();
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(old.is_destroyed());
        assert_eq!(fresh.len().unwrap(), 0);
        assert_eq!(*seen.lock(), vec!["s1".to_string()]);
    }

    #[test]
    fn test_update_expiration_unknown_is_not_found() {
        let provider = Provider::new();
        assert!(matches!(
            provider.update_expiration("ghost", Duration::hours(1)),
            Err(SessionError::NotFound)
        ));
    }

    #[test]
    fn test_purge_expired() {
        let provider = Provider::new();
        provider.init("keep", Duration::hours(1)).unwrap();
        provider.init("drop", Duration::hours(1)).unwrap();
        provider.update_expiration("drop", Duration::seconds(-1)).unwrap();

        assert_eq!(provider.purge_expired().unwrap(), 1);
        assert!(provider.contains("keep"));
        assert!(!provider.contains("drop"));
    }

    struct FailingRelease;

    impl Database for FailingRelease {
        fn acquire(&self, _sid: &str, _expires: Duration) -> SessionResult<Option<LifeTime>> {
            Ok(None)
        }
        fn set(
            &self,
            _sid: &str,
            _lifetime: &LifeTime,
            _key: &str,
            _value: serde_json::Value,
            _immutable: bool,
        ) -> SessionResult<bool> {
            Ok(true)
        }
        fn get(&self, _sid: &str, _key: &str) -> SessionResult<Option<serde_json::Value>> {
            Ok(None)
        }
        fn visit(
            &self,
            _sid: &str,
            _visitor: &mut dyn FnMut(&str, &serde_json::Value),
        ) -> SessionResult<()> {
            Ok(())
        }
        fn len(&self, _sid: &str) -> SessionResult<usize> {
            Ok(0)
        }
        fn delete(&self, _sid: &str, _key: &str) -> SessionResult<bool> {
            Ok(false)
        }
        fn clear(&self, _sid: &str) -> SessionResult<()> {
            Ok(())
        }
        fn release(&self, _sid: &str) -> SessionResult<()> {
            Err(storage_error!("backend offline", "failing"))
        }
    }

    #[test]
    fn test_destroy_all_continues_past_store_errors() {
        let memdb = Arc::new(MemDb::new());
        let provider = Provider::with_database(memdb.clone());
        provider.init("a", Duration::zero()).unwrap();
        provider.init("b", Duration::zero()).unwrap();
        provider.register_database(Arc::new(FailingRelease));
        let seen = recorder(&provider);

        assert!(provider.destroy_all().unwrap_err().is_store_error());
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(memdb.session_count(), 0);
    }

    #[test]
    fn test_rejected_expiration_update_keeps_deadline() {
        let provider = Provider::with_database(Arc::new(FailingRelease));
        let session = provider.init("s1", Duration::hours(1)).unwrap();
        let before = session.lifetime();

        assert!(matches!(
            provider.update_expiration("s1", Duration::seconds(-1)),
            Err(SessionError::NotImplemented)
        ));
        assert_eq!(session.lifetime(), before);
        assert_eq!(provider.purge_expired().unwrap(), 0);
    }

    #[test]
    fn test_existing_sessions_keep_their_database() {
        let first = Arc::new(MemDb::new());
        let provider = Provider::with_database(first.clone());
        let session = provider.init("s1", Duration::zero()).unwrap();
        session.set("k", 1).unwrap();

        provider.register_database(Arc::new(MemDb::new()));
        assert_eq!(session.get_i64("k").unwrap(), Some(1));
        assert!(session.set("k2", 2).unwrap());
        assert_eq!(first.len("s1").unwrap(), 2);

        let resumed = provider.read("s1", Duration::zero()).unwrap();
        assert_eq!(resumed.get_i64("k2").unwrap(), Some(2));
    }

    #[test]
    fn test_last_registered_database_is_active() {
        let first = Arc::new(MemDb::new());
        let second = Arc::new(MemDb::new());
        let provider = Provider::with_database(first.clone());
        provider.register_database(second.clone());

        let session = provider.init("s1", Duration::zero()).unwrap();
        session.set("k", "v").unwrap();

        assert!(second.contains("s1"));
        assert!(!first.contains("s1"));
        assert_eq!(provider.databases().len(), 2);
    }
}
