use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant};

use crate::session::Session;

/// Shared handle to one session. Holding the mutex serializes frames for
/// that id; other ids are unaffected.
pub type SessionHandle = Arc<Mutex<Session>>;

/// In-memory owner of all live sessions.
///
/// Lookups of existing ids take only the read lock. Creation takes the write
/// lock and goes through the entry API, so concurrent first frames for the
/// same new id share one initialization.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.read().get(id).cloned()
    }

    /// Return the session for `id`, creating it with `init` if absent.
    /// `init` runs at most once per call and only under the write lock.
    pub fn get_or_insert_with(&self, id: &str, init: impl FnOnce() -> Session) -> SessionHandle {
        if let Some(handle) = self.get(id) {
            return handle;
        }
        self.write()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(init())))
            .clone()
    }

    /// Remove `id` only if it still maps to `handle`. A session that was
    /// already replaced by a newer one is left alone.
    pub fn remove_if_current(&self, id: &str, handle: &SessionHandle) -> bool {
        let mut sessions = self.write();
        match sessions.get(id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                sessions.remove(id);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        self.write().remove(id).is_some()
    }

    /// Drop every session older than `session_timeout`. Sessions busy with
    /// a frame right now are skipped and picked up on a later pass.
    pub fn reap_expired(&self, now: Instant, session_timeout: Duration) -> usize {
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => !session.is_expired(now, session_timeout),
            Err(TryLockError::Poisoned(poisoned)) => {
                !poisoned.into_inner().is_expired(now, session_timeout)
            }
            Err(TryLockError::WouldBlock) => true,
        });
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lock a session, recovering from a poisoned mutex. Session mutation does
/// not panic midway, so the inner state is still consistent.
pub fn lock_session(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}
