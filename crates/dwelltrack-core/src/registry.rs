//! Per-session storage for visit state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::session::VisitorSession;

/// Shared handle to one session's state.
///
/// Hold the lock for the whole request: tokio's mutex hands out the guard in
/// FIFO order, so a session's requests are evaluated in arrival order.
pub type SessionSlot = Arc<Mutex<VisitorSession>>;

/// All live sessions, keyed by session id.
///
/// The map lock is only held to look up or insert a slot; each session has
/// its own mutex, so unrelated visitors never wait on each other.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionSlot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the slot for `session_id`, creating an idle session if needed.
    pub async fn get_or_create(&self, session_id: &str, now: DateTime<Utc>) -> SessionSlot {
        {
            let sessions = self.sessions.read().await;
            if let Some(slot) = sessions.get(session_id) {
                return Arc::clone(slot);
            }
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(VisitorSession::new(session_id, now)))),
        )
    }

    /// Lock the live slot for `session_id`, creating it if needed.
    ///
    /// If the slot was evicted while this caller queued on its mutex, the
    /// stale guard is released and the lookup starts again, so every
    /// request for one id ends up on the same slot.
    pub async fn lock_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> OwnedMutexGuard<VisitorSession> {
        loop {
            let slot = self.get_or_create(session_id, now).await;
            let guard = Arc::clone(&slot).lock_owned().await;
            match self.get(session_id).await {
                Some(live) if Arc::ptr_eq(&live, &slot) => return guard,
                _ => continue,
            }
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionSlot> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Drop sessions not seen for longer than `idle`. Returns how many went.
    ///
    /// Sessions an in-flight request has fetched or locked are kept; they are
    /// about to be touched anyway.
    pub async fn evict_idle(&self, now: DateTime<Utc>, idle: Duration) -> usize {
        let idle = chrono::Duration::from_std(idle).unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(idle).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(session) => session.last_seen >= cutoff,
                Err(_) => true,
            }
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
