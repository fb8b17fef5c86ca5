// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::session::Session;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Per-user conversation sessions with an idle TTL. No cross-user sharing:
/// the map key is the user id and nothing else ever reads it.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    timeout_secs: u64,
}

impl SessionStore {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout_secs,
        }
    }

    /// Return a live session id for `user_id`, creating or replacing as
    /// needed. The boolean is true when a new session was issued, letting
    /// the caller reset any conversation state tied to the old one.
    pub async fn ensure_session(&self, user_id: &str) -> (String, bool) {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;

        if let Some(session) = sessions.get_mut(user_id) {
            if session.is_live(now, self.timeout_secs) {
                session.touch(now);
                debug!(user = user_id, session = %session.id, "Reusing session");
                return (session.id.clone(), false);
            }
            info!(user = user_id, "Session expired, creating a new one");
        }

        let session = Session::new(user_id, now);
        let id = session.id.clone();
        sessions.insert(user_id.to_string(), session);
        info!(user = user_id, session = %id, "Created session");
        (id, true)
    }

    /// Drop sessions idle past the timeout. Correctness does not depend on
    /// this; `ensure_session` replaces stale entries on its own.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.is_live(now, self.timeout_secs));
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, "Cleaned up expired sessions");
        }
        removed
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Periodic cleanup task; runs until the store is dropped.
    pub fn spawn_cleanup(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let period = Duration::from_secs(store.timeout_secs.clamp(60, 900));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                store.cleanup_expired().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_session_reuses_live_session() {
        let store = SessionStore::new(3600);
        let (first, fresh_first) = store.ensure_session("u1").await;
        let (second, fresh_second) = store.ensure_session("u1").await;
        assert!(fresh_first);
        assert!(!fresh_second);
        assert_eq!(first, second);
        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn ensure_session_replaces_stale_session() {
        let store = SessionStore::new(0); // everything is immediately stale
        let (first, _) = store.ensure_session("u1").await;
        let (second, fresh) = store.ensure_session("u1").await;
        assert!(fresh);
        // Ids may collide within the same second; the fresh flag is the
        // contract, the id format is not.
        let _ = (first, second);
    }

    #[tokio::test]
    async fn sessions_are_scoped_per_user() {
        let store = SessionStore::new(3600);
        let (a, _) = store.ensure_session("u1").await;
        let (b, _) = store.ensure_session("u2").await;
        assert_ne!(a, b);
        assert_eq!(store.active_count().await, 2);
    }

    #[tokio::test]
    async fn cleanup_removes_only_stale_sessions() {
        let store = SessionStore::new(0);
        store.ensure_session("u1").await;
        store.ensure_session("u2").await;
        assert_eq!(store.cleanup_expired().await, 2);
        assert_eq!(store.active_count().await, 0);

        let live = SessionStore::new(3600);
        live.ensure_session("u1").await;
        assert_eq!(live.cleanup_expired().await, 0);
        assert_eq!(live.active_count().await, 1);
    }
}
