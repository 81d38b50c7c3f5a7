//! Process-wide map of conversation histories.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use super::key::SessionKey;
use crate::types::Turn;

/// One conversation and its history.
#[derive(Debug, Clone)]
pub struct Session {
    pub key: SessionKey,
    pub history: Vec<Turn>,
    pub created: DateTime<Utc>,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            history: Vec::new(),
            created: Utc::now(),
        }
    }
}

/// Shared handle to a session. Holding the lock makes the holder the only
/// writer of that history.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Concurrent session store.
///
/// Lookups on different keys never contend on a global lock. Sessions live
/// until they are removed explicitly.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionKey, SessionHandle>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or atomically create the session for `key`.
    pub fn get_or_create(&self, key: &SessionKey) -> SessionHandle {
        if let Some(existing) = self.sessions.get(key) {
            return existing.clone();
        }
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::debug!(session = %key, "creating session");
                Arc::new(Mutex::new(Session::new(key.clone())))
            })
            .clone()
    }

    /// Get an existing session.
    pub fn get(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.get(key).map(|entry| entry.clone())
    }

    /// Remove a session.
    pub fn remove(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.remove(key).map(|(_, handle)| handle)
    }

    /// Copy of a session's history, waiting for any running turn to finish.
    pub async fn history(&self, key: &SessionKey) -> Option<Vec<Turn>> {
        let handle = self.get(key)?;
        let session = handle.lock().await;
        Some(session.history.clone())
    }

    /// List session keys.
    pub fn keys(&self) -> Vec<SessionKey> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_returns_the_same_session() {
        let store = SessionStore::new();
        let key = SessionKey::new(1, "u");
        let a = store.get_or_create(&key);
        a.lock().await.history.push(Turn::user("hello"));
        let b = store.get_or_create(&key);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.history(&key).await.unwrap().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_creation_yields_one_history() {
        let store = Arc::new(SessionStore::new());
        let key = SessionKey::new(42, "racer");
        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let key = key.clone();
            tasks.push(tokio::spawn(async move {
                let handle = store.get_or_create(&key);
                handle.lock().await.history.push(Turn::user(format!("m{i}")));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.history(&key).await.unwrap().len(), 16);
    }

    #[test]
    fn remove_forgets_session() {
        let store = SessionStore::new();
        let key = SessionKey::new(1, "u");
        store.get_or_create(&key);
        assert!(store.remove(&key).is_some());
        assert!(store.get(&key).is_none());
        assert!(store.is_empty());
    }
}
