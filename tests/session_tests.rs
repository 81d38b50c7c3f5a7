//! Session store keyed by (creation time, user).

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use mcpchat::session::{SessionKey, SessionStore};
use mcpchat::types::Turn;

#[test]
fn same_timestamp_and_user_address_one_session() {
    let store = SessionStore::new();
    let a = store.get_or_create(&SessionKey::new(100, "alice"));
    let b = store.get_or_create(&SessionKey::new(100, "alice"));
    assert!(Arc::ptr_eq(&a, &b));

    store.get_or_create(&SessionKey::new(100, "bob"));
    store.get_or_create(&SessionKey::new(101, "alice"));
    assert_eq!(store.len(), 3);

    let mut keys = store.keys();
    keys.sort();
    assert_eq!(keys[0], SessionKey::new(100, "alice"));
}

#[tokio::test]
async fn concurrent_creation_yields_a_single_session() {
    let store = Arc::new(SessionStore::new());
    let key = SessionKey::new(42, "carol");

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.get_or_create(&key) })
        })
        .collect();

    let mut sessions = Vec::new();
    for handle in handles {
        sessions.push(handle.await.unwrap());
    }
    assert_eq!(store.len(), 1);
    assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
}

#[tokio::test(start_paused = true)]
async fn history_waits_for_the_writer() {
    let store = Arc::new(SessionStore::new());
    let key = SessionKey::new(7, "dan");
    let handle = store.get_or_create(&key);

    let writer = tokio::spawn(async move {
        let mut session = handle.lock().await;
        session.history.push(Turn::user("first"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        session.history.push(Turn::assistant("second"));
    });
    tokio::task::yield_now().await;

    let history = store.history(&key).await.unwrap();
    assert_eq!(history.len(), 2);
    writer.await.unwrap();
}

#[tokio::test]
async fn removed_sessions_start_over() {
    let store = SessionStore::new();
    let key = SessionKey::new(9, "eve");
    store
        .get_or_create(&key)
        .lock()
        .await
        .history
        .push(Turn::user("hi"));

    assert!(store.remove(&key).is_some());
    assert!(store.get(&key).is_none());
    assert!(store.history(&key).await.is_none());
    assert!(store.get_or_create(&key).lock().await.history.is_empty());
}
