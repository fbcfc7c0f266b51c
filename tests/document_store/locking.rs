//! Store lock bracketing transactions from concurrent tasks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::common::*;
use verso::{Error, StoreConfig};

fn store_with(wait_ms: u64, hold_ms: u64) -> DocumentStore {
    let config = StoreConfig {
        lock_wait_timeout_ms: wait_ms,
        lock_max_hold_ms: hold_ms,
        ..StoreConfig::default()
    };
    let mut store = DocumentStore::with_config(config).unwrap();
    store
        .set_node(Node::container("doc").with_id("root"), false)
        .unwrap();
    store.set_root("root").unwrap();
    store
}

#[tokio::test]
async fn test_writers_commit_in_arrival_order() {
    let store = store_with(2_000, 10_000);
    let locks = store.lock_manager().clone();
    let store = Arc::new(Mutex::new(store));

    let first = locks.acquire_lock("setup").await.unwrap();
    let mut handles = Vec::new();
    for name in ["a", "b", "c"] {
        let waiter = locks.clone();
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let token = waiter.acquire_lock(name).await.unwrap();
            {
                let mut store = store.lock().unwrap();
                store
                    .transaction(|s| s.add_child("root", Node::text("line", name).with_id(name), None))
                    .unwrap();
            }
            waiter.release_lock(token.lock_id);
        }));
        // Let each writer reach the queue before the next one is spawned.
        while locks.queue_len() < handles.len() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    assert_eq!(locks.stats().queue.len(), 3);
    assert!(locks.release_lock(first.lock_id));
    for handle in handles {
        handle.await.unwrap();
    }

    let store = store.lock().unwrap();
    assert_eq!(child_ids(&store, "root"), vec!["a", "b", "c"]);
    let stats = store.lock_stats();
    assert_eq!(stats.total_acquisitions, 4);
    assert_eq!(stats.total_releases, 4);
    assert!(!stats.is_locked);
}

#[tokio::test]
async fn test_waiter_times_out_while_lock_is_held() {
    let store = store_with(50, 10_000);
    let holder = store.acquire_lock("editor").await.unwrap();

    let err = store.acquire_lock("sync").await.unwrap_err();
    match err {
        Error::LockTimeout { owner, waited } => {
            assert_eq!(owner, "sync");
            assert!(waited >= Duration::from_millis(50));
        }
        other => panic!("expected LockTimeout, got {other:?}"),
    }

    let stats = store.lock_stats();
    assert_eq!(stats.total_timeouts, 1);
    assert_eq!(stats.queue_length, 0);
    assert_eq!(stats.current_lock.map(|h| h.owner), Some("editor".to_string()));
    assert!(store.release_lock(holder.lock_id));
}

#[tokio::test]
async fn test_overdue_holder_is_force_released() {
    let store = store_with(50, 100);
    let stale = store.acquire_lock("crashed").await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(!store.lock_manager().is_locked());
    assert_eq!(store.lock_stats().forced_releases, 1);
    assert!(!store.release_lock(stale.lock_id));

    let fresh = store.acquire_lock("next").await.unwrap();
    assert_ne!(fresh.lock_id, stale.lock_id);
    assert!(store.release_lock(fresh.lock_id));
}

#[tokio::test]
async fn test_with_lock_releases_after_the_transaction() {
    let store = store_with(1_000, 10_000);
    let locks = store.lock_manager().clone();
    let store = Arc::new(Mutex::new(store));

    let inner = Arc::clone(&store);
    let id = locks
        .with_lock("editor", || async move {
            let mut store = inner.lock().unwrap();
            store.transaction(|s| s.add_child("root", Node::text("line", "x"), None))
        })
        .await
        .unwrap()
        .unwrap();

    assert!(!locks.is_locked());
    assert!(store.lock().unwrap().contains(&id));
}

#[tokio::test]
async fn test_stats_serialize_in_camel_case() {
    let store = store_with(1_000, 10_000);
    let token = store.acquire_lock("editor").await.unwrap();

    let value = serde_json::to_value(store.lock_stats()).unwrap();
    assert_eq!(value["isLocked"], serde_json::json!(true));
    assert_eq!(value["currentLock"]["owner"], serde_json::json!("editor"));
    assert_eq!(value["totalAcquisitions"], serde_json::json!(1));
    assert!(value.get("averageWaitTimeMs").is_some());

    store.release_lock(token.lock_id);
}

#[test]
fn test_lock_timings_come_from_config() {
    let store = store_with(123, 456);
    let config = store.lock_manager().config();
    assert_eq!(config.wait_timeout, Duration::from_millis(123));
    assert_eq!(config.max_hold, Duration::from_millis(456));

    let bad = StoreConfig {
        lock_wait_timeout_ms: 10,
        lock_max_hold_ms: 5,
        ..StoreConfig::default()
    };
    assert!(matches!(DocumentStore::with_config(bad), Err(Error::Config(_))));
}
