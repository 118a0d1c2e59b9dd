//! Realtime click feed integration tests
//!
//! Verifies per-user filtering, arrival order, the realtime fold into an
//! aggregation result and subscription teardown.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use refstack::analytics::AggregationResult;
use refstack::realtime::RealtimeBridge;
use refstack::storage::models::ClickEvent;
use refstack::storage::{InMemoryStore, ReferralStore};

fn click(id: &str, user_id: &str) -> ClickEvent {
    ClickEvent {
        id: id.to_string(),
        referral_id: "card-1".to_string(),
        user_id: user_id.to_string(),
        link_index: 0,
        clicked_at: Utc::now(),
        user_agent: String::new(),
        referrer: String::new(),
    }
}

async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}

#[tokio::test]
async fn subscriber_sees_only_its_own_user_in_order() {
    let store = Arc::new(InMemoryStore::new());
    let bridge = RealtimeBridge::new(store.clone());

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = bridge.subscribe("user-1", move |event| {
        sink.lock().unwrap().push(event.id);
    });

    store.insert_click(click("e1", "user-1")).await.unwrap();
    store.insert_click(click("e2", "user-2")).await.unwrap();
    store.insert_click(click("e3", "user-1")).await.unwrap();

    settle().await;
    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec!["e1".to_string(), "e3".to_string()]);
}

#[tokio::test]
async fn events_fold_into_a_live_aggregation() {
    let store = Arc::new(InMemoryStore::new());
    let bridge = RealtimeBridge::new(store.clone());

    let live: Arc<Mutex<AggregationResult>> = Arc::new(Mutex::new(AggregationResult::default()));
    let sink = live.clone();
    let _sub = bridge.subscribe("user-1", move |event| {
        sink.lock().unwrap().apply_click(&event);
    });

    for i in 0..3 {
        store
            .insert_click(click(&format!("e{}", i), "user-1"))
            .await
            .unwrap();
    }

    settle().await;
    let result = live.lock().unwrap();
    assert_eq!(result.total_clicks, 3);
    let bucket_sum: u64 = result.clicks_by_time.values().sum();
    assert_eq!(bucket_sum, 3);
    assert_eq!(result.recent_activity.len(), 3);
    // newest first
    assert_eq!(result.recent_activity[0].event.id, "e2");
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let store = Arc::new(InMemoryStore::new());
    let bridge = RealtimeBridge::new(store.clone());

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let sub = bridge.subscribe("user-1", move |event| {
        sink.lock().unwrap().push(event.id);
    });

    store.insert_click(click("e1", "user-1")).await.unwrap();
    settle().await;
    sub.unsubscribe();

    store.insert_click(click("e2", "user-1")).await.unwrap();
    settle().await;

    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec!["e1".to_string()]);
}

#[tokio::test]
async fn dropping_the_handle_releases_the_subscription() {
    let store = Arc::new(InMemoryStore::new());
    let bridge = RealtimeBridge::new(store.clone());

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    {
        let _sub = bridge.subscribe("user-1", move |event| {
            sink.lock().unwrap().push(event.id);
        });
        // _sub dropped here
    }
    settle().await;

    store.insert_click(click("e1", "user-1")).await.unwrap();
    settle().await;
    assert!(seen.lock().unwrap().is_empty());
}
