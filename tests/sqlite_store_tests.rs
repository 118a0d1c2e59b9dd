//! SQLite backend integration tests
//!
//! Runs the full [`ReferralStore`] contract against a real SQLite file:
//! schema bootstrap, the click/card join, owner scoping and the profile
//! upsert.

use chrono::{Duration, Utc};
use tempfile::TempDir;

use refstack::storage::models::{
    ActivityLogEntry, ActivityType, ClickEvent, ClickFilter, Link, ReferralCard,
    SubscriptionProfile, SubscriptionStatus,
};
use refstack::storage::{ReferralStore, SeaOrmStore};

async fn sqlite_store() -> (SeaOrmStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}/refstack-test.db", dir.path().display());
    let store = SeaOrmStore::connect(&url).await.unwrap();
    (store, dir)
}

fn card(user_id: &str, title: &str) -> ReferralCard {
    ReferralCard::new(user_id, title).with_links(vec![Link {
        label: "Main".into(),
        url: "https://example.com/main".into(),
    }])
}

fn click(card: &ReferralCard, referrer: &str) -> ClickEvent {
    ClickEvent {
        id: uuid::Uuid::new_v4().to_string(),
        referral_id: card.id.clone(),
        user_id: card.user_id.clone(),
        link_index: 0,
        clicked_at: Utc::now(),
        user_agent: "test-agent".into(),
        referrer: referrer.into(),
    }
}

#[tokio::test]
async fn card_round_trip_and_owner_scoping() {
    let (store, _dir) = sqlite_store().await;
    let card = card("user-1", "My card");
    store.insert_card(card.clone()).await.unwrap();

    let loaded = store.get_card(&card.id).await.unwrap().unwrap();
    assert_eq!(loaded.title, "My card");
    assert_eq!(loaded.links, card.links);

    // another user cannot update or delete it
    let mut hijacked = loaded.clone();
    hijacked.title = "Stolen".into();
    assert!(store.update_card("user-2", hijacked).await.is_err());
    assert!(store.delete_card("user-2", &card.id).await.is_err());

    // the owner can
    let mut renamed = loaded.clone();
    renamed.title = "Renamed".into();
    store.update_card("user-1", renamed).await.unwrap();
    assert_eq!(
        store.get_card(&card.id).await.unwrap().unwrap().title,
        "Renamed"
    );
    store.delete_card("user-1", &card.id).await.unwrap();
    assert!(store.get_card(&card.id).await.unwrap().is_none());
}

#[tokio::test]
async fn click_query_joins_card_metadata() {
    let (store, _dir) = sqlite_store().await;
    let mut tagged = card("user-1", "Tech deals");
    tagged.category = Some("tech".into());
    store.insert_card(tagged.clone()).await.unwrap();

    store.insert_click(click(&tagged, "")).await.unwrap();
    store
        .insert_click(click(&tagged, "https://x.com"))
        .await
        .unwrap();

    let now = Utc::now();
    let rows = store
        .query_clicks(
            "user-1",
            now - Duration::hours(1),
            now + Duration::seconds(1),
            &ClickFilter::default(),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    let meta = rows[0].card.as_ref().unwrap();
    assert_eq!(meta.title, "Tech deals");
    assert_eq!(meta.category.as_deref(), Some("tech"));

    // category filter matches via the joined card
    let by_category = store
        .query_clicks(
            "user-1",
            now - Duration::hours(1),
            now + Duration::seconds(1),
            &ClickFilter {
                category: Some("tech".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_category.len(), 2);

    let no_match = store
        .query_clicks(
            "user-1",
            now - Duration::hours(1),
            now + Duration::seconds(1),
            &ClickFilter {
                category: Some("food".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(no_match.is_empty());
}

#[tokio::test]
async fn clicks_survive_card_deletion() {
    let (store, _dir) = sqlite_store().await;
    let card = card("user-1", "Short lived");
    store.insert_card(card.clone()).await.unwrap();
    store.insert_click(click(&card, "")).await.unwrap();
    store.delete_card("user-1", &card.id).await.unwrap();

    let now = Utc::now();
    let rows = store
        .query_clicks(
            "user-1",
            now - Duration::hours(1),
            now + Duration::seconds(1),
            &ClickFilter::default(),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].card.is_none());
}

#[tokio::test]
async fn click_counter_update_persists() {
    let (store, _dir) = sqlite_store().await;
    let card = card("user-1", "Counting");
    store.insert_card(card.clone()).await.unwrap();

    store.set_click_count(&card.id, 7).await.unwrap();
    assert_eq!(store.get_card(&card.id).await.unwrap().unwrap().clicks, 7);

    assert!(store.set_click_count("no-such-card", 1).await.is_err());
}

#[tokio::test]
async fn activity_log_round_trips_with_limit() {
    let (store, _dir) = sqlite_store().await;
    for i in 0..15 {
        store
            .insert_activity(ActivityLogEntry::new(
                "user-1",
                ActivityType::LinkClicked,
                serde_json::json!({ "n": i }),
            ))
            .await
            .unwrap();
    }

    let now = Utc::now();
    let recent = store
        .recent_activity(
            "user-1",
            now - Duration::hours(1),
            now + Duration::seconds(1),
            10,
        )
        .await
        .unwrap();
    assert_eq!(recent.len(), 10);
    assert!(
        recent
            .iter()
            .all(|entry| entry.activity_type == ActivityType::LinkClicked)
    );
}

#[tokio::test]
async fn profile_upsert_overwrites_in_place() {
    let (store, _dir) = sqlite_store().await;
    store
        .upsert_profile(SubscriptionProfile {
            user_id: "user-1".into(),
            email: Some("old@example.com".into()),
            subscription_status: SubscriptionStatus::Free,
        })
        .await
        .unwrap();
    store
        .upsert_profile(SubscriptionProfile {
            user_id: "user-1".into(),
            email: Some("new@example.com".into()),
            subscription_status: SubscriptionStatus::Pro,
        })
        .await
        .unwrap();

    let profile = store.get_profile("user-1").await.unwrap().unwrap();
    assert_eq!(profile.email.as_deref(), Some("new@example.com"));
    assert_eq!(profile.subscription_status, SubscriptionStatus::Pro);

    assert!(store.get_profile("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn feed_broadcasts_database_inserts() {
    let (store, _dir) = sqlite_store().await;
    let card = card("user-1", "Live");
    store.insert_card(card.clone()).await.unwrap();

    let mut feed = store.subscribe_clicks();
    let event = click(&card, "https://x.com");
    store.insert_click(event.clone()).await.unwrap();

    let received = feed.recv().await.unwrap();
    assert_eq!(received.id, event.id);
    assert_eq!(received.referrer, "https://x.com");
}
