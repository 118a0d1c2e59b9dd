//! In-memory storage backend
//!
//! Reference implementation of [`ReferralStore`], used by tests and for
//! running without a database. Click and activity logs are append-only
//! vectors; cards and profiles live in a `DashMap`.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use super::ReferralStore;
use super::models::{
    ActivityLogEntry, CardMeta, ClickEvent, ClickFilter, ClickRow, ReferralCard,
    SubscriptionProfile,
};
use crate::errors::{RefStackError, Result};

const FEED_CAPACITY: usize = 1000;

pub struct InMemoryStore {
    cards: DashMap<String, ReferralCard>,
    clicks: RwLock<Vec<ClickEvent>>,
    activities: RwLock<Vec<ActivityLogEntry>>,
    profiles: DashMap<String, SubscriptionProfile>,
    feed: broadcast::Sender<ClickEvent>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            cards: DashMap::new(),
            clicks: RwLock::new(Vec::new()),
            activities: RwLock::new(Vec::new()),
            profiles: DashMap::new(),
            feed,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReferralStore for InMemoryStore {
    async fn insert_card(&self, card: ReferralCard) -> Result<()> {
        card.validate()?;
        self.cards.insert(card.id.clone(), card);
        Ok(())
    }

    async fn get_card(&self, card_id: &str) -> Result<Option<ReferralCard>> {
        Ok(self.cards.get(card_id).map(|c| c.clone()))
    }

    async fn update_card(&self, user_id: &str, card: ReferralCard) -> Result<()> {
        card.validate()?;
        match self.cards.get_mut(&card.id) {
            Some(mut existing) if existing.user_id == user_id => {
                *existing = card;
                Ok(())
            }
            _ => Err(RefStackError::not_found(format!(
                "No card '{}' owned by user '{}'",
                card.id, user_id
            ))),
        }
    }

    async fn delete_card(&self, user_id: &str, card_id: &str) -> Result<()> {
        let removed = self
            .cards
            .remove_if(card_id, |_, card| card.user_id == user_id);
        if removed.is_none() {
            return Err(RefStackError::not_found(format!(
                "No card '{}' owned by user '{}'",
                card_id, user_id
            )));
        }
        Ok(())
    }

    async fn cards_for_user(&self, user_id: &str) -> Result<Vec<ReferralCard>> {
        let mut cards: Vec<ReferralCard> = self
            .cards
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        cards.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(cards)
    }

    async fn set_click_count(&self, card_id: &str, clicks: usize) -> Result<()> {
        match self.cards.get_mut(card_id) {
            Some(mut card) => {
                card.clicks = clicks;
                Ok(())
            }
            None => Err(RefStackError::not_found(format!(
                "Card '{}' does not exist",
                card_id
            ))),
        }
    }

    async fn insert_click(&self, event: ClickEvent) -> Result<()> {
        self.clicks
            .write()
            .map_err(|e| RefStackError::database_operation(e.to_string()))?
            .push(event.clone());
        // 没有订阅者时发送失败是正常情况
        if self.feed.send(event).is_err() {
            trace!("Click feed has no active subscribers");
        }
        Ok(())
    }

    async fn query_clicks(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &ClickFilter,
    ) -> Result<Vec<ClickRow>> {
        let clicks = self
            .clicks
            .read()
            .map_err(|e| RefStackError::database_operation(e.to_string()))?;

        let mut rows: Vec<ClickRow> = clicks
            .iter()
            .filter(|event| {
                event.user_id == user_id && event.clicked_at >= start && event.clicked_at <= end
            })
            .filter(|event| {
                filter
                    .referral_id
                    .as_ref()
                    .is_none_or(|rid| &event.referral_id == rid)
            })
            .filter(|event| filter.source.as_ref().is_none_or(|src| &event.referrer == src))
            .map(|event| ClickRow {
                event: event.clone(),
                card: self
                    .cards
                    .get(&event.referral_id)
                    .map(|card| CardMeta::from(&*card)),
            })
            .filter(|row| {
                filter.category.as_ref().is_none_or(|cat| {
                    row.card
                        .as_ref()
                        .and_then(|c| c.category.as_ref())
                        .is_some_and(|c| c == cat)
                })
            })
            .collect();

        // 稳定排序：同一时间戳保持插入顺序
        rows.sort_by(|a, b| b.event.clicked_at.cmp(&a.event.clicked_at));
        Ok(rows)
    }

    async fn insert_activity(&self, entry: ActivityLogEntry) -> Result<()> {
        self.activities
            .write()
            .map_err(|e| RefStackError::database_operation(e.to_string()))?
            .push(entry);
        Ok(())
    }

    async fn recent_activity(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>> {
        let activities = self
            .activities
            .read()
            .map_err(|e| RefStackError::database_operation(e.to_string()))?;

        let mut entries: Vec<ActivityLogEntry> = activities
            .iter()
            .filter(|entry| {
                entry.user_id == user_id && entry.created_at >= start && entry.created_at <= end
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<SubscriptionProfile>> {
        Ok(self.profiles.get(user_id).map(|p| p.clone()))
    }

    async fn upsert_profile(&self, profile: SubscriptionProfile) -> Result<()> {
        self.profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    fn subscribe_clicks(&self) -> broadcast::Receiver<ClickEvent> {
        self.feed.subscribe()
    }
}
