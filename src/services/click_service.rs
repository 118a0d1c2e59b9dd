//! Click recording service
//!
//! Records one visitor click: bumps the card's cumulative counter, appends
//! a [`ClickEvent`](crate::storage::models::ClickEvent) row, invalidates
//! the aggregation cache and, every `milestone_interval`th cumulative
//! click, emits a milestone notification through the outbound queue.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cache::AggregationCache;
use crate::errors::{RefStackError, Result};
use crate::storage::ReferralStore;
use crate::storage::models::ClickEvent;
use crate::system::event::{NotificationEvent, NotificationQueue};

/// Request-scoped click context supplied by the embedding layer
#[derive(Debug, Clone, Default)]
pub struct ClickContext {
    pub user_agent: String,
    pub referrer: String,
}

/// Outcome of a successfully recorded click
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedClick {
    pub new_click_count: usize,
    pub milestone: bool,
}

pub struct ClickRecorder {
    store: Arc<dyn ReferralStore>,
    cache: Arc<AggregationCache>,
    notifications: NotificationQueue,
    milestone_interval: usize,
}

impl ClickRecorder {
    pub fn new(
        store: Arc<dyn ReferralStore>,
        cache: Arc<AggregationCache>,
        notifications: NotificationQueue,
    ) -> Self {
        let milestone_interval = crate::config::get_config().analytics.milestone_interval;
        Self {
            store,
            cache,
            notifications,
            milestone_interval,
        }
    }

    pub fn with_milestone_interval(mut self, interval: usize) -> Self {
        self.milestone_interval = interval.max(1);
        self
    }

    /// 记录一次点击
    ///
    /// Two independent writes in order: counter update, then event insert.
    /// The counter update is read-then-write with no compare-and-swap, so
    /// concurrent clicks on one card can lose increments; approximate
    /// counts are accepted here. An out-of-range `link_index` is tolerated
    /// and simply yields an event with no resolvable link. Neither write is
    /// rolled back when the other fails.
    pub async fn record_click(
        &self,
        card_id: &str,
        link_index: i32,
        ctx: ClickContext,
    ) -> Result<RecordedClick> {
        let card = self
            .store
            .get_card(card_id)
            .await?
            .ok_or_else(|| RefStackError::not_found(format!("Card '{}' does not exist", card_id)))?;

        let new_click_count = card.clicks + 1;
        self.store.set_click_count(card_id, new_click_count).await?;

        let event = ClickEvent {
            id: uuid::Uuid::new_v4().to_string(),
            referral_id: card.id.clone(),
            user_id: card.user_id.clone(),
            link_index,
            clicked_at: Utc::now(),
            user_agent: ctx.user_agent,
            referrer: ctx.referrer,
        };
        self.store.insert_click(event).await?;

        // coarse invalidation: every cached aggregation goes, not just
        // this card owner's entries
        self.cache.clear();

        let milestone = new_click_count % self.milestone_interval == 0;
        if milestone {
            info!(
                "Card '{}' reached {} clicks, queueing milestone notification",
                card_id, new_click_count
            );
            self.notify_milestone(&card.user_id, &card.title, new_click_count)
                .await;
        }

        debug!(
            "Recorded click on card '{}' link {} (count now {})",
            card_id, link_index, new_click_count
        );
        Ok(RecordedClick {
            new_click_count,
            milestone,
        })
    }

    /// Fire-and-forget: a failed profile lookup downgrades the event to
    /// one without an email address, it never fails the click.
    async fn notify_milestone(&self, user_id: &str, card_title: &str, click_count: usize) {
        let email = match self.store.get_profile(user_id).await {
            Ok(profile) => profile.and_then(|p| p.email),
            Err(e) => {
                warn!("Profile lookup for milestone notification failed: {}", e);
                None
            }
        };
        self.notifications.publish(NotificationEvent::ClickMilestone {
            user_id: user_id.to_string(),
            email,
            card_title: card_title.to_string(),
            click_count,
        });
    }
}
