//! Free-tier link quota
//!
//! Pro subscribers are unlimited; free users may hold at most
//! `free_link_limit` links summed across all of their cards.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{RefStackError, Result};
use crate::storage::ReferralStore;
use crate::storage::models::SubscriptionStatus;

pub struct QuotaService {
    store: Arc<dyn ReferralStore>,
    free_link_limit: usize,
}

impl QuotaService {
    pub fn new(store: Arc<dyn ReferralStore>) -> Self {
        let free_link_limit = crate::config::get_config().analytics.free_link_limit;
        Self {
            store,
            free_link_limit,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.free_link_limit = limit;
        self
    }

    /// 用户是否还能再添加一条链接
    ///
    /// A missing profile is an error, matching the upstream behavior of
    /// treating "no subscription row" the same as a failed read.
    pub async fn check_link_limit(&self, user_id: &str) -> Result<bool> {
        let profile = self.store.get_profile(user_id).await?.ok_or_else(|| {
            RefStackError::not_found(format!("No profile for user '{}'", user_id))
        })?;

        if profile.subscription_status == SubscriptionStatus::Pro {
            return Ok(true);
        }

        let cards = self.store.cards_for_user(user_id).await?;
        let total_links: usize = cards.iter().map(|card| card.links.len()).sum();
        debug!(
            "User {} holds {} links (free limit {})",
            user_id, total_links, self.free_link_limit
        );
        Ok(total_links < self.free_link_limit)
    }

    /// Deny-by-default wrapper: any failure reads as "not allowed"
    pub async fn is_allowed(&self, user_id: &str) -> bool {
        match self.check_link_limit(user_id).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!("Link limit check failed for user {}: {}", user_id, e);
                false
            }
        }
    }
}
