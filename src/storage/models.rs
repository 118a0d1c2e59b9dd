//! Domain models shared by all storage backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::errors::{RefStackError, Result};
use crate::utils::url_validator::validate_url;

/// 每张卡片允许的最大链接数
pub const MAX_LINKS_PER_CARD: usize = 3;

/// Source bucket used when a click carries no referrer
pub const DIRECT_SOURCE: &str = "Direct";

/// A single labeled link on a referral card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub label: String,
    pub url: String,
}

/// A user-owned bundle of up to three referral links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralCard {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub clicks: usize,
    #[serde(default)]
    pub views: usize,
    pub created_at: DateTime<Utc>,
}

impl ReferralCard {
    pub fn new<U: Into<String>, T: Into<String>>(user_id: U, title: T) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            description: String::new(),
            links: Vec::new(),
            image_url: None,
            category: None,
            clicks: 0,
            views: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    pub fn with_category<C: Into<String>>(mut self, category: C) -> Self {
        self.category = Some(category.into());
        self
    }

    /// 校验卡片不变量：标题非空、链接数 ≤ 3、每条链接 label 非空且 URL 合法
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(RefStackError::validation("Card title cannot be empty"));
        }
        if self.links.len() > MAX_LINKS_PER_CARD {
            return Err(RefStackError::validation(format!(
                "A card may hold at most {} links, got {}",
                MAX_LINKS_PER_CARD,
                self.links.len()
            )));
        }
        for (index, link) in self.links.iter().enumerate() {
            if link.label.trim().is_empty() {
                return Err(RefStackError::validation(format!(
                    "Link {} has an empty label",
                    index
                )));
            }
            validate_url(&link.url)
                .map_err(|e| RefStackError::validation(format!("Link {}: {}", index, e)))?;
        }
        Ok(())
    }
}

/// A record of one visitor activating one link on one card
///
/// Append-only. `user_id` is the card owner, denormalized so the change
/// feed can be filtered per user without a lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    pub id: String,
    pub referral_id: String,
    pub user_id: String,
    pub link_index: i32,
    pub clicked_at: DateTime<Utc>,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub referrer: String,
}

impl ClickEvent {
    /// 来源归一化：空 referrer 视为直接访问
    pub fn source(&self) -> &str {
        if self.referrer.trim().is_empty() {
            DIRECT_SOURCE
        } else {
            &self.referrer
        }
    }

    /// UTC 日粒度时间桶 (YYYY-MM-DD)
    pub fn day_bucket(&self) -> String {
        self.clicked_at.format("%Y-%m-%d").to_string()
    }
}

/// Enumerated activity tags, serialized as snake_case strings
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityType {
    ReferralCreated,
    ReferralUpdated,
    ReferralDeleted,
    LinkClicked,
    ProfileUpdated,
    SubscriptionChanged,
    ErrorOccurred,
    PerformanceIssue,
}

/// Append-only activity/error/performance record for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub user_id: String,
    pub activity_type: ActivityType,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new<U: Into<String>>(
        user_id: U,
        activity_type: ActivityType,
        details: serde_json::Value,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            activity_type,
            details,
            created_at: Utc::now(),
        }
    }
}

/// Subscription tier, read-only from this crate's perspective
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Free,
    Pro,
}

/// Payment/subscription view of a user, consumed by the quota checker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionProfile {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
}

/// Card metadata carried alongside each click row by the join query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardMeta {
    pub id: String,
    pub title: String,
    pub links: Vec<Link>,
    #[serde(default)]
    pub category: Option<String>,
}

impl From<&ReferralCard> for CardMeta {
    fn from(card: &ReferralCard) -> Self {
        Self {
            id: card.id.clone(),
            title: card.title.clone(),
            links: card.links.clone(),
            category: card.category.clone(),
        }
    }
}

/// One click event joined with its owning card's metadata
///
/// `card` is `None` when the card has been deleted since the click was
/// recorded; such rows still count toward totals and source buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickRow {
    pub event: ClickEvent,
    pub card: Option<CardMeta>,
}

/// Storage-level equality filters for the click query
///
/// An absent field applies no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ClickFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.referral_id.is_none() && self.source.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_with_links(links: Vec<Link>) -> ReferralCard {
        ReferralCard::new("user-1", "My card").with_links(links)
    }

    fn link(label: &str, url: &str) -> Link {
        Link {
            label: label.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn card_accepts_up_to_three_links() {
        let card = card_with_links(vec![
            link("A", "https://a.example.com"),
            link("B", "https://b.example.com"),
            link("C", "https://c.example.com"),
        ]);
        assert!(card.validate().is_ok());
    }

    #[test]
    fn card_rejects_four_links() {
        let card = card_with_links(vec![
            link("A", "https://a.example.com"),
            link("B", "https://b.example.com"),
            link("C", "https://c.example.com"),
            link("D", "https://d.example.com"),
        ]);
        assert!(card.validate().is_err());
    }

    #[test]
    fn card_rejects_empty_label_and_bad_url() {
        let card = card_with_links(vec![link("", "https://a.example.com")]);
        assert!(card.validate().is_err());

        let card = card_with_links(vec![link("A", "javascript:alert(1)")]);
        assert!(card.validate().is_err());
    }

    #[test]
    fn empty_referrer_maps_to_direct() {
        let mut event = ClickEvent {
            id: "e1".into(),
            referral_id: "c1".into(),
            user_id: "u1".into(),
            link_index: 0,
            clicked_at: Utc::now(),
            user_agent: String::new(),
            referrer: String::new(),
        };
        assert_eq!(event.source(), DIRECT_SOURCE);
        event.referrer = "https://news.ycombinator.com".into();
        assert_eq!(event.source(), "https://news.ycombinator.com");
    }

    #[test]
    fn activity_type_round_trips_as_snake_case() {
        let json = serde_json::to_string(&ActivityType::LinkClicked).unwrap();
        assert_eq!(json, "\"link_clicked\"");
        assert_eq!(ActivityType::ErrorOccurred.to_string(), "error_occurred");
    }
}
