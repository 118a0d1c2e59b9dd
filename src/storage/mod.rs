//! Storage layer
//!
//! The analytics core reaches persistence through the [`ReferralStore`]
//! trait only. Two backends are provided:
//!
//! - `sea_orm`: SQLite / MySQL / PostgreSQL via SeaORM (production)
//! - `memory`: DashMap-based in-process store (tests, reference)
//!
//! Both expose newly inserted click events as a `tokio::sync::broadcast`
//! change feed consumed by the realtime bridge. The feed covers inserts
//! made through this process's store handle.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

pub mod memory;
pub mod models;
pub mod sea_orm;

pub use memory::InMemoryStore;
pub use models::{
    ActivityLogEntry, ActivityType, CardMeta, ClickEvent, ClickFilter, ClickRow, Link,
    ReferralCard, SubscriptionProfile, SubscriptionStatus,
};
pub use self::sea_orm::SeaOrmStore;

use crate::errors::{RefStackError, Result};

/// Row-level access to cards, click events, activity logs and profiles
///
/// Every read/write is partitioned by the owning user id except
/// [`get_card`](ReferralStore::get_card) and
/// [`set_click_count`](ReferralStore::set_click_count), which run in
/// visitor context (a public card view has no authenticated user).
#[async_trait]
pub trait ReferralStore: Send + Sync {
    async fn insert_card(&self, card: ReferralCard) -> Result<()>;

    async fn get_card(&self, card_id: &str) -> Result<Option<ReferralCard>>;

    /// Owner-scoped whole-card update (the link list is replaced as a unit)
    async fn update_card(&self, user_id: &str, card: ReferralCard) -> Result<()>;

    /// Owner-scoped delete
    async fn delete_card(&self, user_id: &str, card_id: &str) -> Result<()>;

    async fn cards_for_user(&self, user_id: &str) -> Result<Vec<ReferralCard>>;

    /// Plain counter write, no compare-and-swap. The recorder's
    /// read-then-write increment goes through here; see
    /// `services::click_service` for the accepted lost-update race.
    async fn set_click_count(&self, card_id: &str, clicks: usize) -> Result<()>;

    async fn insert_click(&self, event: ClickEvent) -> Result<()>;

    /// Click events joined with owning-card metadata, newest first,
    /// restricted to `clicked_at ∈ [start, end]` plus the equality
    /// filters in `filter`.
    async fn query_clicks(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &ClickFilter,
    ) -> Result<Vec<ClickRow>>;

    async fn insert_activity(&self, entry: ActivityLogEntry) -> Result<()>;

    /// Most recent activity entries within the window, newest first
    async fn recent_activity(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<SubscriptionProfile>>;

    async fn upsert_profile(&self, profile: SubscriptionProfile) -> Result<()>;

    /// Change feed of newly inserted click events, in arrival order
    fn subscribe_clicks(&self) -> broadcast::Receiver<ClickEvent>;
}

/// 从数据库 URL 推断后端类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("memory://") {
        Ok("memory".to_string())
    } else if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(RefStackError::database_config(format!(
            "Cannot infer database backend from URL: {}. Supported: memory://, sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

pub struct StorageFactory;

impl StorageFactory {
    /// 根据配置的 database_url 创建存储后端
    pub async fn create() -> Result<Arc<dyn ReferralStore>> {
        let config = crate::config::get_config();
        Self::create_from_url(&config.database.database_url).await
    }

    pub async fn create_from_url(database_url: &str) -> Result<Arc<dyn ReferralStore>> {
        match infer_backend_from_url(database_url)?.as_str() {
            "memory" => Ok(Arc::new(InMemoryStore::new())),
            _ => {
                let store = SeaOrmStore::connect(database_url).await?;
                Ok(Arc::new(store))
            }
        }
    }
}
