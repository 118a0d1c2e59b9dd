//! SeaORM storage backend
//!
//! Database-backed [`ReferralStore`] supporting SQLite, MySQL/MariaDB and
//! PostgreSQL. The schema is bootstrapped from the entity definitions at
//! connect time (`CREATE TABLE IF NOT EXISTS`), so no separate migration
//! step is required.

pub mod entities;

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Alias, Index, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Schema,
};
use tokio::sync::broadcast;
use tracing::{info, trace, warn};

use super::models::{
    ActivityLogEntry, ActivityType, CardMeta, ClickEvent, ClickFilter, ClickRow, ReferralCard,
    SubscriptionProfile, SubscriptionStatus,
};
use super::{ReferralStore, infer_backend_from_url};
use crate::errors::{RefStackError, Result};

use entities::{click_log, profile, referral_card, user_activity_log};

const FEED_CAPACITY: usize = 1000;

pub struct SeaOrmStore {
    db: DatabaseConnection,
    feed: broadcast::Sender<ClickEvent>,
}

impl SeaOrmStore {
    /// 连接数据库并初始化表结构
    pub async fn connect(database_url: &str) -> Result<Self> {
        let backend = infer_backend_from_url(database_url)?;
        let db = match backend.as_str() {
            "sqlite" => connect_sqlite(database_url).await?,
            other => connect_generic(database_url, other).await?,
        };
        init_schema(&db).await?;
        info!("Connected to {} database", backend);

        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Ok(Self { db, feed })
    }

    /// Wrap an existing connection (used by tests)
    pub fn with_connection(db: DatabaseConnection) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self { db, feed }
    }
}

/// 连接 SQLite 数据库（带自动创建和 WAL 模式）
async fn connect_sqlite(database_url: &str) -> Result<DatabaseConnection> {
    use sea_orm::SqlxSqliteConnector;
    use sea_orm::sqlx::SqlitePool;
    use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};

    let opt = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| RefStackError::database_config(format!("Invalid SQLite URL: {}", e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(5));

    let pool = SqlitePool::connect_with(opt).await.map_err(|e| {
        RefStackError::database_connection(format!("Cannot connect to SQLite database: {}", e))
    })?;

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

/// 连接通用数据库（MySQL/PostgreSQL）
async fn connect_generic(database_url: &str, backend_name: &str) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(10)
        .min_connections(2)
        .connect_timeout(std::time::Duration::from_secs(8))
        .acquire_timeout(std::time::Duration::from_secs(8))
        .sqlx_logging(false);

    Database::connect(opt).await.map_err(|e| {
        RefStackError::database_connection(format!(
            "Cannot connect to {} database: {}",
            backend_name.to_uppercase(),
            e
        ))
    })
}

/// 从实体定义创建表和索引
async fn init_schema(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(referral_card::Entity),
        schema.create_table_from_entity(click_log::Entity),
        schema.create_table_from_entity(user_activity_log::Entity),
        schema.create_table_from_entity(profile::Entity),
    ];
    for stmt in &mut statements {
        stmt.if_not_exists();
        db.execute(&*stmt).await?;
    }

    let indexes = [
        Index::create()
            .if_not_exists()
            .name("idx_click_logs_user_time")
            .table(Alias::new("click_logs"))
            .col(Alias::new("user_id"))
            .col(Alias::new("clicked_at"))
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_activity_logs_user_time")
            .table(Alias::new("user_activity_logs"))
            .col(Alias::new("user_id"))
            .col(Alias::new("created_at"))
            .to_owned(),
    ];
    for index in indexes {
        db.execute(&index).await?;
    }

    Ok(())
}

// ============ converters ============

fn model_to_card(model: referral_card::Model) -> ReferralCard {
    ReferralCard {
        id: model.id,
        user_id: model.user_id,
        title: model.title,
        description: model.description,
        links: serde_json::from_value(model.links).unwrap_or_default(),
        image_url: model.image_url,
        category: model.category,
        clicks: model.clicks.max(0) as usize,
        views: model.views.max(0) as usize,
        created_at: model.created_at,
    }
}

fn card_to_active_model(card: &ReferralCard) -> Result<referral_card::ActiveModel> {
    Ok(referral_card::ActiveModel {
        id: Set(card.id.clone()),
        user_id: Set(card.user_id.clone()),
        title: Set(card.title.clone()),
        description: Set(card.description.clone()),
        links: Set(serde_json::to_value(&card.links)?),
        image_url: Set(card.image_url.clone()),
        category: Set(card.category.clone()),
        clicks: Set(card.clicks as i64),
        views: Set(card.views as i64),
        created_at: Set(card.created_at),
    })
}

fn model_to_click(model: click_log::Model) -> ClickEvent {
    ClickEvent {
        id: model.id,
        referral_id: model.referral_id,
        user_id: model.user_id,
        link_index: model.link_index,
        clicked_at: model.clicked_at,
        user_agent: model.user_agent,
        referrer: model.referrer,
    }
}

fn model_to_activity(model: user_activity_log::Model) -> Option<ActivityLogEntry> {
    let activity_type = match ActivityType::from_str(&model.activity_type) {
        Ok(tag) => tag,
        Err(_) => {
            warn!(
                "Skipping activity row {} with unknown tag '{}'",
                model.id, model.activity_type
            );
            return None;
        }
    };
    Some(ActivityLogEntry {
        user_id: model.user_id,
        activity_type,
        details: model.details,
        created_at: model.created_at,
    })
}

// ============ ReferralStore ============

#[async_trait]
impl ReferralStore for SeaOrmStore {
    async fn insert_card(&self, card: ReferralCard) -> Result<()> {
        card.validate()?;
        let model = card_to_active_model(&card)?;
        referral_card::Entity::insert(model).exec(&self.db).await?;
        Ok(())
    }

    async fn get_card(&self, card_id: &str) -> Result<Option<ReferralCard>> {
        let model = referral_card::Entity::find_by_id(card_id)
            .one(&self.db)
            .await?;
        Ok(model.map(model_to_card))
    }

    async fn update_card(&self, user_id: &str, card: ReferralCard) -> Result<()> {
        card.validate()?;
        let model = card_to_active_model(&card)?;
        let result = referral_card::Entity::update_many()
            .set(model)
            .filter(referral_card::Column::Id.eq(&card.id))
            .filter(referral_card::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(RefStackError::not_found(format!(
                "No card '{}' owned by user '{}'",
                card.id, user_id
            )));
        }
        Ok(())
    }

    async fn delete_card(&self, user_id: &str, card_id: &str) -> Result<()> {
        let result = referral_card::Entity::delete_many()
            .filter(referral_card::Column::Id.eq(card_id))
            .filter(referral_card::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(RefStackError::not_found(format!(
                "No card '{}' owned by user '{}'",
                card_id, user_id
            )));
        }
        Ok(())
    }

    async fn cards_for_user(&self, user_id: &str) -> Result<Vec<ReferralCard>> {
        let models = referral_card::Entity::find()
            .filter(referral_card::Column::UserId.eq(user_id))
            .order_by_asc(referral_card::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_card).collect())
    }

    async fn set_click_count(&self, card_id: &str, clicks: usize) -> Result<()> {
        let result = referral_card::Entity::update_many()
            .set(referral_card::ActiveModel {
                clicks: Set(clicks as i64),
                ..Default::default()
            })
            .filter(referral_card::Column::Id.eq(card_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(RefStackError::not_found(format!(
                "Card '{}' does not exist",
                card_id
            )));
        }
        Ok(())
    }

    async fn insert_click(&self, event: ClickEvent) -> Result<()> {
        let model = click_log::ActiveModel {
            id: Set(event.id.clone()),
            referral_id: Set(event.referral_id.clone()),
            user_id: Set(event.user_id.clone()),
            link_index: Set(event.link_index),
            clicked_at: Set(event.clicked_at),
            user_agent: Set(event.user_agent.clone()),
            referrer: Set(event.referrer.clone()),
        };
        click_log::Entity::insert(model).exec(&self.db).await?;

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
        let mut query = click_log::Entity::find()
            .filter(click_log::Column::UserId.eq(user_id))
            .filter(click_log::Column::ClickedAt.gte(start))
            .filter(click_log::Column::ClickedAt.lte(end));

        if let Some(referral_id) = &filter.referral_id {
            query = query.filter(click_log::Column::ReferralId.eq(referral_id));
        }
        if let Some(source) = &filter.source {
            query = query.filter(click_log::Column::Referrer.eq(source));
        }

        let mut joined = query.find_also_related(referral_card::Entity);
        if let Some(category) = &filter.category {
            joined = joined.filter(referral_card::Column::Category.eq(category));
        }

        let rows = joined
            .order_by_desc(click_log::Column::ClickedAt)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(click, card)| ClickRow {
                event: model_to_click(click),
                card: card.map(|model| CardMeta::from(&model_to_card(model))),
            })
            .collect())
    }

    async fn insert_activity(&self, entry: ActivityLogEntry) -> Result<()> {
        let model = user_activity_log::ActiveModel {
            user_id: Set(entry.user_id),
            activity_type: Set(entry.activity_type.to_string()),
            details: Set(entry.details),
            created_at: Set(entry.created_at),
            ..Default::default()
        };
        user_activity_log::Entity::insert(model)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn recent_activity(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>> {
        let models = user_activity_log::Entity::find()
            .filter(user_activity_log::Column::UserId.eq(user_id))
            .filter(user_activity_log::Column::CreatedAt.gte(start))
            .filter(user_activity_log::Column::CreatedAt.lte(end))
            .order_by_desc(user_activity_log::Column::CreatedAt)
            .limit(limit as u64)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().filter_map(model_to_activity).collect())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<SubscriptionProfile>> {
        let model = profile::Entity::find_by_id(user_id).one(&self.db).await?;
        Ok(model.map(|m| SubscriptionProfile {
            user_id: m.user_id,
            email: m.email,
            subscription_status: SubscriptionStatus::from_str(&m.subscription_status)
                .unwrap_or_default(),
        }))
    }

    async fn upsert_profile(&self, profile_data: SubscriptionProfile) -> Result<()> {
        let model = profile::ActiveModel {
            user_id: Set(profile_data.user_id),
            email: Set(profile_data.email),
            subscription_status: Set(profile_data.subscription_status.to_string()),
        };
        profile::Entity::insert(model)
            .on_conflict(
                OnConflict::column(profile::Column::UserId)
                    .update_columns([profile::Column::Email, profile::Column::SubscriptionStatus])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    fn subscribe_clicks(&self) -> broadcast::Receiver<ClickEvent> {
        self.feed.subscribe()
    }
}
