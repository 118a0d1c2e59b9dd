//! SeaORM entity definitions for the analytics tables

pub mod referral_card {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "referral_cards")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub user_id: String,
        pub title: String,
        #[sea_orm(column_type = "Text")]
        pub description: String,
        /// Ordered link list, serialized as JSON
        pub links: Json,
        #[sea_orm(nullable)]
        pub image_url: Option<String>,
        #[sea_orm(nullable)]
        pub category: Option<String>,
        pub clicks: i64,
        pub views: i64,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::click_log::Entity")]
        ClickLogs,
    }

    impl Related<super::click_log::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::ClickLogs.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod click_log {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "click_logs")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub referral_id: String,
        /// Card owner, denormalized for per-user feed filtering
        pub user_id: String,
        pub link_index: i32,
        pub clicked_at: DateTimeUtc,
        #[sea_orm(column_type = "Text")]
        pub user_agent: String,
        #[sea_orm(column_type = "Text")]
        pub referrer: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::referral_card::Entity",
            from = "Column::ReferralId",
            to = "super::referral_card::Column::Id"
        )]
        Card,
    }

    impl Related<super::referral_card::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Card.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod user_activity_log {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "user_activity_logs")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub user_id: String,
        pub activity_type: String,
        pub details: Json,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod profile {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "profiles")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub user_id: String,
        #[sea_orm(nullable)]
        pub email: Option<String>,
        pub subscription_status: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
