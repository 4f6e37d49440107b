use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::{Operator, Service, Severity};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alert_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub service: Service,
    pub metric: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub resource_filter: Json,
    pub operator: Operator,
    pub threshold: f64,
    pub duration_minutes: Option<i32>,
    pub enabled: bool,
    pub cooldown_period_minutes: i32,
    pub severity: Severity,
    #[sea_orm(column_type = "JsonBinary")]
    pub notifications: Json,
    pub last_triggered_at: Option<ChronoDateTimeUtc>,
    pub trigger_count: i64,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::alert_history::Entity")]
    AlertHistory,
}

impl Related<super::alert_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
