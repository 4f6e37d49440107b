use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::{Operator, Service, Severity};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alert_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub alert_id: String,
    pub user_id: String,
    pub alert_name: String,
    pub triggered_at: ChronoDateTimeUtc,
    pub metric: String,
    pub current_value: f64,
    pub threshold: f64,
    pub operator: Operator,
    pub service: Service,
    pub severity: Severity,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub acknowledged: bool,
    pub acknowledged_at: Option<ChronoDateTimeUtc>,
    pub acknowledged_by: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub notifications_sent: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::alert_rule::Entity",
        from = "Column::AlertId",
        to = "super::alert_rule::Column::Id",
        on_delete = "Cascade", // Deleting a rule removes its history
        on_update = "Cascade"
    )]
    AlertRule,
}

impl Related<super::alert_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertRule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
