use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Schema, Set,
    TransactionTrait,
};
use std::time::Duration;
use tracing::{error, info};

use crate::db::entities::{alert_history, alert_rule};
use crate::db::models::{AlertHistoryEntry, AlertRule, HistoryCounts};
use crate::db::repository::{AlertHistoryRepository, AlertRuleRepository, RepositoryError};

/// Postgres-backed store for alert rules and their history.
#[derive(Clone)]
pub struct AlertStore {
    db: DatabaseConnection,
}

impl AlertStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let mut opt = ConnectOptions::new(database_url.to_owned());
        opt.max_connections(max_connections)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);
        let db = Database::connect(opt).await?;
        Ok(Self::new(db))
    }

    /// Creates the alert tables when they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        let mut rules = schema.create_table_from_entity(alert_rule::Entity);
        rules.if_not_exists();
        self.db.execute(backend.build(&rules)).await?;

        let mut history = schema.create_table_from_entity(alert_history::Entity);
        history.if_not_exists();
        self.db.execute(backend.build(&history)).await?;

        info!("Alert schema is ready.");
        Ok(())
    }
}

fn rule_from_model(model: alert_rule::Model) -> Result<AlertRule, RepositoryError> {
    let cooldown_period_minutes = u32::try_from(model.cooldown_period_minutes).map_err(|_| {
        RepositoryError::InvalidRecord(format!(
            "rule {} has negative cooldown {}",
            model.id, model.cooldown_period_minutes
        ))
    })?;
    let trigger_count = u64::try_from(model.trigger_count).map_err(|_| {
        RepositoryError::InvalidRecord(format!(
            "rule {} has negative trigger count {}",
            model.id, model.trigger_count
        ))
    })?;

    Ok(AlertRule {
        resource_filter: serde_json::from_value(model.resource_filter)?,
        notifications: serde_json::from_value(model.notifications)?,
        duration_minutes: model
            .duration_minutes
            .and_then(|minutes| u32::try_from(minutes).ok()),
        cooldown_period_minutes,
        trigger_count,
        id: model.id,
        user_id: model.user_id,
        name: model.name,
        description: model.description,
        service: model.service,
        metric: model.metric,
        operator: model.operator,
        threshold: model.threshold,
        enabled: model.enabled,
        severity: model.severity,
        last_triggered_at: model.last_triggered_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn rule_to_active(rule: &AlertRule) -> Result<alert_rule::ActiveModel, RepositoryError> {
    Ok(alert_rule::ActiveModel {
        id: Set(rule.id.clone()),
        user_id: Set(rule.user_id.clone()),
        name: Set(rule.name.clone()),
        description: Set(rule.description.clone()),
        service: Set(rule.service),
        metric: Set(rule.metric.clone()),
        resource_filter: Set(serde_json::to_value(&rule.resource_filter)?),
        operator: Set(rule.operator),
        threshold: Set(rule.threshold),
        duration_minutes: Set(rule
            .duration_minutes
            .map(|minutes| i32::try_from(minutes).unwrap_or(i32::MAX))),
        enabled: Set(rule.enabled),
        cooldown_period_minutes: Set(i32::try_from(rule.cooldown_period_minutes).unwrap_or(i32::MAX)),
        severity: Set(rule.severity),
        notifications: Set(serde_json::to_value(&rule.notifications)?),
        last_triggered_at: Set(rule.last_triggered_at),
        trigger_count: Set(i64::try_from(rule.trigger_count).unwrap_or(i64::MAX)),
        created_at: Set(rule.created_at),
        updated_at: Set(rule.updated_at),
    })
}

fn history_from_model(model: alert_history::Model) -> Result<AlertHistoryEntry, RepositoryError> {
    Ok(AlertHistoryEntry {
        notifications_sent: serde_json::from_value(model.notifications_sent)?,
        id: model.id,
        alert_id: model.alert_id,
        user_id: model.user_id,
        alert_name: model.alert_name,
        triggered_at: model.triggered_at,
        metric: model.metric,
        current_value: model.current_value,
        threshold: model.threshold,
        operator: model.operator,
        service: model.service,
        severity: model.severity,
        message: model.message,
        acknowledged: model.acknowledged,
        acknowledged_at: model.acknowledged_at,
        acknowledged_by: model.acknowledged_by,
    })
}

/// Converts rows, dropping (and logging) any that no longer deserialize so one
/// corrupt record cannot hide every other rule from the scheduler.
fn convert_rules(models: Vec<alert_rule::Model>) -> Vec<AlertRule> {
    models
        .into_iter()
        .filter_map(|model| {
            let rule_id = model.id.clone();
            match rule_from_model(model) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    error!(rule_id = %rule_id, error = %e, "Skipping unreadable alert rule.");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl AlertRuleRepository for AlertStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.db
            .ping()
            .await
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))
    }

    async fn find_enabled(&self) -> Result<Vec<AlertRule>, RepositoryError> {
        let models = alert_rule::Entity::find()
            .filter(alert_rule::Column::Enabled.eq(true))
            .order_by_asc(alert_rule::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(convert_rules(models))
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<AlertRule>, RepositoryError> {
        let models = alert_rule::Entity::find()
            .filter(alert_rule::Column::UserId.eq(user_id))
            .order_by_asc(alert_rule::Column::Name)
            .all(&self.db)
            .await?;
        Ok(convert_rules(models))
    }

    async fn find_by_id(
        &self,
        user_id: &str,
        rule_id: &str,
    ) -> Result<Option<AlertRule>, RepositoryError> {
        alert_rule::Entity::find()
            .filter(alert_rule::Column::Id.eq(rule_id))
            .filter(alert_rule::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .map(rule_from_model)
            .transpose()
    }

    async fn save(&self, rule: &AlertRule) -> Result<(), RepositoryError> {
        let active = rule_to_active(rule)?;
        alert_rule::Entity::insert(active)
            .on_conflict(
                OnConflict::column(alert_rule::Column::Id)
                    .update_columns([
                        alert_rule::Column::Name,
                        alert_rule::Column::Description,
                        alert_rule::Column::Service,
                        alert_rule::Column::Metric,
                        alert_rule::Column::ResourceFilter,
                        alert_rule::Column::Operator,
                        alert_rule::Column::Threshold,
                        alert_rule::Column::DurationMinutes,
                        alert_rule::Column::Enabled,
                        alert_rule::Column::CooldownPeriodMinutes,
                        alert_rule::Column::Severity,
                        alert_rule::Column::Notifications,
                        alert_rule::Column::LastTriggeredAt,
                        alert_rule::Column::TriggerCount,
                        alert_rule::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn record_trigger(
        &self,
        rule_id: &str,
        previous: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let update = alert_rule::Entity::update_many()
            .col_expr(alert_rule::Column::LastTriggeredAt, Expr::value(now))
            .col_expr(
                alert_rule::Column::TriggerCount,
                Expr::col(alert_rule::Column::TriggerCount).add(1),
            )
            .col_expr(alert_rule::Column::UpdatedAt, Expr::value(now))
            .filter(alert_rule::Column::Id.eq(rule_id));

        // Optimistic check: the row must still carry the timestamp we read.
        let update = match previous {
            Some(prev) => update.filter(alert_rule::Column::LastTriggeredAt.eq(prev)),
            None => update.filter(alert_rule::Column::LastTriggeredAt.is_null()),
        };

        let result = update.exec(&self.db).await?;
        Ok(result.rows_affected == 1)
    }

    async fn set_enabled(
        &self,
        user_id: &str,
        rule_id: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<AlertRule>, RepositoryError> {
        let result = alert_rule::Entity::update_many()
            .col_expr(alert_rule::Column::Enabled, Expr::value(enabled))
            .col_expr(alert_rule::Column::UpdatedAt, Expr::value(now))
            .filter(alert_rule::Column::Id.eq(rule_id))
            .filter(alert_rule::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(user_id, rule_id).await
    }

    async fn delete(&self, user_id: &str, rule_id: &str) -> Result<bool, RepositoryError> {
        let txn = self.db.begin().await?;

        let owned = alert_rule::Entity::find()
            .filter(alert_rule::Column::Id.eq(rule_id))
            .filter(alert_rule::Column::UserId.eq(user_id))
            .one(&txn)
            .await?;
        if owned.is_none() {
            txn.rollback().await?;
            return Ok(false);
        }

        alert_history::Entity::delete_many()
            .filter(alert_history::Column::AlertId.eq(rule_id))
            .exec(&txn)
            .await?;
        alert_rule::Entity::delete_many()
            .filter(alert_rule::Column::Id.eq(rule_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl AlertHistoryRepository for AlertStore {
    async fn create(&self, entry: &AlertHistoryEntry) -> Result<(), RepositoryError> {
        let active = alert_history::ActiveModel {
            id: Set(entry.id.clone()),
            alert_id: Set(entry.alert_id.clone()),
            user_id: Set(entry.user_id.clone()),
            alert_name: Set(entry.alert_name.clone()),
            triggered_at: Set(entry.triggered_at),
            metric: Set(entry.metric.clone()),
            current_value: Set(entry.current_value),
            threshold: Set(entry.threshold),
            operator: Set(entry.operator),
            service: Set(entry.service),
            severity: Set(entry.severity),
            message: Set(entry.message.clone()),
            acknowledged: Set(entry.acknowledged),
            acknowledged_at: Set(entry.acknowledged_at),
            acknowledged_by: Set(entry.acknowledged_by.clone()),
            notifications_sent: Set(serde_json::to_value(entry.notifications_sent)?),
        };
        alert_history::Entity::insert(active).exec(&self.db).await?;
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> Result<Vec<AlertHistoryEntry>, RepositoryError> {
        alert_history::Entity::find()
            .filter(alert_history::Column::UserId.eq(user_id))
            .order_by_desc(alert_history::Column::TriggeredAt)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(history_from_model)
            .collect()
    }

    async fn acknowledge(
        &self,
        user_id: &str,
        entry_id: &str,
        acknowledged_by: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<AlertHistoryEntry>, RepositoryError> {
        let Some(model) = alert_history::Entity::find()
            .filter(alert_history::Column::Id.eq(entry_id))
            .filter(alert_history::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        if model.acknowledged {
            return history_from_model(model).map(Some);
        }

        let mut active: alert_history::ActiveModel = model.into();
        active.acknowledged = Set(true);
        active.acknowledged_at = Set(Some(at));
        active.acknowledged_by = Set(Some(acknowledged_by.to_string()));
        let updated = active.update(&self.db).await?;
        history_from_model(updated).map(Some)
    }

    async fn counts_for_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<HistoryCounts, RepositoryError> {
        let total = alert_history::Entity::find()
            .filter(alert_history::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        let recent = alert_history::Entity::find()
            .filter(alert_history::Column::UserId.eq(user_id))
            .filter(alert_history::Column::TriggeredAt.gte(since))
            .count(&self.db)
            .await?;
        let unacknowledged = alert_history::Entity::find()
            .filter(alert_history::Column::UserId.eq(user_id))
            .filter(alert_history::Column::Acknowledged.eq(false))
            .count(&self.db)
            .await?;
        Ok(HistoryCounts {
            total,
            recent,
            unacknowledged,
        })
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = alert_history::Entity::delete_many()
            .filter(alert_history::Column::TriggeredAt.lt(cutoff))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::Service;
    use crate::db::models::fixtures::rule;

    #[test]
    fn rule_survives_conversion_to_and_from_a_row() {
        let mut original = rule("r-1", Service::Rds, "connections");
        original.resource_filter.region = Some("eu-west-1".into());
        original.notifications.webhook.url = Some("https://hooks.example.com".into());
        original.trigger_count = 7;

        let active = rule_to_active(&original).unwrap();
        let model = alert_rule::Model {
            id: active.id.unwrap(),
            user_id: active.user_id.unwrap(),
            name: active.name.unwrap(),
            description: active.description.unwrap(),
            service: active.service.unwrap(),
            metric: active.metric.unwrap(),
            resource_filter: active.resource_filter.unwrap(),
            operator: active.operator.unwrap(),
            threshold: active.threshold.unwrap(),
            duration_minutes: active.duration_minutes.unwrap(),
            enabled: active.enabled.unwrap(),
            cooldown_period_minutes: active.cooldown_period_minutes.unwrap(),
            severity: active.severity.unwrap(),
            notifications: active.notifications.unwrap(),
            last_triggered_at: active.last_triggered_at.unwrap(),
            trigger_count: active.trigger_count.unwrap(),
            created_at: active.created_at.unwrap(),
            updated_at: active.updated_at.unwrap(),
        };

        assert_eq!(rule_from_model(model).unwrap(), original);
    }

    #[test]
    fn negative_cooldown_is_reported_as_invalid_record() {
        let active = rule_to_active(&rule("r-2", Service::Ec2, "cpuUtilization")).unwrap();
        let model = alert_rule::Model {
            id: active.id.unwrap(),
            user_id: active.user_id.unwrap(),
            name: active.name.unwrap(),
            description: None,
            service: active.service.unwrap(),
            metric: active.metric.unwrap(),
            resource_filter: active.resource_filter.unwrap(),
            operator: active.operator.unwrap(),
            threshold: active.threshold.unwrap(),
            duration_minutes: None,
            enabled: true,
            cooldown_period_minutes: -1,
            severity: active.severity.unwrap(),
            notifications: active.notifications.unwrap(),
            last_triggered_at: None,
            trigger_count: 0,
            created_at: active.created_at.unwrap(),
            updated_at: active.updated_at.unwrap(),
        };
        assert!(matches!(
            rule_from_model(model),
            Err(RepositoryError::InvalidRecord(_))
        ));
    }
}
