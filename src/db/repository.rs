use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::models::{AlertHistoryEntry, AlertRule, HistoryCounts};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Stored record is invalid: {0}")]
    InvalidRecord(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence of alert rule definitions and their trigger state.
#[async_trait]
pub trait AlertRuleRepository: Send + Sync {
    /// Verifies the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn find_enabled(&self) -> Result<Vec<AlertRule>, RepositoryError>;

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<AlertRule>, RepositoryError>;

    async fn find_by_id(
        &self,
        user_id: &str,
        rule_id: &str,
    ) -> Result<Option<AlertRule>, RepositoryError>;

    /// Inserts or fully replaces a rule.
    async fn save(&self, rule: &AlertRule) -> Result<(), RepositoryError>;

    /// Sets `last_triggered_at = now` and increments `trigger_count` in one
    /// write, but only while the stored `last_triggered_at` still equals
    /// `previous`. Returns `false` when another writer got there first.
    async fn record_trigger(
        &self,
        rule_id: &str,
        previous: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn set_enabled(
        &self,
        user_id: &str,
        rule_id: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<AlertRule>, RepositoryError>;

    /// Deletes a rule and its history. Returns `false` if nothing matched.
    async fn delete(&self, user_id: &str, rule_id: &str) -> Result<bool, RepositoryError>;
}

/// Persistence of fired-alert records.
#[async_trait]
pub trait AlertHistoryRepository: Send + Sync {
    async fn create(&self, entry: &AlertHistoryEntry) -> Result<(), RepositoryError>;

    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> Result<Vec<AlertHistoryEntry>, RepositoryError>;

    async fn acknowledge(
        &self,
        user_id: &str,
        entry_id: &str,
        acknowledged_by: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<AlertHistoryEntry>, RepositoryError>;

    /// `recent` counts entries triggered at or after `since`.
    async fn counts_for_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<HistoryCounts, RepositoryError>;

    /// Removes entries triggered before `cutoff`, returning how many went.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;
}
