use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::repository::{AlertHistoryRepository, AlertRuleRepository, RepositoryError};

/// Dashboard summary for one user's alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_alerts: u64,
    pub enabled_alerts: u64,
    pub disabled_alerts: u64,
    pub total_triggers: u64,
    /// Triggers in the last 24 hours.
    pub recent_triggers: u64,
    pub unacknowledged: u64,
}

pub async fn summary_for_user(
    rules: &dyn AlertRuleRepository,
    history: &dyn AlertHistoryRepository,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<StatsSummary, RepositoryError> {
    let user_rules = rules.find_by_user(user_id).await?;
    let enabled_alerts = user_rules.iter().filter(|rule| rule.enabled).count() as u64;
    let total_alerts = user_rules.len() as u64;

    let counts = history
        .counts_for_user(user_id, now - Duration::hours(24))
        .await?;

    Ok(StatsSummary {
        total_alerts,
        enabled_alerts,
        disabled_alerts: total_alerts - enabled_alerts,
        total_triggers: counts.total,
        recent_triggers: counts.recent,
        unacknowledged: counts.unacknowledged,
    })
}
