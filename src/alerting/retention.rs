use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};
use tracing::{error, info};

use super::clock::Clock;
use crate::db::repository::{AlertHistoryRepository, RepositoryError};

pub const DEFAULT_RETENTION_DAYS: u32 = 90;
const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Deletes history entries older than `retention_days` as of `now`.
pub async fn sweep_once(
    history: &dyn AlertHistoryRepository,
    retention_days: u32,
    now: DateTime<Utc>,
) -> Result<u64, RepositoryError> {
    let cutoff = now - ChronoDuration::days(i64::from(retention_days));
    history.purge_older_than(cutoff).await
}

/// Runs [`sweep_once`] daily, starting immediately.
pub fn run_retention_sweeper(
    history: Arc<dyn AlertHistoryRepository>,
    clock: Arc<dyn Clock>,
    retention_days: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = interval(SWEEP_INTERVAL);
        loop {
            timer.tick().await;
            match sweep_once(history.as_ref(), retention_days, clock.now()).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, retention_days, "Purged expired alert history."),
                Err(e) => error!(error = %e, "Alert history retention sweep failed."),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::{Operator, Service, Severity};
    use crate::db::models::AlertHistoryEntry;
    use crate::db::services::MemoryStore;
    use crate::notifications::models::DispatchResult;

    fn entry(id: &str, triggered_at: DateTime<Utc>) -> AlertHistoryEntry {
        AlertHistoryEntry {
            id: id.into(),
            alert_id: "a1".into(),
            user_id: "user-1".into(),
            alert_name: "High CPU".into(),
            triggered_at,
            metric: "cpuUtilization".into(),
            current_value: 91.0,
            threshold: 80.0,
            operator: Operator::GreaterThan,
            service: Service::Ec2,
            severity: Severity::Warning,
            message: String::new(),
            acknowledged: false,
            acknowledged_at: None,
            acknowledged_by: None,
            notifications_sent: DispatchResult::default(),
        }
    }

    #[tokio::test]
    async fn removes_only_entries_past_retention() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create(&entry("old", now - ChronoDuration::days(91))).await.unwrap();
        store.create(&entry("edge", now - ChronoDuration::days(89))).await.unwrap();
        store.create(&entry("new", now)).await.unwrap();

        let removed = sweep_once(&store, DEFAULT_RETENTION_DAYS, now).await.unwrap();

        assert_eq!(removed, 1);
        let left: Vec<String> = store
            .history_for_alert("a1")
            .await
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert!(!left.contains(&"old".to_string()));
        assert_eq!(left.len(), 2);
    }
}
