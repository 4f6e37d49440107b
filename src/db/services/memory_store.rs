use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::db::models::{AlertHistoryEntry, AlertRule, HistoryCounts};
use crate::db::repository::{AlertHistoryRepository, AlertRuleRepository, RepositoryError};

/// Process-local store used for local runs without Postgres and in tests.
#[derive(Default)]
pub struct MemoryStore {
    rules: RwLock<HashMap<String, AlertRule>>,
    history: RwLock<Vec<AlertHistoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rule(&self, rule_id: &str) -> Option<AlertRule> {
        self.rules.read().await.get(rule_id).cloned()
    }

    pub async fn history_for_alert(&self, alert_id: &str) -> Vec<AlertHistoryEntry> {
        self.history
            .read()
            .await
            .iter()
            .filter(|entry| entry.alert_id == alert_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AlertRuleRepository for MemoryStore {
    async fn find_enabled(&self) -> Result<Vec<AlertRule>, RepositoryError> {
        let mut rules: Vec<AlertRule> = self
            .rules
            .read()
            .await
            .values()
            .filter(|rule| rule.enabled)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<AlertRule>, RepositoryError> {
        let mut rules: Vec<AlertRule> = self
            .rules
            .read()
            .await
            .values()
            .filter(|rule| rule.user_id == user_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rules)
    }

    async fn find_by_id(
        &self,
        user_id: &str,
        rule_id: &str,
    ) -> Result<Option<AlertRule>, RepositoryError> {
        Ok(self
            .rules
            .read()
            .await
            .get(rule_id)
            .filter(|rule| rule.user_id == user_id)
            .cloned())
    }

    async fn save(&self, rule: &AlertRule) -> Result<(), RepositoryError> {
        self.rules
            .write()
            .await
            .insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn record_trigger(
        &self,
        rule_id: &str,
        previous: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(rule_id) {
            Some(rule) if rule.last_triggered_at == previous => {
                rule.last_triggered_at = Some(now);
                rule.trigger_count += 1;
                rule.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_enabled(
        &self,
        user_id: &str,
        rule_id: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<AlertRule>, RepositoryError> {
        let mut rules = self.rules.write().await;
        Ok(rules
            .get_mut(rule_id)
            .filter(|rule| rule.user_id == user_id)
            .map(|rule| {
                rule.enabled = enabled;
                rule.updated_at = now;
                rule.clone()
            }))
    }

    async fn delete(&self, user_id: &str, rule_id: &str) -> Result<bool, RepositoryError> {
        let mut rules = self.rules.write().await;
        let owned = rules
            .get(rule_id)
            .is_some_and(|rule| rule.user_id == user_id);
        if !owned {
            return Ok(false);
        }
        rules.remove(rule_id);
        self.history
            .write()
            .await
            .retain(|entry| entry.alert_id != rule_id);
        Ok(true)
    }
}

#[async_trait]
impl AlertHistoryRepository for MemoryStore {
    async fn create(&self, entry: &AlertHistoryEntry) -> Result<(), RepositoryError> {
        self.history.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> Result<Vec<AlertHistoryEntry>, RepositoryError> {
        let mut entries: Vec<AlertHistoryEntry> = self
            .history
            .read()
            .await
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        entries.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(entries)
    }

    async fn acknowledge(
        &self,
        user_id: &str,
        entry_id: &str,
        acknowledged_by: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<AlertHistoryEntry>, RepositoryError> {
        let mut history = self.history.write().await;
        Ok(history
            .iter_mut()
            .find(|entry| entry.id == entry_id && entry.user_id == user_id)
            .map(|entry| {
                if !entry.acknowledged {
                    entry.acknowledged = true;
                    entry.acknowledged_at = Some(at);
                    entry.acknowledged_by = Some(acknowledged_by.to_string());
                }
                entry.clone()
            }))
    }

    async fn counts_for_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<HistoryCounts, RepositoryError> {
        let history = self.history.read().await;
        let mut counts = HistoryCounts::default();
        for entry in history.iter().filter(|entry| entry.user_id == user_id) {
            counts.total += 1;
            if entry.triggered_at >= since {
                counts.recent += 1;
            }
            if !entry.acknowledged {
                counts.unacknowledged += 1;
            }
        }
        Ok(counts)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut history = self.history.write().await;
        let before = history.len();
        history.retain(|entry| entry.triggered_at >= cutoff);
        Ok((before - history.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::Service;
    use crate::db::models::fixtures::rule;
    use crate::notifications::models::DispatchResult;
    use chrono::Duration;

    fn entry(id: &str, alert_id: &str, triggered_at: DateTime<Utc>) -> AlertHistoryEntry {
        let r = rule(alert_id, Service::Ec2, "cpuUtilization");
        AlertHistoryEntry {
            id: id.to_string(),
            alert_id: alert_id.to_string(),
            user_id: r.user_id,
            alert_name: r.name,
            triggered_at,
            metric: r.metric,
            current_value: 91.0,
            threshold: r.threshold,
            operator: r.operator,
            service: r.service,
            severity: r.severity,
            message: "cpu high".to_string(),
            acknowledged: false,
            acknowledged_at: None,
            acknowledged_by: None,
            notifications_sent: DispatchResult::default(),
        }
    }

    #[tokio::test]
    async fn record_trigger_only_applies_when_previous_matches() {
        let store = MemoryStore::new();
        let r = rule("r-1", Service::Ec2, "cpuUtilization");
        store.save(&r).await.unwrap();
        let now = Utc::now();

        assert!(store.record_trigger("r-1", None, now).await.unwrap());
        // A second writer holding the stale `None` loses.
        assert!(!store.record_trigger("r-1", None, now).await.unwrap());

        let stored = store.rule("r-1").await.unwrap();
        assert_eq!(stored.trigger_count, 1);
        assert_eq!(stored.last_triggered_at, Some(now));
    }

    #[tokio::test]
    async fn delete_cascades_to_history_and_checks_owner() {
        let store = MemoryStore::new();
        store.save(&rule("r-1", Service::Ec2, "cpuUtilization")).await.unwrap();
        store.create(&entry("h-1", "r-1", Utc::now())).await.unwrap();
        store.create(&entry("h-2", "r-2", Utc::now())).await.unwrap();

        assert!(!store.delete("someone-else", "r-1").await.unwrap());
        assert!(store.delete("user-1", "r-1").await.unwrap());
        assert!(store.history_for_alert("r-1").await.is_empty());
        assert_eq!(store.history_for_alert("r-2").await.len(), 1);
    }

    #[tokio::test]
    async fn counts_and_purge_follow_trigger_time() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create(&entry("old", "r-1", now - Duration::days(100))).await.unwrap();
        store.create(&entry("new", "r-1", now - Duration::hours(2))).await.unwrap();
        store
            .acknowledge("user-1", "new", "ops", now)
            .await
            .unwrap()
            .unwrap();

        let counts = store
            .counts_for_user("user-1", now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(
            counts,
            HistoryCounts {
                total: 2,
                recent: 1,
                unacknowledged: 1
            }
        );

        let purged = store.purge_older_than(now - Duration::days(90)).await.unwrap();
        assert_eq!(purged, 1);
        let remaining = store.list_for_user("user-1", 10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "new");
    }

    #[tokio::test]
    async fn acknowledge_keeps_the_first_acknowledgement() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create(&entry("h-1", "r-1", now)).await.unwrap();

        store.acknowledge("user-1", "h-1", "alice", now).await.unwrap();
        let again = store
            .acknowledge("user-1", "h-1", "bob", now + Duration::minutes(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.acknowledged_by.as_deref(), Some("alice"));
        assert_eq!(again.acknowledged_at, Some(now));
        assert!(store.acknowledge("user-2", "h-1", "eve", now).await.unwrap().is_none());
    }
}
