use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::{Aggregation, Operator, ResourceScope, Service, Severity};
use crate::alerting::extractor;
use crate::notifications::models::{DispatchResult, NotificationSettings};

pub const DEFAULT_COOLDOWN_MINUTES: u32 = 15;
pub const MIN_COOLDOWN_MINUTES: u32 = 5;
pub const MAX_COOLDOWN_MINUTES: u32 = 1440;

/// Narrows which resources contribute to a rule's metric value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFilter {
    #[serde(default)]
    pub scope: ResourceScope,
    #[serde(default)]
    pub resource_ids: Vec<String>,
    /// When unset, each metric uses its own reducer.
    #[serde(default)]
    pub aggregation: Option<Aggregation>,
    #[serde(default)]
    pub region: Option<String>,
}

impl ResourceFilter {
    /// True when only the listed resources should be considered.
    pub fn is_specific(&self) -> bool {
        self.scope == ResourceScope::Specific && !self.resource_ids.is_empty()
    }
}

/// A user-owned monitoring rule together with its mutable trigger state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub service: Service,
    pub metric: String,
    #[serde(default)]
    pub resource_filter: ResourceFilter,
    pub operator: Operator,
    pub threshold: f64,
    /// Sustained-condition window. Stored, but evaluation fires on a single sample.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub enabled: bool,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_period_minutes: u32,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trigger_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_cooldown_minutes() -> u32 {
    DEFAULT_COOLDOWN_MINUTES
}

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Field '{0}' must not be empty")]
    Empty(&'static str),
    #[error("Cooldown must be between 5 and 1440 minutes, got {0}")]
    CooldownOutOfRange(u32),
    #[error("Threshold must be a finite number")]
    InvalidThreshold,
    #[error("Metric '{metric}' is not supported for service {service}; expected one of: {supported}")]
    UnsupportedMetric {
        service: Service,
        metric: String,
        supported: String,
    },
    #[error("Webhook notifications are enabled but no URL is configured")]
    MissingWebhookUrl,
    #[error("Email notifications are enabled but no recipients are configured")]
    MissingEmailRecipients,
}

impl AlertRule {
    /// Checks the definition fields the evaluator relies on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty("name"));
        }
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::Empty("userId"));
        }
        if !(MIN_COOLDOWN_MINUTES..=MAX_COOLDOWN_MINUTES).contains(&self.cooldown_period_minutes) {
            return Err(ValidationError::CooldownOutOfRange(self.cooldown_period_minutes));
        }
        if !self.threshold.is_finite() {
            return Err(ValidationError::InvalidThreshold);
        }
        if !extractor::is_supported(self.service, &self.metric) {
            return Err(ValidationError::UnsupportedMetric {
                service: self.service,
                metric: self.metric.clone(),
                supported: extractor::supported_metrics(self.service)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        let webhook = &self.notifications.webhook;
        if webhook.enabled && webhook.url.as_deref().is_none_or(|u| u.trim().is_empty()) {
            return Err(ValidationError::MissingWebhookUrl);
        }
        let email = &self.notifications.email;
        if email.enabled && email.recipients.is_empty() {
            return Err(ValidationError::MissingEmailRecipients);
        }
        Ok(())
    }
}

/// One firing of a rule. Only the acknowledgement fields change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertHistoryEntry {
    pub id: String,
    pub alert_id: String,
    pub user_id: String,
    pub alert_name: String,
    pub triggered_at: DateTime<Utc>,
    pub metric: String,
    pub current_value: f64,
    pub threshold: f64,
    pub operator: Operator,
    pub service: Service,
    pub severity: Severity,
    pub message: String,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub notifications_sent: DispatchResult,
}

/// Aggregate history counts for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryCounts {
    pub total: u64,
    pub recent: u64,
    pub unacknowledged: u64,
}


#[cfg(test)]
mod tests {
    use super::fixtures::rule;
    use super::*;

    #[test]
    fn deserializes_minimal_rule_with_defaults() {
        let json = serde_json::json!({
            "id": "a1",
            "userId": "u1",
            "name": "High CPU",
            "service": "EC2",
            "metric": "cpuUtilization",
            "operator": ">",
            "threshold": 80,
            "enabled": true,
            "createdAt": "2024-05-01T00:00:00Z",
            "updatedAt": "2024-05-01T00:00:00Z"
        });
        let parsed: AlertRule = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.cooldown_period_minutes, 15);
        assert_eq!(parsed.severity, Severity::Warning);
        assert_eq!(parsed.resource_filter.scope, ResourceScope::All);
        assert!(parsed.notifications.in_app.enabled);
        assert!(!parsed.notifications.email.enabled);
        assert_eq!(parsed.trigger_count, 0);
        assert!(parsed.last_triggered_at.is_none());
    }

    #[test]
    fn validate_accepts_a_complete_rule() {
        assert_eq!(rule("a", Service::Ec2, "cpuUtilization").validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_cooldown_outside_range() {
        let mut r = rule("a", Service::Ec2, "cpuUtilization");
        r.cooldown_period_minutes = 4;
        assert_eq!(r.validate(), Err(ValidationError::CooldownOutOfRange(4)));
        r.cooldown_period_minutes = 1441;
        assert_eq!(r.validate(), Err(ValidationError::CooldownOutOfRange(1441)));
        r.cooldown_period_minutes = 1440;
        assert!(r.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_metric_for_service() {
        let r = rule("a", Service::S3, "cpuUtilization");
        let err = r.validate().unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedMetric { .. }));
        assert!(err.to_string().contains("bucketCount"));
    }

    #[test]
    fn validate_requires_webhook_url_when_enabled() {
        let mut r = rule("a", Service::Ec2, "cpuUtilization");
        r.notifications.webhook.enabled = true;
        assert_eq!(r.validate(), Err(ValidationError::MissingWebhookUrl));
        r.notifications.webhook.url = Some("https://hooks.example.com/a".into());
        assert!(r.validate().is_ok());
    }

    #[test]
    fn specific_scope_without_ids_behaves_like_all() {
        let filter = ResourceFilter {
            scope: ResourceScope::Specific,
            ..Default::default()
        };
        assert!(!filter.is_specific());
    }
}
