use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::enums::{Operator, Service, Severity};

/// Per-rule notification configuration. Each channel is enabled independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub in_app: InAppSettings,
    #[serde(default)]
    pub webhook: WebhookSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InAppSettings {
    #[serde(default = "default_in_app_enabled")]
    pub enabled: bool,
}

impl Default for InAppSettings {
    fn default() -> Self {
        Self {
            enabled: default_in_app_enabled(),
        }
    }
}

fn default_in_app_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSettings {
    #[serde(default)]
    pub enabled: bool,
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Which channels delivered a triggered alert. Also stored on each history
/// entry as `notificationsSent`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub email: bool,
    pub in_app: bool,
    pub webhook: bool,
}

impl DispatchResult {
    pub fn any(&self) -> bool {
        self.email || self.in_app || self.webhook
    }
}

/// Facts about one firing that are not part of the rule itself.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub triggered_at: DateTime<Utc>,
    /// Identity keys of the resources that contributed to the value.
    pub affected_resources: Vec<String>,
}

/// Fixed JSON envelope posted to webhook endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub alert: WebhookAlert,
    pub trigger: WebhookTrigger,
    pub user: WebhookUser,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAlert {
    pub name: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub service: Service,
    pub metric: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTrigger {
    pub current_value: f64,
    pub threshold: f64,
    pub operator: Operator,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookUser {
    pub user_id: String,
}
