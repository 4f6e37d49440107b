use serde::{Deserialize, Serialize};

use crate::db::enums::{Operator, Service, Severity};
use crate::db::models::{DEFAULT_COOLDOWN_MINUTES, ResourceFilter};
use crate::notifications::models::NotificationSettings;

/// Body of `POST /api/users/{userId}/alerts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub service: Service,
    pub metric: String,
    #[serde(default)]
    pub resource_filter: ResourceFilter,
    pub operator: Operator,
    pub threshold: f64,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cooldown")]
    pub cooldown_period_minutes: u32,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

fn default_enabled() -> bool {
    true
}

fn default_cooldown() -> u32 {
    DEFAULT_COOLDOWN_MINUTES
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeRequest {
    /// Defaults to the owning user.
    #[serde(default)]
    pub acknowledged_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub monitor_running: bool,
}
