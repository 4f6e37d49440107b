use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{AlertHistoryEntry, AlertRule};
use crate::db::services::{StatsSummary, summary_for_user};
use crate::web::models::alert_models::{
    AcknowledgeRequest, CreateAlertRequest, HistoryQuery, UpdateStatusRequest,
};
use crate::web::{AppError, AppState};

const DEFAULT_HISTORY_LIMIT: u64 = 50;
const MAX_HISTORY_LIMIT: u64 = 500;

async fn list_alerts_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<AlertRule>>, AppError> {
    let rules = app_state.rules.find_by_user(&user_id).await?;
    Ok(Json(rules))
}

async fn create_alert_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<AlertRule>), AppError> {
    if payload.metric.trim().is_empty() {
        return Err(AppError::InvalidInput("Field 'metric' must not be empty".to_string()));
    }
    let now = app_state.clock.now();
    let rule = AlertRule {
        id: Uuid::new_v4().to_string(),
        user_id,
        name: payload.name.trim().to_string(),
        description: payload.description,
        service: payload.service,
        metric: payload.metric.trim().to_string(),
        resource_filter: payload.resource_filter,
        operator: payload.operator,
        threshold: payload.threshold,
        duration_minutes: payload.duration_minutes,
        enabled: payload.enabled,
        cooldown_period_minutes: payload.cooldown_period_minutes,
        severity: payload.severity,
        notifications: payload.notifications,
        last_triggered_at: None,
        trigger_count: 0,
        created_at: now,
        updated_at: now,
    };
    rule.validate()?;

    app_state.rules.save(&rule).await?;
    info!(rule_id = %rule.id, user_id = %rule.user_id, rule_name = %rule.name, "Alert rule created.");
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn get_alert_handler(
    State(app_state): State<Arc<AppState>>,
    Path((user_id, alert_id)): Path<(String, String)>,
) -> Result<Json<AlertRule>, AppError> {
    app_state
        .rules
        .find_by_id(&user_id, &alert_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Alert rule {alert_id} not found")))
}

async fn delete_alert_handler(
    State(app_state): State<Arc<AppState>>,
    Path((user_id, alert_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    if app_state.rules.delete(&user_id, &alert_id).await? {
        info!(rule_id = %alert_id, user_id = %user_id, "Alert rule deleted.");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Alert rule {alert_id} not found")))
    }
}

async fn update_status_handler(
    State(app_state): State<Arc<AppState>>,
    Path((user_id, alert_id)): Path<(String, String)>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<AlertRule>, AppError> {
    let now = app_state.clock.now();
    app_state
        .rules
        .set_enabled(&user_id, &alert_id, payload.enabled, now)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Alert rule {alert_id} not found")))
}

async fn stats_summary_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<StatsSummary>, AppError> {
    let summary = summary_for_user(
        app_state.rules.as_ref(),
        app_state.history.as_ref(),
        &user_id,
        app_state.clock.now(),
    )
    .await?;
    Ok(Json(summary))
}

async fn list_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<AlertHistoryEntry>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let entries = app_state.history.list_for_user(&user_id, limit).await?;
    Ok(Json(entries))
}

async fn acknowledge_handler(
    State(app_state): State<Arc<AppState>>,
    Path((user_id, entry_id)): Path<(String, String)>,
    payload: Option<Json<AcknowledgeRequest>>,
) -> Result<Json<AlertHistoryEntry>, AppError> {
    let acknowledged_by = payload
        .and_then(|Json(body)| body.acknowledged_by)
        .unwrap_or_else(|| user_id.clone());
    app_state
        .history
        .acknowledge(&user_id, &entry_id, &acknowledged_by, app_state.clock.now())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("History entry {entry_id} not found")))
}

/// Routes nested under `/api/users/{user_id}/alerts`.
pub fn create_alert_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_alerts_handler).post(create_alert_handler))
        .route("/stats/summary", get(stats_summary_handler))
        .route("/history", get(list_history_handler))
        .route("/history/{entry_id}/acknowledge", post(acknowledge_handler))
        .route("/{alert_id}", get(get_alert_handler).delete(delete_alert_handler))
        .route("/{alert_id}/status", put(update_status_handler))
}
