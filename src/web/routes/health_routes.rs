use axum::{Json, Router, extract::State, routing::get};
use std::sync::Arc;

use crate::web::AppState;
use crate::web::models::alert_models::HealthResponse;

async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        monitor_running: app_state.monitor.is_running(),
    })
}

pub fn create_health_router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_handler))
}
