use axum::{Router, http::Method};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::alerting::{AlertMonitor, Clock};
use crate::db::repository::{AlertHistoryRepository, AlertRuleRepository};

pub use error::AppError;

pub mod error;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub rules: Arc<dyn AlertRuleRepository>,
    pub history: Arc<dyn AlertHistoryRepository>,
    pub monitor: Arc<AlertMonitor>,
    pub clock: Arc<dyn Clock>,
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .merge(routes::health_routes::create_health_router())
        .nest(
            "/api/users/{user_id}/alerts",
            routes::alert_routes::create_alert_router(),
        )
        .layer(cors)
        .with_state(app_state)
}
