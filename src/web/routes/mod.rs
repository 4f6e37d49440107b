pub mod alert_routes;
pub mod health_routes;
