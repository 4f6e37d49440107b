pub mod alerting;
pub mod db;
pub mod metrics;
pub mod notifications;
pub mod server;
pub mod web;
