//! Metric snapshots consumed by the alert evaluator and the client that
//! fetches them from the metrics polling service.

pub mod provider;
pub mod snapshot;

pub use provider::{HttpMetricsProvider, MetricsError, MetricsSnapshotProvider};
pub use snapshot::{MetricsSnapshot, Resource, ResourceGroups};
