use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::snapshot::MetricsSnapshot;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Invalid metrics service URL: {0}")]
    InvalidUrl(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Metrics service returned non-success status: {status}. Body: {body}")]
    Status { status: u16, body: String },
    #[error("Metrics unavailable: {0}")]
    Unavailable(String),
}

/// Source of per-user, per-region metric snapshots.
#[async_trait]
pub trait MetricsSnapshotProvider: Send + Sync {
    async fn fetch(&self, user_id: &str, region: &str) -> Result<MetricsSnapshot, MetricsError>;
}

/// Fetches snapshots from the metrics polling service over HTTP.
pub struct HttpMetricsProvider {
    client: Client,
    base_url: Url,
}

impl HttpMetricsProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MetricsError> {
        let base_url =
            Url::parse(base_url).map_err(|e| MetricsError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(MetricsError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn snapshot_url(&self, user_id: &str, region: &str) -> Result<Url, MetricsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MetricsError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "data", "metrics", user_id]);
        url.query_pairs_mut().append_pair("region", region);
        Ok(url)
    }
}

#[async_trait]
impl MetricsSnapshotProvider for HttpMetricsProvider {
    async fn fetch(&self, user_id: &str, region: &str) -> Result<MetricsSnapshot, MetricsError> {
        let url = self.snapshot_url(user_id, region)?;
        debug!(user_id, region, url = %url, "Fetching metrics snapshot.");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(MetricsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<MetricsSnapshot>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::StatusCode,
        routing::get,
    };
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn builds_snapshot_url_with_encoded_user() {
        let provider =
            HttpMetricsProvider::new("http://metrics.local:4000/", Duration::from_secs(1)).unwrap();
        let url = provider.snapshot_url("user 1", "eu-west-1").unwrap();
        assert_eq!(
            url.as_str(),
            "http://metrics.local:4000/api/data/metrics/user%201?region=eu-west-1"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            HttpMetricsProvider::new("not a url", Duration::from_secs(1)),
            Err(MetricsError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn fetches_snapshot_for_user_and_region() {
        let router = Router::new().route(
            "/api/data/metrics/{user_id}",
            get(
                |Path(user_id): Path<String>, Query(q): Query<HashMap<String, String>>| async move {
                    Json(serde_json::json!({
                        "resources": {
                            "ec2": [{
                                "id": format!("{user_id}-{}", q.get("region").cloned().unwrap_or_default()),
                                "metrics": {"cpuUtilization": 12.5}
                            }]
                        }
                    }))
                },
            ),
        );
        let base = serve(router).await;
        let provider = HttpMetricsProvider::new(&base, Duration::from_secs(5)).unwrap();

        let snapshot = provider.fetch("u1", "ap-south-1").await.unwrap();
        assert_eq!(snapshot.resources.ec2.len(), 1);
        assert_eq!(snapshot.resources.ec2[0].id.as_deref(), Some("u1-ap-south-1"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let router = Router::new().route(
            "/api/data/metrics/{user_id}",
            get(|| async { (StatusCode::BAD_GATEWAY, "credentials expired") }),
        );
        let base = serve(router).await;
        let provider = HttpMetricsProvider::new(&base, Duration::from_secs(5)).unwrap();

        match provider.fetch("u1", "us-east-1").await {
            Err(MetricsError::Status { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "credentials expired");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
