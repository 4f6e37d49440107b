use async_trait::async_trait;
use reqwest::{Client, header};
use std::collections::HashMap;
use std::time::Duration;

use super::{SenderError, WebhookTransport};
use crate::notifications::models::WebhookPayload;

/// Posts alert envelopes to user webhooks.
pub struct WebhookSender {
    client: Client,
}

impl WebhookSender {
    pub fn new(timeout: Duration) -> Result<Self, SenderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn header_map(headers: &HashMap<String, String>) -> Result<header::HeaderMap, SenderError> {
        let mut header_map = header::HeaderMap::new();
        for (key, value) in headers {
            let header_name = header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                SenderError::InvalidConfiguration(format!("Invalid header name: {e}"))
            })?;
            let header_value = header::HeaderValue::from_str(value).map_err(|e| {
                SenderError::InvalidConfiguration(format!("Invalid header value: {e}"))
            })?;
            header_map.insert(header_name, header_value);
        }
        Ok(header_map)
    }
}

#[async_trait]
impl WebhookTransport for WebhookSender {
    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        payload: &WebhookPayload,
    ) -> Result<(), SenderError> {
        let response = self
            .client
            .post(url)
            .headers(Self::header_map(headers)?)
            .json(payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::{Operator, Service, Severity};
    use crate::notifications::models::{WebhookAlert, WebhookTrigger, WebhookUser};
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    fn payload() -> WebhookPayload {
        WebhookPayload {
            alert: WebhookAlert {
                name: "High CPU".into(),
                description: None,
                severity: Severity::Critical,
                service: Service::Ec2,
                metric: "cpuUtilization".into(),
            },
            trigger: WebhookTrigger {
                current_value: 87.5,
                threshold: 80.0,
                operator: Operator::GreaterThan,
                timestamp: Utc::now(),
            },
            user: WebhookUser {
                user_id: "user-1".into(),
            },
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn posts_envelope_with_custom_headers() {
        let received: Arc<Mutex<Option<(Option<String>, serde_json::Value)>>> = Arc::default();
        let sink = received.clone();
        let router = Router::new().route(
            "/hook",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    let token = headers
                        .get("x-token")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *sink.lock().unwrap() = Some((token, body));
                    StatusCode::NO_CONTENT
                }
            }),
        );
        let base = serve(router).await;
        let sender = WebhookSender::new(Duration::from_secs(5)).unwrap();
        let headers = HashMap::from([("X-Token".to_string(), "s3cret".to_string())]);

        sender
            .post(&format!("{base}/hook"), &headers, &payload())
            .await
            .unwrap();

        let (token, body) = received.lock().unwrap().take().unwrap();
        assert_eq!(token.as_deref(), Some("s3cret"));
        assert_eq!(body["alert"]["service"], "EC2");
        assert_eq!(body["trigger"]["currentValue"], 87.5);
        assert_eq!(body["trigger"]["operator"], ">");
        assert_eq!(body["user"]["userId"], "user-1");
    }

    #[tokio::test]
    async fn non_success_status_fails() {
        let router = Router::new().route(
            "/hook",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(router).await;
        let sender = WebhookSender::new(Duration::from_secs(5)).unwrap();

        let err = sender
            .post(&format!("{base}/hook"), &HashMap::new(), &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, SenderError::SendFailed(msg) if msg.contains("boom")));
    }

    #[tokio::test]
    async fn invalid_header_name_is_rejected() {
        let sender = WebhookSender::new(Duration::from_secs(5)).unwrap();
        let headers = HashMap::from([("bad header".to_string(), "v".to_string())]);
        let err = sender
            .post("http://127.0.0.1:9/hook", &headers, &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, SenderError::InvalidConfiguration(_)));
    }
}
