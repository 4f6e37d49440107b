use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::notifications::models::WebhookPayload;

pub mod email;
pub mod webhook;

pub use email::{DisabledMailer, SmtpMailer};
pub use webhook::WebhookSender;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Templating error: {0}")]
    TemplatingError(String),
}

impl From<tera::Error> for SenderError {
    fn from(e: tera::Error) -> Self {
        SenderError::TemplatingError(e.to_string())
    }
}

/// Delivers one rendered email to one recipient.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), SenderError>;
}

/// Posts the alert envelope to a user-configured endpoint.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        payload: &WebhookPayload,
    ) -> Result<(), SenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_failures_surface_as_templating_errors() {
        let err = SenderError::from(tera::Error::msg("unknown variable `name`"));
        assert!(matches!(err, SenderError::TemplatingError(msg) if msg.contains("name")));
    }
}
