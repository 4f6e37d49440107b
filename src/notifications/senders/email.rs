use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

use super::{MailTransport, SenderError};

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends alert emails through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
    ) -> Result<Self, SenderError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| SenderError::InvalidConfiguration(format!("SMTP relay {host}: {e}")))?
            .port(port)
            .timeout(Some(SMTP_TIMEOUT));

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        // Reject a bad sender address up front rather than on every alert.
        from.parse::<lettre::message::Mailbox>()
            .map_err(|e| SenderError::InvalidConfiguration(format!("From address {from}: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), SenderError> {
        let from = self
            .from
            .parse()
            .map_err(|e| SenderError::InvalidConfiguration(format!("From address: {e}")))?;
        let to_mailbox = to
            .parse()
            .map_err(|e| SenderError::InvalidConfiguration(format!("Recipient {to}: {e}")))?;

        let email = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| SenderError::SendFailed(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| SenderError::SendFailed(e.to_string()))?;
        debug!(recipient = to, "Alert email sent.");
        Ok(())
    }
}

/// Stand-in used when no SMTP relay is configured; every send fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMailer;

#[async_trait]
impl MailTransport for DisabledMailer {
    async fn send(&self, to: &str, _subject: &str, _html: &str) -> Result<(), SenderError> {
        Err(SenderError::InvalidConfiguration(format!(
            "No SMTP host configured, cannot email {to}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_mailer_always_fails() {
        let result = DisabledMailer.send("ops@example.com", "s", "<p>b</p>").await;
        assert!(matches!(result, Err(SenderError::InvalidConfiguration(_))));
    }

    #[test]
    fn smtp_mailer_rejects_invalid_from_address() {
        let result = SmtpMailer::new("smtp.example.com", 587, None, None, "not-an-address");
        assert!(matches!(result, Err(SenderError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn smtp_mailer_rejects_invalid_recipient_before_connecting() {
        let mailer =
            SmtpMailer::new("smtp.example.com", 587, None, None, "alerts@example.com").unwrap();
        let result = mailer.send("nobody", "s", "<p>b</p>").await;
        assert!(matches!(result, Err(SenderError::InvalidConfiguration(_))));
    }
}
