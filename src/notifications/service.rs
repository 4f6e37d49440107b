use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::models::{
    DispatchResult, TriggerContext, WebhookAlert, WebhookPayload, WebhookTrigger, WebhookUser,
};
use super::senders::{MailTransport, WebhookTransport};
use super::templates;
use crate::db::models::{AlertHistoryEntry, AlertRule};
use crate::db::repository::AlertHistoryRepository;

/// Fans a triggered alert out to the rule's enabled channels.
///
/// Channels are isolated: a failing channel is logged and reported as `false`
/// in the returned [`DispatchResult`], never propagated.
pub struct NotificationDispatcher {
    mailer: Arc<dyn MailTransport>,
    webhook: Arc<dyn WebhookTransport>,
    history: Arc<dyn AlertHistoryRepository>,
}

impl NotificationDispatcher {
    pub fn new(
        mailer: Arc<dyn MailTransport>,
        webhook: Arc<dyn WebhookTransport>,
        history: Arc<dyn AlertHistoryRepository>,
    ) -> Self {
        Self {
            mailer,
            webhook,
            history,
        }
    }

    pub async fn dispatch(
        &self,
        rule: &AlertRule,
        current_value: f64,
        trigger: &TriggerContext,
    ) -> DispatchResult {
        // The history entry records the outcome of the other channels, so
        // email and webhook go first.
        let (email, webhook) = tokio::join!(
            self.send_email(rule, current_value, trigger),
            self.send_webhook(rule, current_value, trigger.triggered_at),
        );
        let mut result = DispatchResult {
            email,
            in_app: false,
            webhook,
        };
        result.in_app = self.record_in_app(rule, current_value, trigger, result).await;

        if result.any() {
            info!(
                rule_id = %rule.id,
                rule_name = %rule.name,
                email = result.email,
                in_app = result.in_app,
                webhook = result.webhook,
                "Alert notifications dispatched."
            );
        } else {
            warn!(
                rule_id = %rule.id,
                rule_name = %rule.name,
                "No notification channel delivered this alert."
            );
        }
        result
    }

    async fn send_email(
        &self,
        rule: &AlertRule,
        current_value: f64,
        trigger: &TriggerContext,
    ) -> bool {
        let settings = &rule.notifications.email;
        if !settings.enabled || settings.recipients.is_empty() {
            return false;
        }

        let subject = templates::email_subject(rule);
        let html = match templates::email_html(rule, current_value, trigger) {
            Ok(html) => html,
            Err(e) => {
                error!(
                    rule_id = %rule.id,
                    rule_name = %rule.name,
                    channel = "email",
                    error = %e,
                    "Failed to render alert email."
                );
                return false;
            }
        };

        let (subject, html) = (&subject, &html);
        let sends = settings
            .recipients
            .iter()
            .map(|to| async move { (to, self.mailer.send(to, subject, html).await) });
        let mut delivered = 0usize;
        for (to, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    rule_id = %rule.id,
                    rule_name = %rule.name,
                    channel = "email",
                    recipient = %to,
                    error = %e,
                    "Alert email failed."
                ),
            }
        }
        debug!(rule_id = %rule.id, delivered, total = settings.recipients.len(), "Email channel finished.");
        delivered > 0
    }

    async fn send_webhook(&self, rule: &AlertRule, current_value: f64, at: DateTime<Utc>) -> bool {
        let settings = &rule.notifications.webhook;
        let url = match settings.url.as_deref() {
            Some(url) if settings.enabled && !url.trim().is_empty() => url,
            _ => return false,
        };

        let payload = WebhookPayload {
            alert: WebhookAlert {
                name: rule.name.clone(),
                description: rule.description.clone(),
                severity: rule.severity,
                service: rule.service,
                metric: rule.metric.clone(),
            },
            trigger: WebhookTrigger {
                current_value,
                threshold: rule.threshold,
                operator: rule.operator,
                timestamp: at,
            },
            user: WebhookUser {
                user_id: rule.user_id.clone(),
            },
        };

        match self.webhook.post(url, &settings.headers, &payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    rule_id = %rule.id,
                    rule_name = %rule.name,
                    channel = "webhook",
                    error = %e,
                    "Alert webhook failed."
                );
                false
            }
        }
    }

    async fn record_in_app(
        &self,
        rule: &AlertRule,
        current_value: f64,
        trigger: &TriggerContext,
        sent: DispatchResult,
    ) -> bool {
        if !rule.notifications.in_app.enabled {
            return false;
        }

        let entry = AlertHistoryEntry {
            id: Uuid::new_v4().to_string(),
            alert_id: rule.id.clone(),
            user_id: rule.user_id.clone(),
            alert_name: rule.name.clone(),
            triggered_at: trigger.triggered_at,
            metric: rule.metric.clone(),
            current_value,
            threshold: rule.threshold,
            operator: rule.operator,
            service: rule.service,
            severity: rule.severity,
            message: templates::history_message(rule, current_value),
            acknowledged: false,
            acknowledged_at: None,
            acknowledged_by: None,
            notifications_sent: DispatchResult {
                in_app: true,
                ..sent
            },
        };

        match self.history.create(&entry).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    rule_id = %rule.id,
                    rule_name = %rule.name,
                    channel = "in_app",
                    error = %e,
                    "Failed to record alert history."
                );
                false
            }
        }
    }
}
