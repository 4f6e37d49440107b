use once_cell::sync::Lazy;
use tera::{Context, Tera};

use crate::db::enums::Severity;
use crate::db::models::AlertRule;
use crate::notifications::models::TriggerContext;
use crate::notifications::senders::SenderError;

const ALERT_EMAIL: &str = "alert_email.html";

static TEMPLATES: Lazy<Result<Tera, String>> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_template(ALERT_EMAIL, ALERT_EMAIL_HTML)
        .map_err(|e| e.to_string())?;
    Ok(tera)
});

const ALERT_EMAIL_HTML: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #1f2933;">
  <h2 style="color: {{ severity_color }};">{{ severity_label }} alert: {{ name }}</h2>
  {% if description %}<p>{{ description }}</p>{% endif %}
  <table cellpadding="6" style="border-collapse: collapse;">
    <tr><td><strong>Service</strong></td><td>{{ service }}</td></tr>
    <tr><td><strong>Metric</strong></td><td>{{ metric }}</td></tr>
    <tr><td><strong>Condition</strong></td><td>{{ metric }} {{ operator }} {{ threshold }}</td></tr>
    <tr><td><strong>Current value</strong></td><td>{{ current_value }}</td></tr>
    <tr><td><strong>Triggered at</strong></td><td>{{ triggered_at }}</td></tr>
  </table>
  {% if affected_resources | length > 0 %}
  <p><strong>Affected resources</strong></p>
  <ul>
    {% for resource in affected_resources %}<li>{{ resource }}</li>{% endfor %}
  </ul>
  {% endif %}
  <p style="color: #616e7c; font-size: 12px;">
    This alert will not fire again for at least {{ cooldown_minutes }} minutes.
  </p>
</body>
</html>
"#;

/// Subject line for an alert email, e.g. `[CRITICAL] Alert: High CPU`.
pub fn email_subject(rule: &AlertRule) -> String {
    format!(
        "[{}] Alert: {}",
        rule.severity.to_string().to_uppercase(),
        rule.name
    )
}

/// Renders the HTML body of an alert email.
pub fn email_html(
    rule: &AlertRule,
    current_value: f64,
    trigger: &TriggerContext,
) -> Result<String, SenderError> {
    let tera = TEMPLATES.as_ref().map_err(tera::Error::msg)?;

    let severity_label = rule.severity.to_string().to_uppercase();
    let severity_color = match rule.severity {
        Severity::Critical => "#d64545",
        Severity::Warning => "#de911d",
        Severity::Info => "#2680c2",
    };

    let mut context = Context::new();
    context.insert("name", &rule.name);
    context.insert("description", &rule.description);
    context.insert("severity_label", &severity_label);
    context.insert("severity_color", severity_color);
    context.insert("service", rule.service.as_str());
    context.insert("metric", &rule.metric);
    context.insert("operator", rule.operator.symbol());
    context.insert("threshold", &rule.threshold);
    context.insert("current_value", &format!("{current_value:.2}"));
    context.insert("triggered_at", &trigger.triggered_at.to_rfc3339());
    context.insert("affected_resources", &trigger.affected_resources);
    context.insert("cooldown_minutes", &rule.cooldown_period_minutes);

    Ok(tera.render(ALERT_EMAIL, &context)?)
}

/// Plain message stored on the in-app history entry.
pub fn history_message(rule: &AlertRule, current_value: f64) -> String {
    format!(
        "{}: {} is {:.2} ({} {})",
        rule.name,
        rule.metric,
        current_value,
        rule.operator.symbol(),
        rule.threshold
    )
}
