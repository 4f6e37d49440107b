use chrono::{DateTime, Utc};

use crate::db::models::AlertRule;

/// Whether `rule` may fire at `now`. A rule that never fired is always allowed;
/// otherwise at least `cooldownPeriodMinutes` must have elapsed since the last
/// trigger, measured in fractional minutes.
pub fn is_allowed(rule: &AlertRule, now: DateTime<Utc>) -> bool {
    match rule.last_triggered_at {
        None => true,
        Some(last) => {
            let elapsed_minutes = (now - last).num_milliseconds() as f64 / 60_000.0;
            elapsed_minutes >= f64::from(rule.cooldown_period_minutes)
        }
    }
}

/// When the rule's cooldown window closes, if it is currently open.
pub fn reopens_at(rule: &AlertRule) -> Option<DateTime<Utc>> {
    rule.last_triggered_at
        .map(|last| last + chrono::Duration::minutes(i64::from(rule.cooldown_period_minutes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::Service;
    use crate::db::models::fixtures::rule;
    use chrono::Duration;

    #[test]
    fn never_triggered_rule_is_allowed() {
        let r = rule("r", Service::Ec2, "cpuUtilization");
        assert!(is_allowed(&r, Utc::now()));
        assert!(reopens_at(&r).is_none());
    }

    #[test]
    fn window_is_closed_until_cooldown_elapses() {
        let now = Utc::now();
        let mut r = rule("r", Service::Ec2, "cpuUtilization");
        r.cooldown_period_minutes = 15;

        r.last_triggered_at = Some(now - Duration::minutes(14) - Duration::seconds(59));
        assert!(!is_allowed(&r, now));

        r.last_triggered_at = Some(now - Duration::minutes(15));
        assert!(is_allowed(&r, now));
        assert_eq!(reopens_at(&r), Some(now));

        r.last_triggered_at = Some(now - Duration::hours(2));
        assert!(is_allowed(&r, now));
    }

    #[test]
    fn trigger_in_the_future_keeps_window_closed() {
        let now = Utc::now();
        let mut r = rule("r", Service::Ec2, "cpuUtilization");
        r.last_triggered_at = Some(now + Duration::minutes(1));
        assert!(!is_allowed(&r, now));
    }
}
