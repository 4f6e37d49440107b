//! SeaORM entities backing the alert rule and alert history tables.

pub mod alert_history;
pub mod alert_rule;
