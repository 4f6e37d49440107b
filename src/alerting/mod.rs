//! Rule evaluation: metric extraction, threshold comparison, cooldown, and
//! the scheduler that ties them to notification dispatch.

pub mod clock;
pub mod condition;
pub mod cooldown;
pub mod evaluation_service;
pub mod extractor;
pub mod retention;

pub use clock::{Clock, SystemClock};
pub use evaluation_service::{
    AlertMonitor, EvaluationError, MonitorError, MonitorSettings, PassSummary, RuleOutcome,
};
