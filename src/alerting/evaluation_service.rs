use dashmap::DashSet;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::{condition, cooldown, extractor};
use crate::db::models::AlertRule;
use crate::db::repository::{AlertRuleRepository, RepositoryError};
use crate::metrics::{MetricsError, MetricsSnapshotProvider};
use crate::notifications::NotificationDispatcher;
use crate::notifications::models::{DispatchResult, TriggerContext};

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Metrics fetch failed: {0}")]
    Metrics(#[from] MetricsError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Alert rule store is unreachable: {0}")]
    StoreUnavailable(#[from] RepositoryError),
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    /// Region used for rules whose resource filter names none.
    pub default_region: String,
    pub max_concurrent_evaluations: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            default_region: "us-east-1".to_string(),
            max_concurrent_evaluations: 8,
        }
    }
}

/// What happened to one rule during a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    CoolingDown,
    /// Another pass is still evaluating this rule.
    InFlight,
    ValueUnavailable,
    NotTriggered { value: f64 },
    Triggered { value: f64, dispatch: DispatchResult },
    /// The trigger write found newer trigger state; someone else fired it.
    LostRace,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub evaluated: usize,
    pub triggered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Removes the rule id from the in-flight set when the evaluation ends,
/// however it ends.
struct InFlightGuard<'a> {
    set: &'a DashSet<String>,
    rule_id: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a DashSet<String>, rule_id: &str) -> Option<Self> {
        set.insert(rule_id.to_string()).then(|| Self {
            set,
            rule_id: rule_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.rule_id);
    }
}

/// Periodically evaluates every enabled alert rule and dispatches
/// notifications for those that fire.
pub struct AlertMonitor {
    rules: Arc<dyn AlertRuleRepository>,
    metrics: Arc<dyn MetricsSnapshotProvider>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    settings: MonitorSettings,
    in_flight: DashSet<String>,
    running: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl AlertMonitor {
    pub fn new(
        rules: Arc<dyn AlertRuleRepository>,
        metrics: Arc<dyn MetricsSnapshotProvider>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            rules,
            metrics,
            dispatcher,
            clock,
            settings,
            in_flight: DashSet::new(),
            running: AtomicBool::new(false),
            ticker: Mutex::new(None),
        }
    }

    /// Starts the recurring timer; the first pass runs immediately.
    ///
    /// Fails without entering the running state when the rule store cannot
    /// be reached. Calling it while already running does nothing.
    pub async fn start(self: &Arc<Self>) -> Result<(), MonitorError> {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            info!("Alert monitor is already running.");
            return Ok(());
        }

        self.rules.ping().await?;

        let monitor = Arc::clone(self);
        let period = self.settings.poll_interval;
        *ticker = Some(tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                // Each pass runs on its own task so stopping the ticker never
                // cuts a pass short. Slow passes may therefore overlap.
                let pass = Arc::clone(&monitor);
                tokio::spawn(async move {
                    pass.run_pass().await;
                });
            }
        }));
        self.running.store(true, Ordering::SeqCst);
        info!(
            interval_secs = period.as_secs(),
            max_concurrent = self.settings.max_concurrent_evaluations,
            "Alert monitor started."
        );
        Ok(())
    }

    /// Cancels future passes. Passes already under way run to completion.
    pub async fn stop(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
            self.running.store(false, Ordering::SeqCst);
            info!("Alert monitor stopped.");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Evaluates every enabled rule once. One rule's failure never stops the
    /// others.
    pub async fn run_pass(&self) -> PassSummary {
        let rules = match self.rules.find_enabled().await {
            Ok(rules) => rules,
            Err(e) => {
                error!(error = %e, "Failed to load enabled alert rules; skipping pass.");
                return PassSummary::default();
            }
        };
        debug!(count = rules.len(), "Running alert evaluation pass.");

        let limit = self.settings.max_concurrent_evaluations.max(1);
        let outcomes: Vec<(AlertRule, Result<RuleOutcome, EvaluationError>)> = stream::iter(rules)
            .map(|rule| async move {
                let outcome = self.evaluate_rule(&rule).await;
                (rule, outcome)
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut summary = PassSummary::default();
        for (rule, outcome) in outcomes {
            summary.evaluated += 1;
            match outcome {
                Ok(RuleOutcome::Triggered { .. }) => summary.triggered += 1,
                Ok(RuleOutcome::NotTriggered { .. }) => {}
                Ok(_) => summary.skipped += 1,
                Err(EvaluationError::Metrics(e)) => {
                    summary.failed += 1;
                    warn!(
                        rule_id = %rule.id,
                        rule_name = %rule.name,
                        user_id = %rule.user_id,
                        error = %e,
                        "Metrics unavailable; rule skipped this pass."
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        rule_id = %rule.id,
                        rule_name = %rule.name,
                        error = %e,
                        "Alert rule evaluation failed."
                    );
                }
            }
        }
        info!(
            evaluated = summary.evaluated,
            triggered = summary.triggered,
            skipped = summary.skipped,
            failed = summary.failed,
            "Alert evaluation pass finished."
        );
        summary
    }

    /// Evaluates a single rule and, if it fires, records the trigger and
    /// dispatches notifications.
    pub async fn evaluate_rule(&self, rule: &AlertRule) -> Result<RuleOutcome, EvaluationError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &rule.id) else {
            debug!(rule_id = %rule.id, "Rule is still being evaluated by another pass.");
            return Ok(RuleOutcome::InFlight);
        };

        let now = self.clock.now();
        if !cooldown::is_allowed(rule, now) {
            debug!(
                rule_id = %rule.id,
                reopens_at = ?cooldown::reopens_at(rule),
                "Rule is cooling down."
            );
            return Ok(RuleOutcome::CoolingDown);
        }

        let region = rule
            .resource_filter
            .region
            .as_deref()
            .unwrap_or(&self.settings.default_region);
        let snapshot = self.metrics.fetch(&rule.user_id, region).await?;

        let Some(value) = extractor::extract(&snapshot, rule) else {
            warn!(
                rule_id = %rule.id,
                rule_name = %rule.name,
                service = %rule.service,
                metric = %rule.metric,
                "Metric value unavailable; rule skipped."
            );
            return Ok(RuleOutcome::ValueUnavailable);
        };

        if !condition::evaluate(value, rule.operator, rule.threshold) {
            debug!(rule_id = %rule.id, value, threshold = rule.threshold, "Condition not met.");
            return Ok(RuleOutcome::NotTriggered { value });
        }

        // Trigger state is persisted before any notification goes out. A crash
        // or failed dispatch after this point loses notifications for this
        // cycle but never produces a second firing inside the cooldown window.
        if !self
            .rules
            .record_trigger(&rule.id, rule.last_triggered_at, now)
            .await?
        {
            info!(rule_id = %rule.id, rule_name = %rule.name, "Trigger already recorded elsewhere; not dispatching.");
            return Ok(RuleOutcome::LostRace);
        }
        info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            value,
            operator = %rule.operator,
            threshold = rule.threshold,
            "Alert rule triggered."
        );

        let trigger = TriggerContext {
            triggered_at: now,
            affected_resources: extractor::affected_resources(&snapshot, rule),
        };
        let dispatch = self.dispatcher.dispatch(rule, value, &trigger).await;
        Ok(RuleOutcome::Triggered { value, dispatch })
    }
}
