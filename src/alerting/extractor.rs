//! Turns a metrics snapshot into the single value an alert rule compares.
//!
//! Supported metrics form a closed table keyed by `(Service, metric)`. Each
//! entry names a typed reducer, so an unsupported metric is a lookup miss
//! rather than a fall-through.

use crate::db::enums::{Aggregation, Service};
use crate::db::models::AlertRule;
use crate::metrics::snapshot::{MetricsSnapshot, Resource, numeric};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Reducer {
    /// Per-resource numeric field combined by the rule's aggregation, or by
    /// `default` when the rule does not configure one.
    Gauge {
        field: &'static str,
        default: Aggregation,
    },
    /// Number of resources, optionally only those in the given state.
    Count { state: Option<&'static str> },
    /// 100 × Σerrors / Σinvocations, zero without invocations.
    ErrorRate,
    /// Field of the account-level cost summary.
    CostField(&'static str),
}

struct MetricDef {
    service: Service,
    metric: &'static str,
    reducer: Reducer,
}

const fn gauge(service: Service, metric: &'static str, field: &'static str, default: Aggregation) -> MetricDef {
    MetricDef {
        service,
        metric,
        reducer: Reducer::Gauge { field, default },
    }
}

const fn count(service: Service, metric: &'static str, state: Option<&'static str>) -> MetricDef {
    MetricDef {
        service,
        metric,
        reducer: Reducer::Count { state },
    }
}

static METRICS: &[MetricDef] = &[
    gauge(Service::Ec2, "cpuUtilization", "cpuUtilization", Aggregation::Average),
    count(Service::Ec2, "instanceCount", None),
    count(Service::Ec2, "runningInstances", Some("running")),
    count(Service::Ec2, "stoppedInstances", Some("stopped")),
    gauge(Service::S3, "bucketSize", "sizeGB", Aggregation::Sum),
    count(Service::S3, "bucketCount", None),
    gauge(Service::S3, "objectCount", "objectCount", Aggregation::Sum),
    gauge(Service::Rds, "cpuUtilization", "cpuUtilization", Aggregation::Average),
    gauge(Service::Rds, "connections", "connections", Aggregation::Sum),
    count(Service::Rds, "databaseCount", None),
    MetricDef {
        service: Service::Lambda,
        metric: "errorRate",
        reducer: Reducer::ErrorRate,
    },
    gauge(Service::Lambda, "invocations", "invocations", Aggregation::Sum),
    gauge(Service::Lambda, "errors", "errors", Aggregation::Sum),
    count(Service::Ebs, "volumeCount", None),
    count(Service::Ebs, "availableVolumes", Some("available")),
    gauge(Service::Ebs, "totalStorage", "size", Aggregation::Sum),
    MetricDef {
        service: Service::Cost,
        metric: "totalCost",
        reducer: Reducer::CostField("totalCost"),
    },
    MetricDef {
        service: Service::Cost,
        metric: "forecastedCost",
        reducer: Reducer::CostField("forecastedCost"),
    },
];

fn lookup(service: Service, metric: &str) -> Option<Reducer> {
    METRICS
        .iter()
        .find(|def| def.service == service && def.metric == metric)
        .map(|def| def.reducer)
}

pub fn is_supported(service: Service, metric: &str) -> bool {
    lookup(service, metric).is_some()
}

/// Metric keys accepted for a service.
pub fn supported_metrics(service: Service) -> impl Iterator<Item = &'static str> {
    METRICS
        .iter()
        .filter(move |def| def.service == service)
        .map(|def| def.metric)
}

/// Resources of the rule's service that pass its resource filter. `None`
/// for services without a resource list.
fn matching<'a>(snapshot: &'a MetricsSnapshot, rule: &AlertRule) -> Option<Vec<&'a Resource>> {
    let resources = snapshot.resources.for_service(rule.service)?;
    let filter = &rule.resource_filter;
    let selected = if filter.is_specific() {
        resources
            .iter()
            .filter(|resource| {
                resource
                    .identity(rule.service)
                    .is_some_and(|id| filter.resource_ids.iter().any(|wanted| wanted == id))
            })
            .collect()
    } else {
        resources.iter().collect()
    };
    Some(selected)
}

/// Computes the rule's current value from `snapshot`.
///
/// Returns `None` when the metric is unsupported, when a specific resource
/// filter matches nothing, or when the reducer has no value to offer. Callers
/// must skip the rule in that case rather than compare against zero.
pub fn extract(snapshot: &MetricsSnapshot, rule: &AlertRule) -> Option<f64> {
    let reducer = lookup(rule.service, &rule.metric)?;

    if let Reducer::CostField(field) = reducer {
        return snapshot.cost.as_ref()?.get(field).map(numeric);
    }

    let resources = matching(snapshot, rule)?;
    if rule.resource_filter.is_specific() && resources.is_empty() {
        return None;
    }

    match reducer {
        Reducer::Gauge { field, default } => {
            let values: Vec<f64> = resources.iter().map(|r| r.number(field)).collect();
            rule.resource_filter
                .aggregation
                .unwrap_or(default)
                .apply(&values)
        }
        Reducer::Count { state } => {
            let counted = resources
                .iter()
                .filter(|r| state.is_none_or(|wanted| r.state() == Some(wanted)))
                .count();
            Some(counted as f64)
        }
        Reducer::ErrorRate => {
            let invocations: f64 = resources.iter().map(|r| r.number("invocations")).sum();
            let errors: f64 = resources.iter().map(|r| r.number("errors")).sum();
            if invocations > 0.0 {
                Some(100.0 * errors / invocations)
            } else {
                Some(0.0)
            }
        }
        Reducer::CostField(_) => None,
    }
}

/// Identity keys of the resources that fed the rule's value, for notifications.
pub fn affected_resources(snapshot: &MetricsSnapshot, rule: &AlertRule) -> Vec<String> {
    matching(snapshot, rule)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|r| r.identity(rule.service).map(str::to_string))
        .collect()
}
