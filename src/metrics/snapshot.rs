use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::enums::Service;

/// Point-in-time resource metrics for one user and region, as returned by the
/// metrics polling service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    pub resources: ResourceGroups,
    /// Billing figures (`totalCost`, `forecastedCost`, ...), when the poller has them.
    #[serde(default)]
    pub cost: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGroups {
    #[serde(default)]
    pub ec2: Vec<Resource>,
    #[serde(default)]
    pub s3: Vec<Resource>,
    #[serde(default)]
    pub rds: Vec<Resource>,
    #[serde(default)]
    pub lambda: Vec<Resource>,
    #[serde(default)]
    pub ebs: Vec<Resource>,
}

impl ResourceGroups {
    /// Resource list for a service. `Cost` has no resource list.
    pub fn for_service(&self, service: Service) -> Option<&[Resource]> {
        match service {
            Service::Ec2 => Some(&self.ec2),
            Service::S3 => Some(&self.s3),
            Service::Rds => Some(&self.rds),
            Service::Lambda => Some(&self.lambda),
            Service::Ebs => Some(&self.ebs),
            Service::Cost => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub volume_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub metrics: Map<String, Value>,
}

impl Resource {
    /// The key a resource filter matches against for this service.
    pub fn identity(&self, service: Service) -> Option<&str> {
        let key = match service {
            Service::Ec2 => &self.id,
            Service::S3 | Service::Lambda => &self.name,
            Service::Rds => &self.identifier,
            Service::Ebs => &self.volume_id,
            Service::Cost => return None,
        };
        key.as_deref()
    }

    /// Lifecycle state, read from the resource or its metrics object.
    pub fn state(&self) -> Option<&str> {
        self.state
            .as_deref()
            .or_else(|| self.metrics.get("state").and_then(Value::as_str))
    }

    /// Numeric metric field. Missing or non-numeric values read as zero.
    pub fn number(&self, field: &str) -> f64 {
        self.metrics.get(field).map(numeric).unwrap_or(0.0)
    }
}

/// Parses a JSON number or numeric string; anything else is zero.
pub fn numeric(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_provider_payload() {
        let payload = json!({
            "resources": {
                "ec2": [{"id": "i-1", "state": "running", "metrics": {"cpuUtilization": "42.5"}}],
                "ebs": [{"volumeId": "vol-1", "metrics": {"size": 100, "state": "available"}}]
            }
        });
        let snapshot: MetricsSnapshot = serde_json::from_value(payload).unwrap();
        let ec2 = &snapshot.resources.ec2[0];
        assert_eq!(ec2.identity(Service::Ec2), Some("i-1"));
        assert_eq!(ec2.number("cpuUtilization"), 42.5);
        let ebs = &snapshot.resources.ebs[0];
        assert_eq!(ebs.identity(Service::Ebs), Some("vol-1"));
        assert_eq!(ebs.state(), Some("available"));
        assert!(snapshot.resources.s3.is_empty());
        assert!(snapshot.cost.is_none());
    }

    #[test]
    fn non_numeric_values_read_as_zero() {
        assert_eq!(numeric(&json!("n/a")), 0.0);
        assert_eq!(numeric(&json!(null)), 0.0);
        assert_eq!(numeric(&json!({"x": 1})), 0.0);
        assert_eq!(numeric(&json!(" 7 ")), 7.0);
        assert_eq!(numeric(&json!("NaN")), 0.0);
    }
}
