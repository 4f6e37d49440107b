use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud service an alert rule targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Service {
    #[sea_orm(string_value = "EC2")]
    #[serde(rename = "EC2")]
    Ec2,
    #[sea_orm(string_value = "S3")]
    #[serde(rename = "S3")]
    S3,
    #[sea_orm(string_value = "RDS")]
    #[serde(rename = "RDS")]
    Rds,
    #[sea_orm(string_value = "Lambda")]
    Lambda,
    #[sea_orm(string_value = "EBS")]
    #[serde(rename = "EBS")]
    Ebs,
    #[sea_orm(string_value = "Cost")]
    Cost,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Ec2 => "EC2",
            Service::S3 => "S3",
            Service::Rds => "RDS",
            Service::Lambda => "Lambda",
            Service::Ebs => "EBS",
            Service::Cost => "Cost",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EC2" => Ok(Service::Ec2),
            "S3" => Ok(Service::S3),
            "RDS" => Ok(Service::Rds),
            "Lambda" => Ok(Service::Lambda),
            "EBS" => Ok(Service::Ebs),
            "Cost" => Ok(Service::Cost),
            other => Err(format!("Unsupported service: {other}")),
        }
    }
}

/// Comparison operator of an alert condition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Operator {
    #[sea_orm(string_value = ">")]
    #[serde(rename = ">")]
    GreaterThan,
    #[sea_orm(string_value = "<")]
    #[serde(rename = "<")]
    LessThan,
    #[sea_orm(string_value = ">=")]
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[sea_orm(string_value = "<=")]
    #[serde(rename = "<=")]
    LessOrEqual,
    #[sea_orm(string_value = "==")]
    #[serde(rename = "==")]
    Equal,
    #[sea_orm(string_value = "!=")]
    #[serde(rename = "!=")]
    NotEqual,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(Operator::GreaterThan),
            "<" => Ok(Operator::LessThan),
            ">=" => Ok(Operator::GreaterOrEqual),
            "<=" => Ok(Operator::LessOrEqual),
            "==" => Ok(Operator::Equal),
            "!=" => Ok(Operator::NotEqual),
            other => Err(format!("Unsupported comparison operator: {other}")),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[sea_orm(string_value = "info")]
    Info,
    #[default]
    #[sea_orm(string_value = "warning")]
    Warning,
    #[sea_orm(string_value = "critical")]
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// How per-resource values are combined into one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Average,
    Maximum,
    Minimum,
    Sum,
}

impl Aggregation {
    /// Reduces `values`. An empty input only has a value for `Sum`.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return match self {
                Aggregation::Sum => Some(0.0),
                _ => None,
            };
        }
        let reduced = match self {
            Aggregation::Average => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Maximum => values.iter().copied().fold(f64::MIN, f64::max),
            Aggregation::Minimum => values.iter().copied().fold(f64::MAX, f64::min),
            Aggregation::Sum => values.iter().sum(),
        };
        Some(reduced)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceScope {
    #[default]
    All,
    Specific,
}
