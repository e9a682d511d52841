//! Metric definitions: base aggregations and calculated formulas.

use serde::{Deserialize, Serialize};

/// Aggregation function for a base metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggFunc {
    Sum,
    Count,
    CountDistinct,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    /// SQL spelling of the function.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggFunc::Sum => "SUM",
            AggFunc::Count => "COUNT",
            AggFunc::CountDistinct => "COUNT_DISTINCT",
            AggFunc::Avg => "AVG",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        }
    }
}

/// How a metric is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// A base aggregation over an optional field expression.
    ///
    /// `field: None` means the aggregation takes no column, e.g. `COUNT(*)`.
    Aggregation {
        func: AggFunc,
        field: Option<String>,
    },

    /// An expression over other metrics of the same dataset, referenced by
    /// `{name}` placeholders (e.g. `{revenue} - {refunds}`).
    Calculated { formula: String },
}

/// An aggregated or calculated numeric measure of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Name, unique within the owning dataset.
    pub name: String,
    pub kind: MetricKind,
}

impl Metric {
    /// Create a base aggregation metric.
    pub fn aggregation(name: impl Into<String>, func: AggFunc, field: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Aggregation {
                func,
                field: field.map(|f| f.to_string()),
            },
        }
    }

    /// Create a calculated metric from a formula string.
    pub fn calculated(name: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Calculated {
                formula: formula.into(),
            },
        }
    }

    /// True if this metric is a calculated formula.
    pub fn is_calculated(&self) -> bool {
        matches!(self.kind, MetricKind::Calculated { .. })
    }
}
