//! Dataset, dimension, and refresh-policy definitions.

use serde::{Deserialize, Serialize};

use super::{Metric, RlsRule};

/// Semantic type of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    String,
    Number,
    Date,
    Boolean,
    Geo,
}

/// A groupable/filterable attribute of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Name, unique within the owning dataset.
    pub name: String,
    /// Underlying expression: a bare column name or a computed SQL fragment.
    pub expression: String,
    /// Semantic type used for presentation and filter validation.
    pub semantic_type: SemanticType,
}

impl Dimension {
    pub fn new(
        name: impl Into<String>,
        expression: impl Into<String>,
        semantic_type: SemanticType,
    ) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            semantic_type,
        }
    }
}

/// Incremental-refresh declaration for a dataset.
///
/// Carried as metadata only; acting on it belongs to the execution adapter
/// or an external scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshPolicy {
    /// Column that orders incremental loads (e.g. an updated-at timestamp).
    pub watermark_column: String,
    /// Refresh interval in seconds.
    pub interval_seconds: u64,
}

/// A named, queryable semantic entity backed by a table/SQL reference.
///
/// Datasets are created during catalog load and never mutated afterwards;
/// a catalog reload replaces the whole snapshot (see [`crate::catalog`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Unique, immutable identifier.
    pub id: String,
    /// Physical source: a table name or a SQL reference.
    pub source: String,
    /// Declared dimensions, in declaration order.
    pub dimensions: Vec<Dimension>,
    /// Declared metrics, in declaration order.
    pub metrics: Vec<Metric>,
    /// Optional row-level-security rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rls: Option<RlsRule>,
    /// Optional incremental-refresh rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<RefreshPolicy>,
}

impl Dataset {
    /// Create a dataset with no dimensions or metrics.
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            dimensions: Vec::new(),
            metrics: Vec::new(),
            rls: None,
            refresh: None,
        }
    }

    /// Add a dimension.
    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    /// Add a metric.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Set the row-level-security rule.
    pub fn with_rls(mut self, rule: RlsRule) -> Self {
        self.rls = Some(rule);
        self
    }

    /// Set the refresh policy.
    pub fn with_refresh(mut self, policy: RefreshPolicy) -> Self {
        self.refresh = Some(policy);
        self
    }

    /// Look up a dimension by name.
    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Look up a metric by name.
    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }
}
