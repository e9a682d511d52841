//! Abstract query requests as submitted by callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::{FilterOp, FilterValue, SortSpec};

/// Errors raised while parsing and validating a request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("dataset not found: '{0}'")]
    UnknownDataset(String),

    #[error("unknown dimension '{field}' on dataset '{dataset}'")]
    UnknownDimension { dataset: String, field: String },

    #[error("invalid field reference: '{0}'")]
    InvalidFieldRef(String),

    #[error("query selects no dimensions or metrics")]
    EmptySelection,
}

pub type RequestResult<T> = Result<T, RequestError>;

/// A caller-supplied filter. Fields may be dataset-qualified
/// (`customers.country`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// An abstract analytical query against one primary dataset.
///
/// Dimensions, metrics, and filter fields may reference other datasets with
/// dotted names; the compiler discovers the connecting joins from the
/// catalog's declared relationships.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Primary (anchor) dataset id.
    pub dataset: String,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Explicit cross-dataset join targets, beyond what dotted references
    /// already imply.
    #[serde(default)]
    pub joins: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<SortSpec>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

impl QueryRequest {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            ..Default::default()
        }
    }

    pub fn with_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.dimensions.push(dimension.into());
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metrics.push(metric.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_join(mut self, dataset: impl Into<String>) -> Self {
        self.joins.push(dataset.into());
        self
    }

    pub fn with_order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order_by.push(SortSpec {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}
