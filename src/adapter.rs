//! Execution adapter boundary.
//!
//! The engine never talks to a database itself: on a cache miss the resolved
//! plan is handed to an [`ExecutionAdapter`], which owns dialect translation,
//! connection pooling, and physical execution. Adapters are expected to
//! honor the request deadline they are given.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::ResolvedQueryPlan;

/// Errors surfaced by an execution adapter.
///
/// Retry policy belongs to the adapter or its caller; compilation is
/// deterministic, so the engine itself never retries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("backend execution failed: {0}")]
    Backend(String),

    #[error("execution deadline exceeded")]
    DeadlineExceeded,

    #[error("execution aborted: {0}")]
    Aborted(String),
}

/// Column metadata accompanying a result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Backend type name, passed through verbatim.
    pub type_name: String,
}

/// An opaque result payload: rows plus column metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResult {
    /// Rough payload size in bytes, used for cache budgeting.
    pub fn size_estimate(&self) -> usize {
        serde_json::to_string(self).map(|s| s.len()).unwrap_or(0)
    }
}

/// Boundary contract to the physical execution layer.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    /// Execute a resolved plan, respecting the deadline if one is given.
    async fn execute(
        &self,
        plan: &ResolvedQueryPlan,
        deadline: Option<Instant>,
    ) -> Result<QueryResult, ExecutionError>;
}
