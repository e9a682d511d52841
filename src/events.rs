//! Observability side-channel data.
//!
//! The engine does not store or ship telemetry; it returns one
//! [`QueryEvent`] per request for an external metrics/tracing collaborator
//! to consume, and emits matching `tracing` records along the way.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the cache participated in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    /// Served from a stored entry.
    Hit,
    /// Executed and stored.
    Miss,
    /// Joined an in-flight execution started by a concurrent request.
    Shared,
    /// Cache disabled or unusable; executed directly.
    Bypass,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
            CacheOutcome::Shared => "shared",
            CacheOutcome::Bypass => "bypass",
        }
    }
}

/// Per-request observability record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEvent {
    /// Primary dataset of the request.
    pub dataset: String,
    /// Resolved join path length in edges.
    pub join_path_len: usize,
    pub cache_outcome: CacheOutcome,
    pub elapsed: Duration,
}
