//! Core data model for the semantic catalog.
//!
//! These types are the in-memory representation of a parsed catalog:
//! datasets with their dimensions and metrics, declared join relationships,
//! and row-level-security rules. The catalog loader (out of scope) produces
//! them already validated; everything in this crate treats them as immutable.

mod dataset;
mod join;
mod metric;
mod rls;

pub use dataset::{Dataset, Dimension, RefreshPolicy, SemanticType};
pub use join::{Cardinality, JoinEdge, JoinType};
pub use metric::{AggFunc, Metric, MetricKind};
pub use rls::{RlsMode, RlsRule, TenantContext};
