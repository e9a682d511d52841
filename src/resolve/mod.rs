//! Resolution passes used by the query compiler.
//!
//! - [`metric`]: expands calculated metrics into trees of base aggregations,
//!   detecting cycles and depth overflow.
//! - [`join_path`]: finds the shortest declared join path between datasets.
//! - [`rls`]: produces the mandatory row-level-security predicates.

pub mod join_path;
pub mod metric;
pub mod rls;

pub use join_path::{JoinError, JoinPathResolver, JoinResult};
pub use metric::{MetricError, MetricResolver, MetricResult};
pub use rls::{inject_rls, RlsError, RlsResult};
