//! Result caching keyed on plan fingerprints.
//!
//! # Design
//!
//! - Fingerprint = SHA256 over the canonical plan JSON plus the tenant id.
//!   Two tenants never share an entry, even for identical query shapes,
//!   because their row-level-security predicates differ.
//! - Independent invalidation policies: TTL expiry (lazy, on lookup), LRU
//!   eviction under a byte budget, tag/dataset invalidation, and
//!   write-through invalidation driven by an external change notifier.
//! - Single-flight: concurrent misses on one fingerprint trigger exactly one
//!   backend execution; the rest wait on the shared result.
//!
//! Lock discipline: the store mutex guards map/LRU mutation only and is
//! never held across an adapter call.

mod coordinator;
mod fingerprint;
mod store;

pub use coordinator::CacheCoordinator;
pub(crate) use coordinator::execute_with_deadline;
pub use fingerprint::{compute_hash, fingerprint, Fingerprint};
pub use store::{dataset_tag, CacheEntry, CacheStats, CacheStore, InvalidationScope};

use thiserror::Error;

/// Errors raised by the cache subsystem.
///
/// These are fail-open by default at the engine level: a broken cache
/// bypasses to direct execution. The exception is [`CacheError::Inconsistency`],
/// which fails the request rather than risking wrong cached data.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored entry's key material does not match the probing plan's.
    /// Indicates a fingerprint collision or corruption; treated as a bug
    /// report, never served.
    #[error("cache inconsistency: key material mismatch for fingerprint {fingerprint}")]
    Inconsistency { fingerprint: String },
}

pub type CacheResult<T> = Result<T, CacheError>;
