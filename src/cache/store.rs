//! In-memory entry store with TTL, LRU, and tag invalidation.
//!
//! The store itself is not thread-safe; the coordinator wraps it in a mutex
//! and keeps critical sections to map mutation only.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::adapter::QueryResult;
use crate::config::CacheSettings;

use super::{CacheError, CacheResult};

/// Tag placed on every entry for each dataset its plan touches.
pub fn dataset_tag(dataset: &str) -> String {
    format!("dataset:{}", dataset)
}

/// Which entries an invalidation removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Entries carrying the tag.
    Tag(String),
    /// Entries whose plan touches the dataset.
    Dataset(String),
    /// Everything.
    All,
}

/// A stored result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Canonical key material, kept for collision detection.
    pub canonical: String,
    pub payload: Arc<QueryResult>,
    pub created_at: Instant,
    pub last_access: Instant,
    pub tags: HashSet<String>,
    /// Estimated payload size in bytes.
    pub size: usize,
}

/// Cache statistics for the observability side-channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in the cache.
    pub entry_count: usize,
    /// Total size of all payloads in bytes.
    pub total_size_bytes: usize,
}

/// Fingerprint-keyed entry store.
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    total_bytes: usize,
    ttl: Option<Duration>,
    max_bytes: usize,
}

impl CacheStore {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            entries: HashMap::new(),
            total_bytes: 0,
            ttl: settings.ttl(),
            max_bytes: settings.max_bytes,
        }
    }

    /// Look up an entry.
    ///
    /// TTL-expired entries are evicted lazily and read as misses. A stored
    /// entry whose canonical material differs from the probe's is a
    /// fingerprint collision and fails the lookup.
    pub fn get(
        &mut self,
        fingerprint: &str,
        canonical: &str,
        now: Instant,
    ) -> CacheResult<Option<Arc<QueryResult>>> {
        let expired = match self.entries.get(fingerprint) {
            None => return Ok(None),
            Some(entry) => match self.ttl {
                Some(ttl) => now.duration_since(entry.created_at) >= ttl,
                None => false,
            },
        };

        if expired {
            self.remove(fingerprint);
            return Ok(None);
        }

        let entry = self
            .entries
            .get_mut(fingerprint)
            .expect("entry checked above");

        if entry.canonical != canonical {
            return Err(CacheError::Inconsistency {
                fingerprint: fingerprint.to_string(),
            });
        }

        entry.last_access = now;
        Ok(Some(entry.payload.clone()))
    }

    /// Insert an entry, evicting least-recently-used entries while the byte
    /// budget is exceeded.
    pub fn insert(
        &mut self,
        fingerprint: String,
        canonical: String,
        payload: Arc<QueryResult>,
        tags: HashSet<String>,
        now: Instant,
    ) {
        let size = payload.size_estimate();

        self.remove(&fingerprint);
        self.entries.insert(
            fingerprint,
            CacheEntry {
                canonical,
                payload,
                created_at: now,
                last_access: now,
                tags,
                size,
            },
        );
        self.total_bytes += size;

        // Strict LRU by last access, not insertion order.
        while self.total_bytes > self.max_bytes {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    self.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Remove every entry matching the scope. Returns the number removed.
    pub fn invalidate(&mut self, scope: &InvalidationScope) -> usize {
        let matching: Vec<String> = match scope {
            InvalidationScope::All => self.entries.keys().cloned().collect(),
            InvalidationScope::Tag(tag) => self.keys_with_tag(tag),
            InvalidationScope::Dataset(dataset) => self.keys_with_tag(&dataset_tag(dataset)),
        };

        let count = matching.len();
        for key in matching {
            self.remove(&key);
        }
        count
    }

    fn keys_with_tag(&self, tag: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.tags.contains(tag))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn remove(&mut self, fingerprint: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(fingerprint)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            total_size_bytes: self.total_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
