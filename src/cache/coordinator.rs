//! Cache coordination: lookup, store, invalidation, and single-flight.
//!
//! Concurrent misses for one fingerprint are collapsed to a single backend
//! execution. The first arrival registers a watch channel in the in-flight
//! map and spawns a detached execution task; later arrivals (and the first
//! one) wait on the channel. A waiter that hits its deadline simply stops
//! waiting; the execution task is owned by the runtime, not by any single
//! waiter, so it still completes and stores for everyone else.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::timeout_at;
use tracing::{debug, warn};

use crate::adapter::{ExecutionAdapter, ExecutionError, QueryResult};
use crate::config::CacheSettings;
use crate::error::EngineError;
use crate::events::CacheOutcome;
use crate::plan::ResolvedQueryPlan;

use super::store::{dataset_tag, CacheStats, CacheStore, InvalidationScope};
use super::Fingerprint;

type FlightOutcome = Result<Arc<QueryResult>, ExecutionError>;
type FlightReceiver = watch::Receiver<Option<FlightOutcome>>;

/// Thread-safe cache front end with single-flight miss handling.
pub struct CacheCoordinator {
    store: Arc<Mutex<CacheStore>>,
    in_flight: Arc<DashMap<String, FlightReceiver>>,
    enabled: bool,
}

impl CacheCoordinator {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            store: Arc::new(Mutex::new(CacheStore::new(settings))),
            in_flight: Arc::new(DashMap::new()),
            enabled: settings.enabled,
        }
    }

    /// Serve a plan from cache, or execute it exactly once per fingerprint.
    pub async fn get_or_execute(
        &self,
        key: Fingerprint,
        plan: Arc<ResolvedQueryPlan>,
        adapter: Arc<dyn ExecutionAdapter>,
        deadline: Option<Instant>,
    ) -> Result<(Arc<QueryResult>, CacheOutcome), EngineError> {
        if !self.enabled {
            let result = execute_with_deadline(adapter.as_ref(), &plan, deadline).await?;
            return Ok((Arc::new(result), CacheOutcome::Bypass));
        }

        // Fast path: stored entry.
        if let Some(payload) = self.lookup(&key)? {
            debug!(fingerprint = %key.hash, "cache hit");
            return Ok((payload, CacheOutcome::Hit));
        }

        // Single flight: register as leader or join an existing execution.
        let (receiver, leader) = match self.in_flight.entry(key.hash.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(slot) => {
                // A flight for this fingerprint may have completed between
                // the miss above and taking the entry; results land in the
                // store before the in-flight marker clears, so one re-check
                // here closes the window.
                let cached = self
                    .lock_store()
                    .get(&key.hash, &key.canonical, Instant::now())
                    .map_err(EngineError::Cache)?;
                if let Some(payload) = cached {
                    return Ok((payload, CacheOutcome::Hit));
                }

                let (tx, rx) = watch::channel(None);
                slot.insert(rx.clone());
                self.spawn_execution(key.clone(), plan, adapter, deadline, tx);
                (rx, true)
            }
        };

        let outcome = wait_for_flight(receiver, deadline).await?;
        let payload = outcome.map_err(EngineError::Execution)?;
        let cache_outcome = if leader {
            CacheOutcome::Miss
        } else {
            CacheOutcome::Shared
        };
        Ok((payload, cache_outcome))
    }

    /// Look up a stored entry; TTL-expired entries read as misses.
    pub fn lookup(&self, key: &Fingerprint) -> Result<Option<Arc<QueryResult>>, EngineError> {
        let mut store = self.lock_store();
        store
            .get(&key.hash, &key.canonical, Instant::now())
            .map_err(EngineError::Cache)
    }

    /// Store a result for a fingerprint, tagging it with every dataset the
    /// plan touches.
    pub fn store(&self, key: &Fingerprint, plan: &ResolvedQueryPlan, payload: Arc<QueryResult>) {
        let tags: HashSet<String> = plan.datasets.iter().map(|d| dataset_tag(d)).collect();
        let mut store = self.lock_store();
        store.insert(
            key.hash.clone(),
            key.canonical.clone(),
            payload,
            tags,
            Instant::now(),
        );
    }

    /// Remove every entry matching the scope; atomic with respect to
    /// concurrent lookups. Returns the number of entries removed.
    pub fn invalidate(&self, scope: InvalidationScope) -> usize {
        let removed = self.lock_store().invalidate(&scope);
        debug!(?scope, removed, "cache invalidation");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.lock_store().stats()
    }

    /// Spawn the detached execution task for a fingerprint.
    ///
    /// Stores the result before clearing the in-flight marker, so a request
    /// arriving in between sees the cache entry rather than re-executing.
    fn spawn_execution(
        &self,
        key: Fingerprint,
        plan: Arc<ResolvedQueryPlan>,
        adapter: Arc<dyn ExecutionAdapter>,
        deadline: Option<Instant>,
        tx: watch::Sender<Option<FlightOutcome>>,
    ) {
        let store = self.store.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            let result = execute_with_deadline(adapter.as_ref(), &plan, deadline).await;

            let outcome: FlightOutcome = match result {
                Ok(payload) => {
                    let payload = Arc::new(payload);
                    let tags: HashSet<String> =
                        plan.datasets.iter().map(|d| dataset_tag(d)).collect();
                    let mut guard = store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    guard.insert(
                        key.hash.clone(),
                        key.canonical.clone(),
                        payload.clone(),
                        tags,
                        Instant::now(),
                    );
                    drop(guard);
                    Ok(payload)
                }
                Err(err) => {
                    warn!(fingerprint = %key.hash, error = %err, "execution failed");
                    Err(err)
                }
            };

            in_flight.remove(&key.hash);
            let _ = tx.send(Some(outcome));
        });
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, CacheStore> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Wait on a flight channel, honoring the caller's deadline.
///
/// Deadline expiry abandons the wait only; the underlying execution task is
/// unaffected and its eventual store still benefits other waiters.
async fn wait_for_flight(
    mut receiver: FlightReceiver,
    deadline: Option<Instant>,
) -> Result<FlightOutcome, EngineError> {
    loop {
        if let Some(outcome) = receiver.borrow().clone() {
            return Ok(outcome);
        }

        let changed = receiver.changed();
        let result = match deadline {
            Some(d) => timeout_at(tokio::time::Instant::from_std(d), changed)
                .await
                .map_err(|_| EngineError::DeadlineExceeded)?,
            None => changed.await,
        };

        result.map_err(|_| {
            EngineError::Execution(ExecutionError::Aborted(
                "execution task terminated without a result".to_string(),
            ))
        })?;
    }
}

/// Execute directly, wrapping the adapter call in the deadline even if the
/// adapter ignores the one it is handed.
pub(crate) async fn execute_with_deadline(
    adapter: &dyn ExecutionAdapter,
    plan: &ResolvedQueryPlan,
    deadline: Option<Instant>,
) -> Result<QueryResult, ExecutionError> {
    match deadline {
        Some(d) => timeout_at(tokio::time::Instant::from_std(d), adapter.execute(plan, deadline))
            .await
            .unwrap_or(Err(ExecutionError::DeadlineExceeded)),
        None => adapter.execute(plan, None).await,
    }
}
