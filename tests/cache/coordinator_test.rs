// tests/cache/coordinator_test.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;

use quarry::adapter::{ExecutionAdapter, ExecutionError, QueryResult};
use quarry::cache::{CacheCoordinator, Fingerprint, InvalidationScope};
use quarry::config::CacheSettings;
use quarry::error::EngineError;
use quarry::events::CacheOutcome;
use quarry::plan::ResolvedQueryPlan;

/// Adapter that counts executions and can be slowed down or made to fail.
struct CountingAdapter {
    executions: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl CountingAdapter {
    fn new() -> Self {
        Self {
            executions: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    fn count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionAdapter for CountingAdapter {
    async fn execute(
        &self,
        plan: &ResolvedQueryPlan,
        _deadline: Option<Instant>,
    ) -> Result<QueryResult, ExecutionError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ExecutionError::Backend("backend unavailable".to_string()));
        }
        Ok(QueryResult {
            columns: vec![],
            rows: vec![vec![serde_json::json!(plan.datasets[0].clone())]],
        })
    }
}

fn settings() -> CacheSettings {
    CacheSettings {
        enabled: true,
        ttl_seconds: 0,
        max_bytes: usize::MAX,
    }
}

fn plan(dataset: &str) -> Arc<ResolvedQueryPlan> {
    Arc::new(ResolvedQueryPlan {
        datasets: vec![dataset.to_string()],
        joins: vec![],
        dimensions: vec![],
        metrics: vec![],
        predicates: vec![],
        sort: vec![],
        limit: None,
        offset: None,
    })
}

fn key(hash: &str) -> Fingerprint {
    Fingerprint {
        hash: hash.to_string(),
        canonical: format!("material-{}", hash),
    }
}

#[tokio::test]
async fn test_miss_then_hit() {
    let coordinator = CacheCoordinator::new(&settings());
    let adapter = Arc::new(CountingAdapter::new());

    let (_, outcome) = coordinator
        .get_or_execute(key("fp1"), plan("orders"), adapter.clone(), None)
        .await
        .unwrap();
    assert_eq!(outcome, CacheOutcome::Miss);
    assert_eq!(adapter.count(), 1);

    let (_, outcome) = coordinator
        .get_or_execute(key("fp1"), plan("orders"), adapter.clone(), None)
        .await
        .unwrap();
    assert_eq!(outcome, CacheOutcome::Hit);
    assert_eq!(adapter.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_collapses_concurrent_misses() {
    let coordinator = Arc::new(CacheCoordinator::new(&settings()));
    let adapter = Arc::new(CountingAdapter::slow(Duration::from_millis(100)));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = coordinator.clone();
            let adapter = adapter.clone();
            tokio::spawn(async move {
                coordinator
                    .get_or_execute(key("fp1"), plan("orders"), adapter, None)
                    .await
            })
        })
        .collect();

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    // Exactly one backend execution for N concurrent identical misses.
    assert_eq!(adapter.count(), 1);
    assert_eq!(results.len(), 8);

    // One leader, the rest shared the flight (or hit the freshly stored
    // entry if they arrived after completion).
    let leaders = results
        .iter()
        .filter(|(_, outcome)| *outcome == CacheOutcome::Miss)
        .count();
    assert_eq!(leaders, 1);

    // Everyone got the same payload.
    let first = &results[0].0;
    for (payload, _) in &results {
        assert_eq!(payload.rows, first.rows);
    }
}

#[tokio::test]
async fn test_distinct_fingerprints_execute_independently() {
    let coordinator = CacheCoordinator::new(&settings());
    let adapter = Arc::new(CountingAdapter::new());

    coordinator
        .get_or_execute(key("fp1"), plan("orders"), adapter.clone(), None)
        .await
        .unwrap();
    coordinator
        .get_or_execute(key("fp2"), plan("customers"), adapter.clone(), None)
        .await
        .unwrap();

    assert_eq!(adapter.count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_propagates_to_all_waiters_and_is_not_cached() {
    let coordinator = Arc::new(CacheCoordinator::new(&settings()));
    let adapter = Arc::new(CountingAdapter {
        executions: AtomicUsize::new(0),
        delay: Duration::from_millis(50),
        fail: true,
    });

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let coordinator = coordinator.clone();
            let adapter = adapter.clone();
            tokio::spawn(async move {
                coordinator
                    .get_or_execute(key("fp1"), plan("orders"), adapter, None)
                    .await
            })
        })
        .collect();

    for joined in join_all(tasks).await {
        let result = joined.unwrap();
        assert!(matches!(
            result,
            Err(EngineError::Execution(ExecutionError::Backend(_)))
        ));
    }
    assert_eq!(adapter.count(), 1);

    // Nothing stored: the next attempt executes again.
    let ok_adapter = Arc::new(CountingAdapter::new());
    let (_, outcome) = coordinator
        .get_or_execute(key("fp1"), plan("orders"), ok_adapter.clone(), None)
        .await
        .unwrap();
    assert_eq!(outcome, CacheOutcome::Miss);
    assert_eq!(ok_adapter.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_waiter_leaves_execution_running() {
    let coordinator = Arc::new(CacheCoordinator::new(&settings()));
    let adapter = Arc::new(CountingAdapter::slow(Duration::from_millis(200)));

    // Leader with no deadline.
    let leader = {
        let coordinator = coordinator.clone();
        let adapter = adapter.clone();
        tokio::spawn(async move {
            coordinator
                .get_or_execute(key("fp1"), plan("orders"), adapter, None)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Waiter with a deadline that expires mid-flight.
    let waiter_result = coordinator
        .get_or_execute(
            key("fp1"),
            plan("orders"),
            adapter.clone(),
            Some(Instant::now() + Duration::from_millis(50)),
        )
        .await;
    assert!(matches!(waiter_result, Err(EngineError::DeadlineExceeded)));

    // The in-flight execution is unaffected: the leader completes and the
    // result lands in the cache.
    let (_, outcome) = leader.await.unwrap().unwrap();
    assert_eq!(outcome, CacheOutcome::Miss);
    assert_eq!(adapter.count(), 1);
    assert!(coordinator.lookup(&key("fp1")).unwrap().is_some());
}

#[tokio::test]
async fn test_disabled_cache_bypasses() {
    let coordinator = CacheCoordinator::new(&CacheSettings {
        enabled: false,
        ..settings()
    });
    let adapter = Arc::new(CountingAdapter::new());

    for _ in 0..2 {
        let (_, outcome) = coordinator
            .get_or_execute(key("fp1"), plan("orders"), adapter.clone(), None)
            .await
            .unwrap();
        assert_eq!(outcome, CacheOutcome::Bypass);
    }
    assert_eq!(adapter.count(), 2);
}

#[tokio::test]
async fn test_invalidation_is_visible_to_next_lookup() {
    let coordinator = CacheCoordinator::new(&settings());
    let adapter = Arc::new(CountingAdapter::new());

    coordinator
        .get_or_execute(key("fp1"), plan("orders"), adapter.clone(), None)
        .await
        .unwrap();
    coordinator
        .get_or_execute(key("fp2"), plan("customers"), adapter.clone(), None)
        .await
        .unwrap();

    let removed = coordinator.invalidate(InvalidationScope::Dataset("orders".to_string()));
    assert_eq!(removed, 1);

    // Once invalidate has returned, no lookup may see stale data.
    assert!(coordinator.lookup(&key("fp1")).unwrap().is_none());
    assert!(coordinator.lookup(&key("fp2")).unwrap().is_some());
}
