// tests/cache/store_test.rs
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use quarry::adapter::QueryResult;
use quarry::cache::{dataset_tag, CacheStore, InvalidationScope};
use quarry::config::CacheSettings;

fn settings(ttl_seconds: u64) -> CacheSettings {
    CacheSettings {
        enabled: true,
        ttl_seconds,
        max_bytes: usize::MAX,
    }
}

fn payload(rows: usize) -> Arc<QueryResult> {
    Arc::new(QueryResult {
        columns: vec![],
        rows: (0..rows).map(|i| vec![serde_json::json!(i)]).collect(),
    })
}

fn tags(datasets: &[&str]) -> HashSet<String> {
    datasets.iter().map(|d| dataset_tag(d)).collect()
}

#[test]
fn test_entry_tagged_with_multiple_datasets() {
    let mut store = CacheStore::new(&settings(0));
    let now = Instant::now();

    // A plan joining orders to customers carries both dataset tags.
    store.insert(
        "joined".into(),
        "m-joined".into(),
        payload(3),
        tags(&["orders", "customers"]),
        now,
    );
    store.insert(
        "orders-only".into(),
        "m-orders".into(),
        payload(3),
        tags(&["orders"]),
        now,
    );
    store.insert(
        "rates".into(),
        "m-rates".into(),
        payload(3),
        tags(&["reference_rates"]),
        now,
    );

    // Invalidating customers removes the joined entry only.
    let removed = store.invalidate(&InvalidationScope::Dataset("customers".to_string()));
    assert_eq!(removed, 1);
    assert!(store.get("joined", "m-joined", now).unwrap().is_none());
    assert!(store.get("orders-only", "m-orders", now).unwrap().is_some());

    // Invalidating orders then removes the orders-only entry.
    let removed = store.invalidate(&InvalidationScope::Dataset("orders".to_string()));
    assert_eq!(removed, 1);
    assert!(store.get("rates", "m-rates", now).unwrap().is_some());
}

#[test]
fn test_tag_scope_matches_arbitrary_tags() {
    let mut store = CacheStore::new(&settings(0));
    let now = Instant::now();

    let mut tagged: HashSet<String> = tags(&["orders"]);
    tagged.insert("report:weekly".to_string());
    store.insert("a".into(), "ma".into(), payload(1), tagged, now);
    store.insert("b".into(), "mb".into(), payload(1), tags(&["orders"]), now);

    let removed = store.invalidate(&InvalidationScope::Tag("report:weekly".to_string()));
    assert_eq!(removed, 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_stats_track_inserts_and_removals() {
    let mut store = CacheStore::new(&settings(0));
    let now = Instant::now();

    assert_eq!(store.stats().entry_count, 0);
    assert_eq!(store.stats().total_size_bytes, 0);

    store.insert("a".into(), "ma".into(), payload(10), tags(&["orders"]), now);
    store.insert("b".into(), "mb".into(), payload(10), tags(&["orders"]), now);

    let stats = store.stats();
    assert_eq!(stats.entry_count, 2);
    assert!(stats.total_size_bytes > 0);

    store.invalidate(&InvalidationScope::All);
    assert_eq!(store.stats().entry_count, 0);
    assert_eq!(store.stats().total_size_bytes, 0);
}

#[test]
fn test_reinsert_replaces_entry() {
    let mut store = CacheStore::new(&settings(0));
    let now = Instant::now();

    store.insert("a".into(), "ma".into(), payload(1), tags(&["orders"]), now);
    let small = store.stats().total_size_bytes;

    store.insert("a".into(), "ma".into(), payload(100), tags(&["orders"]), now);
    let stats = store.stats();
    assert_eq!(stats.entry_count, 1);
    assert!(stats.total_size_bytes > small);
}

#[test]
fn test_expired_entry_does_not_resurrect() {
    let mut store = CacheStore::new(&settings(30));
    let created = Instant::now();

    store.insert("a".into(), "ma".into(), payload(1), tags(&["orders"]), created);

    let expired = created + Duration::from_secs(31);
    assert!(store.get("a", "ma", expired).unwrap().is_none());
    // Gone for good, not merely hidden.
    assert!(store.get("a", "ma", created + Duration::from_secs(1)).unwrap().is_none());
    assert_eq!(store.len(), 0);
}
