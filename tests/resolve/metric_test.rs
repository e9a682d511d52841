// tests/resolve/metric_test.rs
use quarry::catalog::{Catalog, CatalogSource};
use quarry::model::{AggFunc, Dataset, Metric};
use quarry::plan::MetricExpr;
use quarry::resolve::{MetricError, MetricResolver};

fn orders_catalog(extra: Vec<Metric>) -> Catalog {
    let mut ds = Dataset::new("orders", "analytics.orders")
        .with_metric(Metric::aggregation("revenue", AggFunc::Sum, Some("amount")))
        .with_metric(Metric::aggregation("order_count", AggFunc::Count, None));
    ds.metrics.extend(extra);
    Catalog::from_source(CatalogSource::new(vec![ds], vec![]))
}

#[test]
fn test_aov_flattens_to_two_leaves() {
    let catalog = orders_catalog(vec![Metric::calculated(
        "aov",
        "{revenue} / NULLIF({order_count}, 0)",
    )]);
    let resolver = MetricResolver::new(&catalog, 5);

    let expr = resolver.resolve("orders", "aov").unwrap();
    assert_eq!(expr.leaf_count(), 2);

    // The guard call survives verbatim.
    match expr {
        MetricExpr::Binary { right, .. } => match *right {
            MetricExpr::Call { ref name, ref args } => {
                assert_eq!(name, "NULLIF");
                assert_eq!(
                    args[0],
                    MetricExpr::Aggregation {
                        func: AggFunc::Count,
                        field: None,
                    }
                );
                assert_eq!(args[1], MetricExpr::Number(0.0));
            }
            ref other => panic!("unexpected rhs: {:?}", other),
        },
        other => panic!("unexpected tree: {:?}", other),
    }
}

#[test]
fn test_transitive_expansion() {
    let catalog = orders_catalog(vec![
        Metric::calculated("net_revenue", "{revenue} - {refunds}"),
        Metric::aggregation("refunds", AggFunc::Sum, Some("refund_amount")),
        Metric::calculated("net_aov", "{net_revenue} / NULLIF({order_count}, 0)"),
    ]);
    let resolver = MetricResolver::new(&catalog, 5);

    let expr = resolver.resolve("orders", "net_aov").unwrap();
    // revenue, refunds, order_count
    assert_eq!(expr.leaf_count(), 3);
}

#[test]
fn test_mutual_recursion_names_full_cycle() {
    let catalog = orders_catalog(vec![
        Metric::calculated("a", "{b} + 1"),
        Metric::calculated("b", "{a} + 1"),
    ]);
    // A generous depth bound: the cycle must be caught as a cycle, not as
    // depth exhaustion, and must not loop or overflow.
    let resolver = MetricResolver::new(&catalog, 64);

    match resolver.resolve("orders", "a").unwrap_err() {
        MetricError::CircularDependency { cycle } => {
            assert_eq!(cycle, vec!["a", "b", "a"]);
        }
        other => panic!("expected cycle error, got {:?}", other),
    }

    // The error message names the cycle for diagnostics.
    let message = resolver.resolve("orders", "a").unwrap_err().to_string();
    assert!(message.contains("a -> b -> a"), "message: {}", message);
}

#[test]
fn test_three_way_cycle() {
    let catalog = orders_catalog(vec![
        Metric::calculated("x", "{y} * 2"),
        Metric::calculated("y", "{z} * 2"),
        Metric::calculated("z", "{x} * 2"),
    ]);
    let resolver = MetricResolver::new(&catalog, 64);

    match resolver.resolve("orders", "x").unwrap_err() {
        MetricError::CircularDependency { cycle } => {
            assert_eq!(cycle, vec!["x", "y", "z", "x"]);
        }
        other => panic!("expected cycle error, got {:?}", other),
    }
}

#[test]
fn test_depth_bound_includes_chain_and_limit() {
    let chain: Vec<Metric> = (1..=8)
        .map(|i| Metric::calculated(format!("level{}", i), format!("{{level{}}} + 1", i - 1)))
        .collect();
    let mut metrics = vec![Metric::aggregation("level0", AggFunc::Count, None)];
    metrics.extend(chain);

    let catalog = orders_catalog(metrics);
    let resolver = MetricResolver::new(&catalog, 5);

    match resolver.resolve("orders", "level8").unwrap_err() {
        MetricError::DepthExceeded { limit, chain } => {
            assert_eq!(limit, 5);
            assert_eq!(chain.first().map(String::as_str), Some("level8"));
            assert!(chain.len() > 5);
        }
        other => panic!("expected depth error, got {:?}", other),
    }
}

#[test]
fn test_within_depth_bound_succeeds() {
    let catalog = orders_catalog(vec![
        Metric::calculated("l1", "{order_count} + 1"),
        Metric::calculated("l2", "{l1} + 1"),
        Metric::calculated("l3", "{l2} + 1"),
    ]);
    let resolver = MetricResolver::new(&catalog, 5);
    assert!(resolver.resolve("orders", "l3").is_ok());
}

#[test]
fn test_formula_error_names_metric() {
    let catalog = orders_catalog(vec![Metric::calculated("broken", "{revenue} +")]);
    let resolver = MetricResolver::new(&catalog, 5);

    match resolver.resolve("orders", "broken").unwrap_err() {
        MetricError::Formula { metric, .. } => assert_eq!(metric, "broken"),
        other => panic!("expected formula error, got {:?}", other),
    }
}

#[test]
fn test_placeholder_to_missing_metric() {
    let catalog = orders_catalog(vec![Metric::calculated("m", "{ghost} + 1")]);
    let resolver = MetricResolver::new(&catalog, 5);
    assert!(matches!(
        resolver.resolve("orders", "m"),
        Err(MetricError::UnknownMetric { .. })
    ));
}
