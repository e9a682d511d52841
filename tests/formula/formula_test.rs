// tests/formula/formula_test.rs
use quarry::formula::{parse_formula, BinaryOp, FormulaError, FormulaExpr};

#[test]
fn test_simple_difference() {
    let expr = parse_formula("{revenue} - {refunds}").unwrap();
    assert_eq!(
        expr,
        FormulaExpr::Binary {
            op: BinaryOp::Sub,
            left: Box::new(FormulaExpr::Placeholder("revenue".to_string())),
            right: Box::new(FormulaExpr::Placeholder("refunds".to_string())),
        }
    );
}

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    let expr = parse_formula("{a} + {b} * {c}").unwrap();
    match expr {
        FormulaExpr::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } => {
            assert_eq!(*left, FormulaExpr::Placeholder("a".to_string()));
            assert!(matches!(
                *right,
                FormulaExpr::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            ));
        }
        other => panic!("unexpected tree: {:?}", other),
    }
}

#[test]
fn test_left_associativity() {
    // a - b - c parses as (a - b) - c
    let expr = parse_formula("{a} - {b} - {c}").unwrap();
    match expr {
        FormulaExpr::Binary {
            op: BinaryOp::Sub,
            left,
            right,
        } => {
            assert!(matches!(
                *left,
                FormulaExpr::Binary {
                    op: BinaryOp::Sub,
                    ..
                }
            ));
            assert_eq!(*right, FormulaExpr::Placeholder("c".to_string()));
        }
        other => panic!("unexpected tree: {:?}", other),
    }
}

#[test]
fn test_nullif_guard() {
    let expr = parse_formula("{revenue} / NULLIF({order_count}, 0)").unwrap();
    let placeholders = expr.placeholders();
    assert_eq!(placeholders, vec!["revenue", "order_count"]);
}

#[test]
fn test_case_without_else() {
    let expr = parse_formula("CASE WHEN {margin} >= 0.5 THEN 1 END").unwrap();
    match expr {
        FormulaExpr::Case {
            when_clauses,
            else_clause,
        } => {
            assert_eq!(when_clauses.len(), 1);
            assert!(else_clause.is_none());
            assert!(matches!(
                when_clauses[0].condition,
                FormulaExpr::Binary {
                    op: BinaryOp::Gte,
                    ..
                }
            ));
        }
        other => panic!("unexpected tree: {:?}", other),
    }
}

#[test]
fn test_case_with_multiple_arms() {
    let expr = parse_formula(
        "CASE WHEN {orders} > 1000 THEN {revenue} WHEN {orders} > 100 THEN {revenue} / 2 ELSE 0 END",
    )
    .unwrap();
    match expr {
        FormulaExpr::Case { when_clauses, .. } => assert_eq!(when_clauses.len(), 2),
        other => panic!("unexpected tree: {:?}", other),
    }
}

#[test]
fn test_keywords_case_insensitive() {
    assert!(parse_formula("case when {a} > 0 then {a} else 0 end").is_ok());
}

#[test]
fn test_cross_dataset_placeholder_rejected() {
    assert!(matches!(
        parse_formula("{customers.lifetime_value} * 2"),
        Err(FormulaError::CrossDatasetPlaceholder { .. })
    ));
}

#[test]
fn test_unbalanced_parens() {
    assert!(parse_formula("({a} + {b}").is_err());
    assert!(parse_formula("{a} + {b})").is_err());
}

#[test]
fn test_dangling_operator() {
    assert!(matches!(
        parse_formula("{a} +"),
        Err(FormulaError::UnexpectedEnd { .. })
    ));
}

#[test]
fn test_nested_calls_and_parens() {
    let expr = parse_formula("NULLIF(({a} - {b}) / NULLIF({c}, 0), 0)").unwrap();
    assert_eq!(expr.placeholders(), vec!["a", "b", "c"]);
}
