//! Resolved query plan: the compiler's output and the cache-key material.
//!
//! Everything here serializes deterministically (struct field order, `Vec`s
//! only, no maps), because the canonical JSON of a plan plus the tenant id
//! is what the cache fingerprints. See [`crate::cache::fingerprint`].

use serde::{Deserialize, Serialize};

use crate::formula::{BinaryOp, UnaryOp};
use crate::model::{AggFunc, Cardinality, JoinType, SemanticType};

// ============================================================================
// Field references
// ============================================================================

/// A possibly dataset-qualified field reference from a request
/// (`country` or `customers.country`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    /// Referenced dataset; `None` means the request's primary dataset.
    pub dataset: Option<String>,
    pub name: String,
}

impl FieldRef {
    /// Parse a dotted reference. At most one dot is allowed.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.split_once('.') {
            None => Some(Self {
                dataset: None,
                name: raw.to_string(),
            }),
            Some((dataset, name)) => {
                if dataset.is_empty() || name.is_empty() || name.contains('.') {
                    return None;
                }
                Some(Self {
                    dataset: Some(dataset.to_string()),
                    name: name.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.dataset {
            Some(ds) => write!(f, "{}.{}", ds, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

// ============================================================================
// Predicates
// ============================================================================

/// Comparison operator in a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Like,
}

impl FilterOp {
    /// Stable ordering rank used by predicate canonicalization.
    pub fn rank(&self) -> u8 {
        match self {
            FilterOp::Eq => 0,
            FilterOp::Ne => 1,
            FilterOp::Lt => 2,
            FilterOp::Lte => 3,
            FilterOp::Gt => 4,
            FilterOp::Gte => 5,
            FilterOp::In => 6,
            FilterOp::Like => 7,
        }
    }
}

/// A filter comparison value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    List(Vec<FilterValue>),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Number(value as f64)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// Who contributed a predicate.
///
/// Row-level-security predicates are appended after all user predicates and
/// can never be removed or replaced by the caller; AND-combining both can
/// only narrow results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOrigin {
    User,
    RowLevelSecurity,
}

/// A single AND-combined predicate in the resolved plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// `field op value` on a dataset.
    Compare {
        dataset: String,
        field: String,
        op: FilterOp,
        value: FilterValue,
        origin: PredicateOrigin,
    },

    /// An opaque SQL condition (expression-mode RLS).
    Expression {
        dataset: String,
        sql: String,
        origin: PredicateOrigin,
    },
}

impl Predicate {
    pub fn origin(&self) -> PredicateOrigin {
        match self {
            Predicate::Compare { origin, .. } => *origin,
            Predicate::Expression { origin, .. } => *origin,
        }
    }

    /// Canonical sort key: field name, then operator, with dataset and value
    /// as final tie-breakers so canonical order never depends on input
    /// order.
    ///
    /// Expression predicates sort after comparisons by their SQL text; in
    /// practice only user predicates are canonically sorted and those are
    /// always comparisons.
    pub fn sort_key(&self) -> (String, u8, String, String) {
        match self {
            Predicate::Compare {
                dataset,
                field,
                op,
                value,
                ..
            } => (
                field.clone(),
                op.rank(),
                dataset.clone(),
                serde_json::to_string(value).unwrap_or_default(),
            ),
            Predicate::Expression { dataset, sql, .. } => {
                (sql.clone(), u8::MAX, dataset.clone(), String::new())
            }
        }
    }
}

// ============================================================================
// Plan components
// ============================================================================

/// A directional join step in the resolved plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedJoin {
    pub from_dataset: String,
    pub from_key: String,
    pub to_dataset: String,
    pub to_key: String,
    /// Join type adjusted for traversal direction.
    pub join_type: JoinType,
    /// Cardinality adjusted for traversal direction.
    pub cardinality: Cardinality,
    /// Declaration index of the catalog edge this step came from.
    pub edge_index: usize,
}

/// A dimension projected into the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionProjection {
    pub dataset: String,
    pub name: String,
    pub expression: String,
    pub semantic_type: SemanticType,
}

/// A fully resolved metric: calculated metrics flattened to a tree whose
/// leaves are base aggregations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMetric {
    pub dataset: String,
    pub name: String,
    pub expr: MetricExpr,
}

/// One `WHEN … THEN …` arm of a resolved `CASE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWhen {
    pub condition: MetricExpr,
    pub result: MetricExpr,
}

/// Resolved metric expression tree.
///
/// Internal nodes carry the operators of the original formula text verbatim;
/// leaves are base aggregations. Division by zero is an execution-time
/// concern, not resolved here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricExpr {
    /// Base aggregation leaf; `field: None` is `COUNT(*)`.
    Aggregation {
        func: AggFunc,
        field: Option<String>,
    },

    /// Numeric literal from the formula text.
    Number(f64),

    Binary {
        op: BinaryOp,
        left: Box<MetricExpr>,
        right: Box<MetricExpr>,
    },

    Unary {
        op: UnaryOp,
        expr: Box<MetricExpr>,
    },

    /// Function call kept verbatim, e.g. `NULLIF`.
    Call {
        name: String,
        args: Vec<MetricExpr>,
    },

    Case {
        when_clauses: Vec<MetricWhen>,
        else_clause: Option<Box<MetricExpr>>,
    },
}

impl MetricExpr {
    /// Count base-aggregation leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            MetricExpr::Aggregation { .. } => 1,
            MetricExpr::Number(_) => 0,
            MetricExpr::Binary { left, right, .. } => left.leaf_count() + right.leaf_count(),
            MetricExpr::Unary { expr, .. } => expr.leaf_count(),
            MetricExpr::Call { args, .. } => args.iter().map(MetricExpr::leaf_count).sum(),
            MetricExpr::Case {
                when_clauses,
                else_clause,
            } => {
                let mut count: usize = when_clauses
                    .iter()
                    .map(|w| w.condition.leaf_count() + w.result.leaf_count())
                    .sum();
                if let Some(e) = else_clause {
                    count += e.leaf_count();
                }
                count
            }
        }
    }
}

/// Sort specification from the request, kept in semantic order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

// ============================================================================
// The plan
// ============================================================================

/// Output of compilation: everything the execution adapter needs, in
/// canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQueryPlan {
    /// Datasets to scan: the primary first, then join targets in path order.
    pub datasets: Vec<String>,
    /// Join sequence with directionality fixed.
    pub joins: Vec<ResolvedJoin>,
    /// Dimension projections, canonically sorted.
    pub dimensions: Vec<DimensionProjection>,
    /// Resolved metrics, canonically sorted.
    pub metrics: Vec<ResolvedMetric>,
    /// User predicates (canonically sorted) followed by mandatory
    /// row-level-security predicates.
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortSpec>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ResolvedQueryPlan {
    /// The primary (anchor) dataset.
    pub fn primary_dataset(&self) -> Option<&str> {
        self.datasets.first().map(|s| s.as_str())
    }

    /// Predicates contributed by row-level security.
    pub fn security_predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates
            .iter()
            .filter(|p| p.origin() == PredicateOrigin::RowLevelSecurity)
    }
}
