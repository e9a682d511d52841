//! Calculated-metric expansion with cycle and depth detection.

use thiserror::Error;

use crate::catalog::Catalog;
use crate::formula::{self, FormulaError, FormulaExpr};
use crate::model::MetricKind;
use crate::plan::{MetricExpr, MetricWhen};

/// Errors raised during metric resolution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("metric not found: '{metric}' on dataset '{dataset}'")]
    UnknownMetric { dataset: String, metric: String },

    #[error("circular metric dependency: {}", .cycle.join(" -> "))]
    CircularDependency {
        /// The full cycle, first metric repeated at the end.
        cycle: Vec<String>,
    },

    #[error(
        "metric nesting exceeds the configured depth {limit}: {}",
        .chain.join(" -> ")
    )]
    DepthExceeded {
        limit: usize,
        /// The offending resolution chain, outermost first.
        chain: Vec<String>,
    },

    #[error("invalid formula for metric '{metric}': {source}")]
    Formula {
        metric: String,
        source: FormulaError,
    },
}

pub type MetricResult<T> = Result<T, MetricError>;

/// Expands metrics against a catalog snapshot.
///
/// Base aggregations resolve to leaves; calculated metrics parse their
/// formula and substitute each `{name}` placeholder with the referenced
/// metric's resolved tree, recursively. The `seen` path guards against
/// cycles and the depth counter against runaway nesting, so resolution can
/// never loop or overflow the stack regardless of catalog content.
pub struct MetricResolver<'a> {
    catalog: &'a Catalog,
    max_depth: usize,
}

impl<'a> MetricResolver<'a> {
    pub fn new(catalog: &'a Catalog, max_depth: usize) -> Self {
        Self { catalog, max_depth }
    }

    /// Resolve a metric on a dataset into a closed-form expression tree.
    pub fn resolve(&self, dataset: &str, metric: &str) -> MetricResult<MetricExpr> {
        let mut path = Vec::new();
        self.resolve_at(dataset, metric, 0, &mut path)
    }

    fn resolve_at(
        &self,
        dataset: &str,
        name: &str,
        depth: usize,
        path: &mut Vec<String>,
    ) -> MetricResult<MetricExpr> {
        if let Some(pos) = path.iter().position(|seen| seen == name) {
            let mut cycle: Vec<String> = path[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(MetricError::CircularDependency { cycle });
        }

        if depth > self.max_depth {
            let mut chain = path.clone();
            chain.push(name.to_string());
            return Err(MetricError::DepthExceeded {
                limit: self.max_depth,
                chain,
            });
        }

        let metric =
            self.catalog
                .get_metric(dataset, name)
                .map_err(|_| MetricError::UnknownMetric {
                    dataset: dataset.to_string(),
                    metric: name.to_string(),
                })?;

        match &metric.kind {
            MetricKind::Aggregation { func, field } => Ok(MetricExpr::Aggregation {
                func: *func,
                field: field.clone(),
            }),
            MetricKind::Calculated { formula } => {
                let parsed =
                    formula::parse_formula(formula).map_err(|source| MetricError::Formula {
                        metric: name.to_string(),
                        source,
                    })?;

                path.push(name.to_string());
                let expanded = self.expand(dataset, &parsed, depth, path);
                path.pop();
                expanded
            }
        }
    }

    /// Replace placeholders in a parsed formula with resolved subtrees.
    fn expand(
        &self,
        dataset: &str,
        expr: &FormulaExpr,
        depth: usize,
        path: &mut Vec<String>,
    ) -> MetricResult<MetricExpr> {
        match expr {
            FormulaExpr::Placeholder(name) => self.resolve_at(dataset, name, depth + 1, path),
            FormulaExpr::Number(value) => Ok(MetricExpr::Number(*value)),
            FormulaExpr::Binary { op, left, right } => Ok(MetricExpr::Binary {
                op: *op,
                left: Box::new(self.expand(dataset, left, depth, path)?),
                right: Box::new(self.expand(dataset, right, depth, path)?),
            }),
            FormulaExpr::Unary { op, expr } => Ok(MetricExpr::Unary {
                op: *op,
                expr: Box::new(self.expand(dataset, expr, depth, path)?),
            }),
            FormulaExpr::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.expand(dataset, arg, depth, path))
                    .collect::<MetricResult<Vec<_>>>()?;
                Ok(MetricExpr::Call {
                    name: name.clone(),
                    args,
                })
            }
            FormulaExpr::Case {
                when_clauses,
                else_clause,
            } => {
                let when_clauses = when_clauses
                    .iter()
                    .map(|clause| {
                        Ok(MetricWhen {
                            condition: self.expand(dataset, &clause.condition, depth, path)?,
                            result: self.expand(dataset, &clause.result, depth, path)?,
                        })
                    })
                    .collect::<MetricResult<Vec<_>>>()?;
                let else_clause = match else_clause {
                    Some(expr) => Some(Box::new(self.expand(dataset, expr, depth, path)?)),
                    None => None,
                };
                Ok(MetricExpr::Case {
                    when_clauses,
                    else_clause,
                })
            }
        }
    }
}
