//! Staged query compilation.
//!
//! ```text
//! QueryRequest ──▶ Parse ──▶ ResolveMetrics ──▶ ResolveJoins ──▶ InjectRls ──▶ Canonicalize ──▶ ResolvedQueryPlan
//! ```
//!
//! Stages run strictly in order and the first failure aborts the rest; no
//! partial plan ever reaches execution. Canonicalization makes compilation
//! deterministic: semantically identical requests (same dimensions, metrics,
//! and filters in any input order) produce identical plans, and therefore
//! identical cache fingerprints.

use tracing::debug;

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::model::TenantContext;
use crate::plan::{
    DimensionProjection, FieldRef, Predicate, PredicateOrigin, ResolvedJoin, ResolvedMetric,
    ResolvedQueryPlan,
};
use crate::request::{QueryRequest, RequestError};
use crate::resolve::{inject_rls, JoinError, JoinPathResolver, MetricError, MetricResolver, RlsError};

// ============================================================================
// Stages and errors
// ============================================================================

/// Compilation stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Parse,
    ResolveMetrics,
    ResolveJoins,
    InjectRls,
    Canonicalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::ResolveMetrics => "resolve-metrics",
            Stage::ResolveJoins => "resolve-joins",
            Stage::InjectRls => "inject-rls",
            Stage::Canonicalize => "canonicalize",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised during compilation, tagged with the originating stage.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("[parse] {0}")]
    Parse(#[from] RequestError),

    #[error("[resolve-metrics] {0}")]
    Metric(#[from] MetricError),

    #[error("[resolve-joins] {0}")]
    Join(#[from] JoinError),

    #[error("[inject-rls] {0}")]
    Rls(#[from] RlsError),
}

impl CompileError {
    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            CompileError::Parse(_) => Stage::Parse,
            CompileError::Metric(_) => Stage::ResolveMetrics,
            CompileError::Join(_) => Stage::ResolveJoins,
            CompileError::Rls(_) => Stage::InjectRls,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Compiler
// ============================================================================

/// Compiles abstract requests against one catalog snapshot.
///
/// Cheap to construct; hold it for no longer than one request so a catalog
/// reload takes effect on the next request.
pub struct QueryCompiler<'a> {
    catalog: &'a Catalog,
    config: &'a EngineConfig,
}

/// A parsed dimension or filter reference, pinned to its dataset.
struct BoundField {
    dataset: String,
    name: String,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a EngineConfig) -> Self {
        Self { catalog, config }
    }

    /// Run all stages and produce a canonical plan.
    pub fn compile(
        &self,
        request: &QueryRequest,
        tenant: &TenantContext,
    ) -> CompileResult<ResolvedQueryPlan> {
        let parsed = self.parse(request)?;
        let metrics = self.resolve_metrics(&parsed)?;
        let joins = self.resolve_joins(&parsed)?;
        let security = self.inject_rls(&parsed, &joins, tenant)?;
        let plan = self.canonicalize(request, parsed, metrics, joins, security);

        debug!(
            dataset = %plan.datasets[0],
            joins = plan.joins.len(),
            metrics = plan.metrics.len(),
            predicates = plan.predicates.len(),
            "compiled query plan"
        );

        Ok(plan)
    }

    // ------------------------------------------------------------------
    // Stage: parse
    // ------------------------------------------------------------------

    fn parse(&self, request: &QueryRequest) -> CompileResult<ParsedRequest> {
        let primary = self
            .catalog
            .get_dataset(&request.dataset)
            .map_err(|_| RequestError::UnknownDataset(request.dataset.clone()))?;

        if request.dimensions.is_empty() && request.metrics.is_empty() {
            return Err(RequestError::EmptySelection.into());
        }

        let mut dimensions = Vec::with_capacity(request.dimensions.len());
        for raw in &request.dimensions {
            dimensions.push(self.bind_dimension(raw, &primary.id)?);
        }

        let mut filters = Vec::with_capacity(request.filters.len());
        for filter in &request.filters {
            let bound = self.bind_dimension(&filter.field, &primary.id)?;
            filters.push((bound, filter.op, filter.value.clone()));
        }

        let mut metrics = Vec::with_capacity(request.metrics.len());
        for raw in &request.metrics {
            let field = FieldRef::parse(raw)
                .ok_or_else(|| RequestError::InvalidFieldRef(raw.clone()))?;
            let dataset = field.dataset.unwrap_or_else(|| primary.id.clone());
            // Existence of the dataset is a parse concern; existence of the
            // metric itself belongs to the resolution stage.
            if !self.catalog.has_dataset(&dataset) {
                return Err(RequestError::UnknownDataset(dataset).into());
            }
            metrics.push(BoundField {
                dataset,
                name: field.name,
            });
        }

        Ok(ParsedRequest {
            primary: primary.id.clone(),
            dimensions,
            metrics,
            filters,
            explicit_joins: request.joins.clone(),
        })
    }

    fn bind_dimension(&self, raw: &str, primary: &str) -> CompileResult<BoundField> {
        let field =
            FieldRef::parse(raw).ok_or_else(|| RequestError::InvalidFieldRef(raw.to_string()))?;
        let dataset_id = field.dataset.unwrap_or_else(|| primary.to_string());
        let dataset = self
            .catalog
            .get_dataset(&dataset_id)
            .map_err(|_| RequestError::UnknownDataset(dataset_id.clone()))?;
        if dataset.dimension(&field.name).is_none() {
            return Err(RequestError::UnknownDimension {
                dataset: dataset_id,
                field: field.name,
            }
            .into());
        }
        Ok(BoundField {
            dataset: dataset_id,
            name: field.name,
        })
    }

    // ------------------------------------------------------------------
    // Stage: resolve metrics
    // ------------------------------------------------------------------

    fn resolve_metrics(&self, parsed: &ParsedRequest) -> CompileResult<Vec<ResolvedMetric>> {
        let resolver = MetricResolver::new(self.catalog, self.config.max_metric_depth);
        let mut resolved = Vec::with_capacity(parsed.metrics.len());
        for metric in &parsed.metrics {
            let expr = resolver.resolve(&metric.dataset, &metric.name)?;
            resolved.push(ResolvedMetric {
                dataset: metric.dataset.clone(),
                name: metric.name.clone(),
                expr,
            });
        }
        Ok(resolved)
    }

    // ------------------------------------------------------------------
    // Stage: resolve joins
    // ------------------------------------------------------------------

    fn resolve_joins(&self, parsed: &ParsedRequest) -> CompileResult<Vec<ResolvedJoin>> {
        let resolver = JoinPathResolver::new(self.catalog, self.config.max_join_depth);

        // Every cross-dataset reference, in first-appearance order:
        // dimensions, metrics, filters, then explicit joins.
        let mut targets: Vec<&str> = Vec::new();
        for bound in parsed
            .dimensions
            .iter()
            .chain(parsed.metrics.iter())
            .chain(parsed.filters.iter().map(|(bound, _, _)| bound))
        {
            if bound.dataset != parsed.primary && !targets.contains(&bound.dataset.as_str()) {
                targets.push(&bound.dataset);
            }
        }
        for explicit in &parsed.explicit_joins {
            if explicit != &parsed.primary && !targets.contains(&explicit.as_str()) {
                targets.push(explicit);
            }
        }

        let mut joins: Vec<ResolvedJoin> = Vec::new();
        for target in targets {
            let path = resolver.resolve(&parsed.primary, target)?;
            for step in path {
                let duplicate = joins.iter().any(|existing| {
                    existing.edge_index == step.edge_index
                        && existing.from_dataset == step.from_dataset
                });
                if !duplicate {
                    joins.push(step);
                }
            }
        }
        Ok(joins)
    }

    // ------------------------------------------------------------------
    // Stage: inject RLS
    // ------------------------------------------------------------------

    fn inject_rls(
        &self,
        parsed: &ParsedRequest,
        joins: &[ResolvedJoin],
        tenant: &TenantContext,
    ) -> CompileResult<Vec<Predicate>> {
        let mut predicates = Vec::new();
        for dataset_id in touched_datasets(&parsed.primary, joins) {
            let dataset = self
                .catalog
                .get_dataset(&dataset_id)
                .map_err(|_| JoinError::UnknownDataset(dataset_id.clone()))?;
            predicates.extend(inject_rls(dataset, tenant).map_err(CompileError::from)?);
        }
        Ok(predicates)
    }

    // ------------------------------------------------------------------
    // Stage: canonicalize
    // ------------------------------------------------------------------

    /// Deterministic ordering of every plan component. Cannot fail.
    fn canonicalize(
        &self,
        request: &QueryRequest,
        parsed: ParsedRequest,
        mut metrics: Vec<ResolvedMetric>,
        joins: Vec<ResolvedJoin>,
        security: Vec<Predicate>,
    ) -> ResolvedQueryPlan {
        let datasets = touched_datasets(&parsed.primary, &joins);

        let mut dimensions: Vec<DimensionProjection> = parsed
            .dimensions
            .iter()
            .filter_map(|bound| {
                let dataset = self.catalog.get_dataset(&bound.dataset).ok()?;
                let dim = dataset.dimension(&bound.name)?;
                Some(DimensionProjection {
                    dataset: bound.dataset.clone(),
                    name: dim.name.clone(),
                    expression: dim.expression.clone(),
                    semantic_type: dim.semantic_type,
                })
            })
            .collect();
        dimensions.sort_by(|a, b| (&a.dataset, &a.name).cmp(&(&b.dataset, &b.name)));
        dimensions.dedup();

        metrics.sort_by(|a, b| (&a.dataset, &a.name).cmp(&(&b.dataset, &b.name)));
        metrics.dedup_by(|a, b| a.dataset == b.dataset && a.name == b.name);

        // User predicates: stable sort by (field, operator). Mandatory
        // security predicates are appended afterwards, never interleaved.
        let mut predicates: Vec<Predicate> = parsed
            .filters
            .into_iter()
            .map(|(bound, op, value)| Predicate::Compare {
                dataset: bound.dataset,
                field: bound.name,
                op,
                value,
                origin: PredicateOrigin::User,
            })
            .collect();
        predicates.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        predicates.extend(security);

        ResolvedQueryPlan {
            datasets,
            joins,
            dimensions,
            metrics,
            predicates,
            sort: request.order_by.clone(),
            limit: request.limit,
            offset: request.offset,
        }
    }
}

/// Parsed request with every field reference bound to a dataset.
struct ParsedRequest {
    primary: String,
    dimensions: Vec<BoundField>,
    metrics: Vec<BoundField>,
    filters: Vec<(BoundField, crate::plan::FilterOp, crate::plan::FilterValue)>,
    explicit_joins: Vec<String>,
}

/// Primary dataset followed by join targets in path order, deduplicated.
fn touched_datasets(primary: &str, joins: &[ResolvedJoin]) -> Vec<String> {
    let mut datasets = vec![primary.to_string()];
    for join in joins {
        if !datasets.contains(&join.from_dataset) {
            datasets.push(join.from_dataset.clone());
        }
        if !datasets.contains(&join.to_dataset) {
            datasets.push(join.to_dataset.clone());
        }
    }
    datasets
}
