//! The engine facade: compile, cache, execute.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quarry::engine::Engine;
//! use quarry::catalog::CatalogSource;
//! use quarry::config::EngineConfig;
//! use quarry::model::TenantContext;
//! use quarry::request::QueryRequest;
//!
//! let engine = Engine::new(source, EngineConfig::default(), Arc::new(adapter));
//! let request = QueryRequest::new("orders")
//!     .with_dimension("customers.country")
//!     .with_metric("aov");
//! let response = engine.query(&request, &TenantContext::tenant("acme")).await?;
//! println!("{:?} rows, {}", response.result.rows.len(), response.event.cache_outcome.as_str());
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::adapter::{ExecutionAdapter, QueryResult};
use crate::cache::{fingerprint, CacheCoordinator, CacheStats, InvalidationScope};
use crate::catalog::{Catalog, CatalogHandle, CatalogSource};
use crate::compile::{CompileResult, QueryCompiler};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::events::{CacheOutcome, QueryEvent};
use crate::model::TenantContext;
use crate::plan::ResolvedQueryPlan;
use crate::request::QueryRequest;

/// A completed query: the plan it ran under, the rows, and the
/// observability event.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub plan: Arc<ResolvedQueryPlan>,
    pub result: Arc<QueryResult>,
    pub event: QueryEvent,
}

/// Owns the catalog handle, compiler configuration, cache coordinator, and
/// execution adapter. One instance serves unlimited concurrent requests.
pub struct Engine {
    catalog: CatalogHandle,
    config: EngineConfig,
    cache: CacheCoordinator,
    adapter: Arc<dyn ExecutionAdapter>,
}

impl Engine {
    pub fn new(
        source: CatalogSource,
        config: EngineConfig,
        adapter: Arc<dyn ExecutionAdapter>,
    ) -> Self {
        let cache = CacheCoordinator::new(&config.cache);
        Self {
            catalog: CatalogHandle::new(Catalog::from_source(source)),
            config,
            cache,
            adapter,
        }
    }

    /// Compile a request without executing it.
    ///
    /// Runs against the current catalog snapshot; a concurrent reload does
    /// not affect a compilation already in progress.
    pub fn compile(
        &self,
        request: &QueryRequest,
        tenant: &TenantContext,
    ) -> CompileResult<ResolvedQueryPlan> {
        let snapshot = self.catalog.snapshot();
        QueryCompiler::new(&snapshot, &self.config).compile(request, tenant)
    }

    /// Compile, consult the cache, execute on miss.
    pub async fn query(
        &self,
        request: &QueryRequest,
        tenant: &TenantContext,
    ) -> EngineResult<QueryResponse> {
        self.query_with_deadline(request, tenant, None).await
    }

    /// [`Engine::query`] with a hard deadline that propagates into the
    /// single-flight wait and the adapter call.
    pub async fn query_with_deadline(
        &self,
        request: &QueryRequest,
        tenant: &TenantContext,
        deadline: Option<Instant>,
    ) -> EngineResult<QueryResponse> {
        let started = Instant::now();
        let plan = Arc::new(self.compile(request, tenant)?);

        let (result, cache_outcome) = match fingerprint(&plan, tenant) {
            Ok(key) => {
                self.cache
                    .get_or_execute(key, plan.clone(), self.adapter.clone(), deadline)
                    .await?
            }
            Err(err) => {
                // Cache-subsystem failure: fail open and execute directly.
                // Row-level security is already baked into the plan, so
                // bypassing the cache never bypasses isolation.
                warn!(error = %err, "fingerprinting failed; bypassing cache");
                let result =
                    crate::cache::execute_with_deadline(self.adapter.as_ref(), &plan, deadline)
                        .await?;
                (Arc::new(result), CacheOutcome::Bypass)
            }
        };

        let event = QueryEvent {
            dataset: plan.primary_dataset().unwrap_or_default().to_string(),
            join_path_len: plan.joins.len(),
            cache_outcome,
            elapsed: started.elapsed(),
        };
        debug!(
            dataset = %event.dataset,
            join_path_len = event.join_path_len,
            cache_outcome = event.cache_outcome.as_str(),
            elapsed_ms = event.elapsed.as_millis() as u64,
            "query served"
        );

        Ok(QueryResponse {
            plan,
            result,
            event,
        })
    }

    /// Replace the catalog wholesale.
    ///
    /// Sequentially consistent: once this returns, no subsequent request
    /// observes the old catalog. In-flight requests finish on the snapshot
    /// they started with.
    pub fn reload_catalog(&self, source: CatalogSource) {
        self.catalog.reload(source);
    }

    /// Current catalog snapshot, for diagnostics.
    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.snapshot()
    }

    /// Write-through hook for the external change notifier: drop every
    /// cached entry whose plan touches the dataset.
    pub fn notify_data_changed(&self, dataset: &str) -> usize {
        self.cache
            .invalidate(InvalidationScope::Dataset(dataset.to_string()))
    }

    /// Explicit cache invalidation.
    pub fn invalidate(&self, scope: InvalidationScope) -> usize {
        self.cache.invalidate(scope)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
