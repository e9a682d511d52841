//! In-memory catalog snapshot and the atomically swapped handle.
//!
//! The catalog is read-only per request. A reload builds a complete new
//! [`Catalog`] and swaps it in behind [`CatalogHandle`]; requests already
//! holding the old `Arc` finish against the old snapshot, and no reader can
//! ever observe a half-updated graph.
//!
//! Join edges keep their declaration order as an edge index captured at
//! build time, so path resolution never depends on hash-map iteration order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use petgraph::graph::{Graph, NodeIndex};
use petgraph::Undirected;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::compute_hash;
use crate::model::{Dataset, JoinEdge, Metric};

/// Errors raised by catalog lookups.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("dataset not found: '{0}'")]
    DatasetNotFound(String),

    #[error("metric not found: '{metric}' on dataset '{dataset}'")]
    MetricNotFound { dataset: String, metric: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Parsed, validated catalog content handed over by the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSource {
    pub datasets: Vec<Dataset>,
    pub join_edges: Vec<JoinEdge>,
}

impl CatalogSource {
    pub fn new(datasets: Vec<Dataset>, join_edges: Vec<JoinEdge>) -> Self {
        Self {
            datasets,
            join_edges,
        }
    }
}

/// An immutable catalog snapshot.
///
/// Holds the dataset definitions plus a petgraph adjacency over the declared
/// join edges. Built once per (re)load, then shared via `Arc`.
#[derive(Debug)]
pub struct Catalog {
    datasets: HashMap<String, Dataset>,
    edges: Vec<JoinEdge>,
    graph: Graph<String, usize, Undirected>,
    node_index: HashMap<String, NodeIndex>,
    content_hash: String,
}

impl Catalog {
    /// Build a snapshot from loader output.
    ///
    /// Edges referencing unknown datasets are kept out of the graph but
    /// retained in the edge list; resolvers re-detect dangling references
    /// defensively since upstream validation is not guaranteed bug-free.
    pub fn from_source(source: CatalogSource) -> Self {
        let content_hash = compute_hash(&source).unwrap_or_default();

        let mut graph = Graph::new_undirected();
        let mut node_index = HashMap::new();

        for dataset in &source.datasets {
            let idx = graph.add_node(dataset.id.clone());
            node_index.insert(dataset.id.clone(), idx);
        }

        for (decl_index, edge) in source.join_edges.iter().enumerate() {
            let (Some(&left), Some(&right)) = (
                node_index.get(&edge.left_dataset),
                node_index.get(&edge.right_dataset),
            ) else {
                continue;
            };
            graph.add_edge(left, right, decl_index);
        }

        let datasets = source
            .datasets
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        Self {
            datasets,
            edges: source.join_edges,
            graph,
            node_index,
            content_hash,
        }
    }

    /// Look up a dataset by id.
    pub fn get_dataset(&self, id: &str) -> CatalogResult<&Dataset> {
        self.datasets
            .get(id)
            .ok_or_else(|| CatalogError::DatasetNotFound(id.to_string()))
    }

    /// True if the dataset exists.
    pub fn has_dataset(&self, id: &str) -> bool {
        self.datasets.contains_key(id)
    }

    /// Look up a metric on a dataset.
    pub fn get_metric(&self, dataset: &str, name: &str) -> CatalogResult<&Metric> {
        let ds = self.get_dataset(dataset)?;
        ds.metric(name).ok_or_else(|| CatalogError::MetricNotFound {
            dataset: dataset.to_string(),
            metric: name.to_string(),
        })
    }

    /// All declared join edges, in declaration order.
    pub fn join_edges(&self) -> &[JoinEdge] {
        &self.edges
    }

    /// The join edge at a given declaration index.
    pub fn join_edge(&self, decl_index: usize) -> Option<&JoinEdge> {
        self.edges.get(decl_index)
    }

    /// Incident edges of a dataset as `(declaration index, neighbor id)`,
    /// sorted by declaration index.
    ///
    /// Returns an empty list for datasets without graph presence, so BFS
    /// simply finds no path rather than panicking on a dangling reference.
    pub fn adjacent(&self, dataset: &str) -> Vec<(usize, &str)> {
        use petgraph::visit::EdgeRef;

        let Some(&idx) = self.node_index.get(dataset) else {
            return Vec::new();
        };

        let mut incident: Vec<(usize, &str)> = self
            .graph
            .edges(idx)
            .map(|e| (*e.weight(), self.graph[e.target()].as_str()))
            .collect();
        incident.sort_by_key(|(decl, _)| *decl);
        incident
    }

    /// All declared edges between an unordered dataset pair.
    pub fn edges_between(&self, a: &str, b: &str) -> Vec<(usize, &JoinEdge)> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.connects(a, b))
            .collect()
    }

    /// Content hash of the loader output this snapshot was built from.
    ///
    /// Stable across reloads of identical catalog text; used for cache
    /// versioning and diagnostics.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Number of datasets in the snapshot.
    pub fn dataset_count(&self) -> usize {
        self.datasets.len()
    }
}

/// Atomically swapped handle to the current catalog snapshot.
///
/// Readers take a cheap `Arc` clone and never block each other; `reload`
/// replaces the pointer under a short write lock. Once `reload` returns, no
/// subsequent `snapshot` call observes the old catalog.
#[derive(Debug)]
pub struct CatalogHandle {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the snapshot wholesale.
    pub fn reload(&self, source: CatalogSource) {
        let next = Arc::new(Catalog::from_source(source));
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = next;
    }
}
