//! Shortest-path resolution over the declared join graph.
//!
//! Breadth-first search guarantees the shortest path by edge count. When
//! multiple shortest paths tie, neighbors are visited in edge declaration
//! order, so the earliest-declared edges win: stable and reproducible
//! across reloads of the same catalog text. Parallel edges between the same
//! dataset pair with conflicting keys are surfaced as ambiguity, never
//! silently picked from.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

use crate::catalog::Catalog;
use crate::plan::ResolvedJoin;

/// Errors raised during join-path resolution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JoinError {
    #[error("dataset not found: '{0}'")]
    UnknownDataset(String),

    #[error("no join path from '{from}' to '{to}' within {max_depth} hops")]
    PathNotFound {
        from: String,
        to: String,
        max_depth: usize,
    },

    #[error(
        "ambiguous join declarations between '{left}' and '{right}': \
         candidate keys {}; disambiguate the catalog",
        .candidates.join(", ")
    )]
    AmbiguousPath {
        left: String,
        right: String,
        candidates: Vec<String>,
    },
}

pub type JoinResult<T> = Result<T, JoinError>;

/// Finds join paths against a catalog snapshot.
pub struct JoinPathResolver<'a> {
    catalog: &'a Catalog,
    max_depth: usize,
}

impl<'a> JoinPathResolver<'a> {
    pub fn new(catalog: &'a Catalog, max_depth: usize) -> Self {
        Self { catalog, max_depth }
    }

    /// Find the shortest declared join path from `from` to `to`.
    ///
    /// Returns an ordered list of directional join steps; empty when the
    /// endpoints are the same dataset.
    pub fn resolve(&self, from: &str, to: &str) -> JoinResult<Vec<ResolvedJoin>> {
        if !self.catalog.has_dataset(from) {
            return Err(JoinError::UnknownDataset(from.to_string()));
        }
        if !self.catalog.has_dataset(to) {
            return Err(JoinError::UnknownDataset(to.to_string()));
        }
        if from == to {
            return Ok(Vec::new());
        }

        // BFS, neighbors in declaration order.
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut distance: HashMap<&str, usize> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut parent: HashMap<String, (String, usize)> = HashMap::new();

        queue.push_back(from);
        visited.insert(from);
        distance.insert(from, 0);

        while let Some(current) = queue.pop_front() {
            let depth = distance[current];
            if depth >= self.max_depth {
                // Short-circuit: anything reachable from here exceeds the
                // hop budget.
                continue;
            }

            for (edge_index, neighbor) in self.catalog.adjacent(current) {
                if visited.contains(neighbor) {
                    continue;
                }
                visited.insert(neighbor);
                distance.insert(neighbor, depth + 1);
                parent.insert(neighbor.to_string(), (current.to_string(), edge_index));

                if neighbor == to {
                    return self.reconstruct(from, to, &parent);
                }
                queue.push_back(neighbor);
            }
        }

        Err(JoinError::PathNotFound {
            from: from.to_string(),
            to: to.to_string(),
            max_depth: self.max_depth,
        })
    }

    /// Walk the BFS parent map backwards and build directional steps.
    fn reconstruct(
        &self,
        from: &str,
        to: &str,
        parent: &HashMap<String, (String, usize)>,
    ) -> JoinResult<Vec<ResolvedJoin>> {
        let mut hops: Vec<(String, String, usize)> = Vec::new();
        let mut current = to.to_string();

        while current != from {
            let (prev, edge_index) = parent
                .get(&current)
                .cloned()
                .ok_or_else(|| JoinError::PathNotFound {
                    from: from.to_string(),
                    to: to.to_string(),
                    max_depth: self.max_depth,
                })?;
            hops.push((prev.clone(), current, edge_index));
            current = prev;
        }
        hops.reverse();

        let mut steps = Vec::with_capacity(hops.len());
        for (step_from, step_to, edge_index) in hops {
            self.check_ambiguity(&step_from, &step_to)?;

            let edge = self.catalog.join_edge(edge_index).ok_or_else(|| {
                JoinError::PathNotFound {
                    from: from.to_string(),
                    to: to.to_string(),
                    max_depth: self.max_depth,
                }
            })?;

            let (from_key, to_key) = edge
                .keys_from(&step_from)
                .map(|(f, t)| (f.to_string(), t.to_string()))
                .ok_or_else(|| JoinError::PathNotFound {
                    from: from.to_string(),
                    to: to.to_string(),
                    max_depth: self.max_depth,
                })?;

            // Annotations come from the declaration, adjusted for the
            // traversal direction, never inferred.
            let declared_forward = edge.left_dataset == step_from;
            let join_type = if declared_forward {
                edge.join_type
            } else {
                edge.join_type.reverse()
            };
            let cardinality = if declared_forward {
                edge.cardinality
            } else {
                edge.cardinality.reverse()
            };

            steps.push(ResolvedJoin {
                from_dataset: step_from,
                from_key,
                to_dataset: step_to,
                to_key,
                join_type,
                cardinality,
                edge_index,
            });
        }

        Ok(steps)
    }

    /// Fail if the pair is connected by conflicting parallel declarations.
    fn check_ambiguity(&self, left: &str, right: &str) -> JoinResult<()> {
        let candidates = self.catalog.edges_between(left, right);
        if candidates.len() < 2 {
            return Ok(());
        }

        let mut key_pairs: HashSet<(String, String)> = HashSet::new();
        for (_, edge) in &candidates {
            if let Some((from_key, to_key)) = edge.keys_from(left) {
                key_pairs.insert((from_key.to_string(), to_key.to_string()));
            }
        }

        if key_pairs.len() > 1 {
            let mut described: Vec<String> = candidates
                .iter()
                .filter_map(|(_, edge)| {
                    edge.keys_from(left)
                        .map(|(f, t)| format!("{}.{} = {}.{}", left, f, right, t))
                })
                .collect();
            described.dedup();
            return Err(JoinError::AmbiguousPath {
                left: left.to_string(),
                right: right.to_string(),
                candidates: described,
            });
        }

        Ok(())
    }
}
