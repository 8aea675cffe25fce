//! # Graph Structures
//!
//! Two representations of the same proximity graph:
//!
//! ```text
//! ┌──────────────────────────────┐  freeze   ┌──────────────────────────────┐
//! │ BuildGraph                   │ ────────> │ GraphIndex                   │
//! │  Vec<RwLock<Vec<VectorId>>>  │           │  offsets: [0, 3, 5, 9, ...]  │
//! │  one lock per node           │           │  edges:   [.. flattened ..]  │
//! │  mutated by the builder      │           │  read-only, Send + Sync      │
//! └──────────────────────────────┘           └──────────────────────────────┘
//! ```
//!
//! A [`GraphIndex`] never exists in a state that breaks its invariants:
//! every neighbor id is in range, no node lists itself, no node exceeds the
//! max degree and there is at least one valid entry point.

use std::sync::Arc;

use parking_lot::RwLock;

use graphann_core::error::{Error, Result};
use graphann_core::{Metric, Metrics, VectorId};
use graphann_storage::VectorStore;

use crate::traits::NeighborSource;

/// Parameters the graph was built with, carried into the metadata file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildInfo {
    pub l_build: usize,
    pub alpha: f32,
    /// Seconds since the Unix epoch
    pub built_at: u64,
}

/// Build-time adjacency lists, each behind its own lock
pub(crate) struct BuildGraph {
    nodes: Vec<RwLock<Vec<VectorId>>>,
}

impl BuildGraph {
    pub(crate) fn new(num_nodes: usize, max_degree: usize) -> Self {
        let nodes = (0..num_nodes)
            .map(|_| RwLock::new(Vec::with_capacity(max_degree)))
            .collect();
        Self { nodes }
    }

    #[inline]
    pub(crate) fn node(&self, id: VectorId) -> &RwLock<Vec<VectorId>> {
        &self.nodes[id as usize]
    }

    pub(crate) fn into_adjacency(self) -> Vec<Vec<VectorId>> {
        self.nodes.into_iter().map(RwLock::into_inner).collect()
    }
}

impl NeighborSource for BuildGraph {
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    fn copy_neighbors(&self, id: VectorId, out: &mut Vec<VectorId>) {
        out.clear();
        out.extend_from_slice(&self.nodes[id as usize].read());
    }
}

/// Immutable proximity graph over a shared [`VectorStore`]
pub struct GraphIndex {
    store: Arc<VectorStore>,
    metric: Metric,
    max_degree: usize,
    /// `offsets[i]..offsets[i + 1]` indexes node `i`'s slice of `edges`
    offsets: Vec<usize>,
    edges: Vec<VectorId>,
    entry_points: Vec<VectorId>,
    build_info: BuildInfo,
    metrics: Metrics,
}

impl GraphIndex {
    /// Assemble an index from adjacency lists, checking every invariant.
    ///
    /// Violations are reported as `CorruptIndex`.
    pub fn from_adjacency(
        store: Arc<VectorStore>,
        metric: Metric,
        max_degree: usize,
        adjacency: Vec<Vec<VectorId>>,
        entry_points: Vec<VectorId>,
        build_info: BuildInfo,
    ) -> Result<Self> {
        let n = adjacency.len();
        if n != store.len() {
            return Err(Error::corrupt(format!(
                "graph has {} nodes but the vector store holds {}",
                n,
                store.len()
            )));
        }

        let total: usize = adjacency.iter().map(Vec::len).sum();
        let mut offsets = Vec::with_capacity(n + 1);
        let mut edges = Vec::with_capacity(total);
        offsets.push(0);
        for (id, list) in adjacency.into_iter().enumerate() {
            check_node(id, &list, n, max_degree)?;
            edges.extend_from_slice(&list);
            offsets.push(edges.len());
        }

        Self::from_csr(store, metric, max_degree, offsets, edges, entry_points, build_info)
    }

    /// Assemble from an already flattened layout. Node lists are assumed
    /// checked; entry points are checked here.
    pub(crate) fn from_csr(
        store: Arc<VectorStore>,
        metric: Metric,
        max_degree: usize,
        offsets: Vec<usize>,
        edges: Vec<VectorId>,
        entry_points: Vec<VectorId>,
        build_info: BuildInfo,
    ) -> Result<Self> {
        let n = offsets.len().saturating_sub(1);
        if entry_points.is_empty() && n > 0 {
            return Err(Error::corrupt("no entry points"));
        }
        if let Some(&bad) = entry_points.iter().find(|&&e| e as usize >= n) {
            return Err(Error::corrupt(format!("entry point {} out of range ({} nodes)", bad, n)));
        }

        Ok(Self {
            store,
            metric,
            max_degree,
            offsets,
            edges,
            entry_points,
            build_info,
            metrics: Metrics::new(),
        })
    }

    /// Out-neighbors of `id`
    #[inline]
    pub fn neighbors(&self, id: VectorId) -> Result<&[VectorId]> {
        let idx = id as usize;
        if idx >= self.len() {
            return Err(Error::OutOfRange { id: id as u64, count: self.len() });
        }
        Ok(&self.edges[self.offsets[idx]..self.offsets[idx + 1]])
    }

    #[inline]
    pub(crate) fn neighbors_unchecked(&self, idx: usize) -> &[VectorId] {
        &self.edges[self.offsets[idx]..self.offsets[idx + 1]]
    }

    pub fn entry_points(&self) -> &[VectorId] {
        &self.entry_points
    }

    /// Degree bound `R` the graph was built with
    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn build_info(&self) -> BuildInfo {
        self.build_info
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Number of nodes (equals the number of vectors)
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Search counters accumulated by this index
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Adjacency lists as owned vectors
    pub fn to_adjacency(&self) -> Vec<Vec<VectorId>> {
        (0..self.len()).map(|i| self.neighbors_unchecked(i).to_vec()).collect()
    }

    /// Degree distribution
    pub fn stats(&self) -> GraphStats {
        let n = self.len();
        let mut max = 0;
        let mut min = usize::MAX;
        let mut zero = 0;
        for i in 0..n {
            let d = self.offsets[i + 1] - self.offsets[i];
            max = max.max(d);
            min = min.min(d);
            if d == 0 {
                zero += 1;
            }
        }
        GraphStats {
            num_nodes: n,
            num_edges: self.edges.len(),
            avg_degree: if n == 0 { 0.0 } else { self.edges.len() as f64 / n as f64 },
            max_degree: max,
            min_degree: if n == 0 { 0 } else { min },
            zero_degree_nodes: zero,
            degree_bound: self.max_degree,
            entry_points: self.entry_points.len(),
        }
    }
}

impl NeighborSource for GraphIndex {
    fn num_nodes(&self) -> usize {
        self.len()
    }

    #[inline]
    fn copy_neighbors(&self, id: VectorId, out: &mut Vec<VectorId>) {
        out.clear();
        out.extend_from_slice(self.neighbors_unchecked(id as usize));
    }
}

impl std::fmt::Debug for GraphIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphIndex")
            .field("nodes", &self.len())
            .field("edges", &self.edges.len())
            .field("max_degree", &self.max_degree)
            .field("metric", &self.metric)
            .field("entry_points", &self.entry_points)
            .finish()
    }
}

/// Degree statistics of a graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStats {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub avg_degree: f64,
    /// Largest observed out-degree
    pub max_degree: usize,
    pub min_degree: usize,
    pub zero_degree_nodes: usize,
    /// Configured bound `R`
    pub degree_bound: usize,
    pub entry_points: usize,
}

/// Check one adjacency list: in range, no self-loop, within the degree bound
pub(crate) fn check_node(id: usize, list: &[VectorId], n: usize, max_degree: usize) -> Result<()> {
    if list.len() > max_degree {
        return Err(Error::corrupt(format!(
            "node {} has degree {} > max degree {}",
            id,
            list.len(),
            max_degree
        )));
    }
    for &nb in list {
        if nb as usize >= n {
            return Err(Error::corrupt(format!(
                "node {} lists neighbor {} out of range ({} nodes)",
                id, nb, n
            )));
        }
        if nb as usize == id {
            return Err(Error::corrupt(format!("node {} lists itself", id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(n: usize) -> Arc<VectorStore> {
        Arc::new(VectorStore::from_f32((0..n * 2).map(|i| i as f32).collect(), 2).unwrap())
    }

    fn info() -> BuildInfo {
        BuildInfo { l_build: 8, alpha: 1.2, built_at: 0 }
    }

    #[test]
    fn test_from_adjacency_and_stats() {
        let adj = vec![vec![1, 2], vec![0], vec![], vec![0, 1, 2]];
        let graph = GraphIndex::from_adjacency(store(4), Metric::SquaredEuclidean, 3, adj.clone(), vec![0], info()).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.neighbors(3).unwrap(), &[0, 1, 2]);
        assert!(graph.neighbors(4).is_err());
        assert_eq!(graph.to_adjacency(), adj);

        let stats = graph.stats();
        assert_eq!(stats.num_edges, 6);
        assert_eq!(stats.max_degree, 3);
        assert_eq!(stats.min_degree, 0);
        assert_eq!(stats.zero_degree_nodes, 1);
        assert!((stats.avg_degree - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_invariants_rejected() {
        let cases = vec![
            vec![vec![1], vec![5]],
            vec![vec![0], vec![]],
            vec![vec![1, 1, 1], vec![]],
        ];
        for adj in cases {
            let n = adj.len();
            let err = GraphIndex::from_adjacency(store(n), Metric::SquaredEuclidean, 2, adj, vec![0], info()).unwrap_err();
            assert_eq!(err.error_code(), "CORRUPT_INDEX");
        }

        let err = GraphIndex::from_adjacency(store(2), Metric::SquaredEuclidean, 2, vec![vec![1], vec![0]], vec![7], info())
            .unwrap_err();
        assert_eq!(err.error_code(), "CORRUPT_INDEX");
        let err = GraphIndex::from_adjacency(store(3), Metric::SquaredEuclidean, 2, vec![vec![1], vec![0]], vec![0], info())
            .unwrap_err();
        assert_eq!(err.error_code(), "CORRUPT_INDEX");
    }

    #[test]
    fn test_build_graph_locks() {
        let g = BuildGraph::new(3, 2);
        g.node(0).write().push(2);
        let mut out = vec![9, 9];
        g.copy_neighbors(0, &mut out);
        assert_eq!(out, vec![2]);
        assert_eq!(g.into_adjacency(), vec![vec![2], vec![], vec![]]);
    }
}
