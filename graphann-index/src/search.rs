//! # Beam Search
//!
//! Best-first traversal shared by graph construction and queries.
//!
//! ## Search Process
//! 1. Seed the frontier with every entry point
//! 2. Expand the closest unexpanded candidate: score its unvisited neighbors
//! 3. Merge them into the frontier, keeping the best `L` by (distance, id)
//! 4. Stop when every frontier candidate is expanded or the visit budget runs out
//! 5. Return the top-k of the frontier

use std::collections::HashSet;

use rayon::prelude::*;

use graphann_core::error::{Error, Result};
use graphann_core::{Neighbor, SearchParams, SearchResult, VectorId, VectorRef};
use graphann_storage::VectorStore;

use crate::distance::DistanceKernel;
use crate::graph::GraphIndex;
use crate::traits::NeighborSource;

/// Work done by one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub distance_computations: u64,
    /// Nodes expanded
    pub hops: u64,
}

/// Frontier entry
#[derive(Debug, Clone, Copy)]
struct Candidate {
    neighbor: Neighbor,
    expanded: bool,
}

/// Result of one traversal
pub(crate) struct Traversal {
    /// Best `L` candidates seen, sorted by (distance, id)
    pub frontier: Vec<Neighbor>,
    /// Every expanded node with its distance, in expansion order
    pub expanded: Vec<Neighbor>,
    pub stats: QueryStats,
}

/// Run a beam search of width `beam` from `entry_points` toward `query`
pub(crate) fn beam_search<G: NeighborSource + ?Sized>(
    graph: &G,
    store: &VectorStore,
    kernel: DistanceKernel,
    query: VectorRef<'_>,
    entry_points: &[VectorId],
    beam: usize,
    visit_limit: Option<usize>,
) -> Traversal {
    let beam = beam.max(1);
    let mut stats = QueryStats::default();
    let mut frontier: Vec<Candidate> = Vec::with_capacity(beam + 1);
    let mut visited: HashSet<VectorId> = HashSet::with_capacity(beam * 8);
    let mut expanded = Vec::new();
    let mut scratch = Vec::new();

    for &ep in entry_points {
        if visited.insert(ep) {
            let d = kernel.distance_unchecked(query, store.row(ep as usize));
            stats.distance_computations += 1;
            insert_candidate(&mut frontier, Neighbor::new(ep, d), beam);
        }
    }

    // Index of the first frontier slot that may be unexpanded
    let mut cursor = 0;
    let limit = visit_limit.unwrap_or(usize::MAX);

    loop {
        while cursor < frontier.len() && frontier[cursor].expanded {
            cursor += 1;
        }
        if cursor >= frontier.len() || expanded.len() >= limit {
            break;
        }

        let current = frontier[cursor].neighbor;
        frontier[cursor].expanded = true;
        expanded.push(current);
        stats.hops += 1;

        graph.copy_neighbors(current.id, &mut scratch);
        let mut lowest = usize::MAX;
        for &nb in &scratch {
            if !visited.insert(nb) {
                continue;
            }
            let d = kernel.distance_unchecked(query, store.row(nb as usize));
            stats.distance_computations += 1;
            if let Some(pos) = insert_candidate(&mut frontier, Neighbor::new(nb, d), beam) {
                lowest = lowest.min(pos);
            }
        }
        if lowest < cursor {
            cursor = lowest;
        }
    }

    Traversal {
        frontier: frontier.into_iter().map(|c| c.neighbor).collect(),
        expanded,
        stats,
    }
}

/// Insert into the sorted frontier if it makes the cut. Returns the slot.
#[inline]
fn insert_candidate(frontier: &mut Vec<Candidate>, neighbor: Neighbor, beam: usize) -> Option<usize> {
    if frontier.len() >= beam {
        if let Some(worst) = frontier.last() {
            if neighbor >= worst.neighbor {
                return None;
            }
        }
    }
    let pos = frontier.partition_point(|c| c.neighbor < neighbor);
    frontier.insert(pos, Candidate { neighbor, expanded: false });
    frontier.truncate(beam);
    Some(pos)
}

impl GraphIndex {
    fn check_query(&self, query: &VectorRef<'_>, params: &SearchParams) -> Result<()> {
        params.validate()?;
        if query.dim() != self.dimension() {
            return Err(Error::DimensionMismatch { expected: self.dimension(), actual: query.dim() });
        }
        Ok(())
    }

    /// Top-k search
    pub fn search(&self, query: VectorRef<'_>, params: &SearchParams) -> Result<SearchResult> {
        self.search_with_stats(query, params).map(|(result, _)| result)
    }

    /// Top-k search, also reporting the work done
    pub fn search_with_stats(
        &self,
        query: VectorRef<'_>,
        params: &SearchParams,
    ) -> Result<(SearchResult, QueryStats)> {
        if let Err(e) = self.check_query(&query, params) {
            self.metrics().record_search_error();
            return Err(e);
        }
        if self.is_empty() || params.k == 0 {
            return Ok((SearchResult::default(), QueryStats::default()));
        }

        let traversal = beam_search(
            self,
            self.store(),
            DistanceKernel::new(self.metric()),
            query,
            self.entry_points(),
            params.l_search,
            params.visit_limit,
        );
        self.metrics()
            .record_search(traversal.stats.distance_computations, traversal.stats.hops);

        let mut neighbors = traversal.frontier;
        neighbors.truncate(params.k);
        Ok((SearchResult::new(neighbors), traversal.stats))
    }

    /// Search every row of `queries` in parallel; output order matches input order
    pub fn batch_search(&self, queries: &VectorStore, params: &SearchParams) -> Result<Vec<SearchResult>> {
        if queries.dimension() != self.dimension() && !queries.is_empty() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                actual: queries.dimension(),
            });
        }
        params.validate()?;

        let start = std::time::Instant::now();
        let results = (0..queries.len())
            .into_par_iter()
            .map(|i| self.search(queries.row(i), params))
            .collect::<Result<Vec<_>>>()?;

        let elapsed = start.elapsed().as_secs_f64();
        tracing::info!(
            queries = queries.len(),
            k = params.k,
            l_search = params.l_search,
            elapsed_ms = (elapsed * 1000.0) as u64,
            qps = if elapsed > 0.0 { queries.len() as f64 / elapsed } else { 0.0 },
            "Batch search finished"
        );
        Ok(results)
    }

    /// Batch search flattened to row-major `num_queries × k` id and distance
    /// matrices. Rows with fewer than `k` hits are padded with `u32::MAX` and
    /// `f32::INFINITY`.
    pub fn batch_search_matrix(
        &self,
        queries: &VectorStore,
        params: &SearchParams,
    ) -> Result<(Vec<VectorId>, Vec<f32>)> {
        let results = self.batch_search(queries, params)?;
        Ok(flatten_results(&results, params.k))
    }
}

/// Row-major id and distance matrices from per-query results
pub fn flatten_results(results: &[SearchResult], k: usize) -> (Vec<VectorId>, Vec<f32>) {
    let mut ids = vec![VectorId::MAX; results.len() * k];
    let mut distances = vec![f32::INFINITY; results.len() * k];
    for (row, result) in results.iter().enumerate() {
        for (col, n) in result.iter().take(k).enumerate() {
            ids[row * k + col] = n.id;
            distances[row * k + col] = n.distance;
        }
    }
    (ids, distances)
}

/// Top-k search over `index` with beam width `l_search`
pub fn search(index: &GraphIndex, query: VectorRef<'_>, k: usize, l_search: usize) -> Result<SearchResult> {
    index.search(query, &SearchParams::new(k, l_search))
}

/// Parallel top-k search over every query row
pub fn batch_search(
    index: &GraphIndex,
    queries: &VectorStore,
    k: usize,
    l_search: usize,
) -> Result<Vec<SearchResult>> {
    index.batch_search(queries, &SearchParams::new(k, l_search))
}
