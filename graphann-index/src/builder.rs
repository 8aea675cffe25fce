//! # Vamana Graph Construction
//!
//! Builds a navigable proximity graph over a [`VectorStore`].
//!
//! ## Algorithm Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Vamana Graph Structure                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │     ┌───┐         ┌───┐         ┌───┐                       │
//! │     │ A │─────────│ B │─────────│ C │                       │
//! │     └─┬─┘         └─┬─┘         └─┬─┘                       │
//! │       │    ╲        │        ╱    │                         │
//! │       │      ╲      │      ╱      │                         │
//! │     ┌─┴─┐      ╲  ┌─┴─┐  ╱      ┌─┴─┐                       │
//! │     │ D │────────│ E │────────│ F │  ← Entry Point          │
//! │     └───┘        └───┘        └───┘                         │
//! │                                                              │
//! │  Key Properties:                                             │
//! │  • Each node has at most R out-neighbors                     │
//! │  • Edges are "diverse" - not all pointing same direction     │
//! │  • Greedy search converges to nearest neighbor               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Build Process
//! 1. Entry point = vector nearest the centroid
//! 2. Two passes over a seeded shuffle of all ids: `alpha = 1.0`, then the
//!    configured `alpha`
//! 3. Within a pass, ids are inserted in batches whose size doubles from 1 up
//!    to `batch_fraction * n`; each batch runs in parallel
//! 4. Per id: beam search toward it, RobustPrune the expanded set plus its
//!    current neighbors, then add reciprocal edges (re-pruning any neighbor
//!    pushed past `R`)
//!
//! Each adjacency list has its own `RwLock` and no code path holds two of
//! them at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use graphann_core::error::{Error, Result};
use graphann_core::{BuildParams, Metric, Neighbor, VectorId, VectorRef};
use graphann_storage::VectorStore;

use crate::distance::{centroid, DistanceKernel};
use crate::graph::{BuildGraph, BuildInfo, GraphIndex, GraphStats};
use crate::search::beam_search;
use crate::traits::NeighborSource;

/// Statistics of one build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStats {
    pub num_vectors: usize,
    /// Wall time of each pass
    pub pass_times: Vec<Duration>,
    pub total_time: Duration,
    pub distance_computations: u64,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub zero_degree_nodes: usize,
    pub entry_point: VectorId,
}

/// Vamana graph builder
#[derive(Debug, Clone)]
pub struct GraphIndexBuilder {
    metric: Metric,
    params: BuildParams,
}

impl GraphIndexBuilder {
    pub fn new(metric: Metric, params: BuildParams) -> Self {
        Self { metric, params }
    }

    pub fn params(&self) -> &BuildParams {
        &self.params
    }

    /// Build a graph over every vector in `store`
    pub fn build(&self, store: Arc<VectorStore>) -> Result<GraphIndex> {
        self.build_with_stats(store).map(|(index, _)| index)
    }

    /// Build, also returning statistics
    pub fn build_with_stats(&self, store: Arc<VectorStore>) -> Result<(GraphIndex, BuildStats)> {
        self.params.validate()?;
        if store.is_empty() {
            return Err(Error::EmptyDataset);
        }
        if store.len() > VectorId::MAX as usize {
            return Err(Error::invalid_params(format!(
                "{} vectors exceed the u32 id space",
                store.len()
            )));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.params.num_threads)
            .thread_name(|i| format!("graphann-build-{}", i))
            .build()
            .map_err(|e| Error::Internal { message: format!("thread pool: {}", e) })?;

        tracing::info!(
            vectors = store.len(),
            dim = store.dimension(),
            element_type = %store.element_type(),
            metric = %self.metric,
            max_degree = self.params.max_degree,
            l_build = self.params.l_build,
            alpha = self.params.alpha,
            threads = self.params.num_threads,
            batch_fraction = self.params.batch_fraction,
            "Starting graph build"
        );

        let started = Instant::now();
        let (adjacency, entry, pass_times, distance_computations) =
            pool.install(|| self.run(&store));

        let built_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let info = BuildInfo {
            l_build: self.params.l_build,
            alpha: self.params.alpha,
            built_at,
        };
        let index = GraphIndex::from_adjacency(
            store,
            self.metric,
            self.params.max_degree,
            adjacency,
            vec![entry],
            info,
        )
        .map_err(|e| Error::Internal { message: format!("builder produced an invalid graph: {}", e) })?;

        let GraphStats { avg_degree, max_degree, zero_degree_nodes, .. } = index.stats();
        let stats = BuildStats {
            num_vectors: index.len(),
            pass_times,
            total_time: started.elapsed(),
            distance_computations,
            avg_degree,
            max_degree,
            zero_degree_nodes,
            entry_point: entry,
        };
        index.metrics().record_build(index.len() as u64);

        tracing::info!(
            total_ms = stats.total_time.as_millis() as u64,
            distance_computations = stats.distance_computations,
            avg_degree = stats.avg_degree,
            max_degree = stats.max_degree,
            zero_degree_nodes = stats.zero_degree_nodes,
            entry_point = entry,
            "Graph build finished"
        );
        Ok((index, stats))
    }

    /// Both passes. Runs inside the build pool.
    fn run(&self, store: &VectorStore) -> (Vec<Vec<VectorId>>, VectorId, Vec<Duration>, u64) {
        let n = store.len();
        let ctx = BuildContext {
            store,
            graph: BuildGraph::new(n, self.params.max_degree),
            kernel: DistanceKernel::new(self.metric),
            max_degree: self.params.max_degree,
            l_build: self.params.l_build,
            distance_computations: AtomicU64::new(0),
        };

        let entry = find_medoid(store);
        tracing::debug!(entry_point = entry, "Selected entry point");

        let max_batch = ((self.params.batch_fraction * n as f64) as usize).max(1);
        let mut pass_times = Vec::with_capacity(2);
        for (pass, alpha) in [1.0f32, self.params.alpha].into_iter().enumerate() {
            let timer = Instant::now();
            let mut order: Vec<VectorId> = (0..n as VectorId).collect();
            order.shuffle(&mut StdRng::seed_from_u64(self.params.seed.wrapping_add(pass as u64)));

            let mut start = 0;
            let mut batch = 1;
            while start < n {
                let end = (start + batch).min(n);
                order[start..end]
                    .par_iter()
                    .for_each(|&id| ctx.insert(id, entry, alpha));
                start = end;
                batch = (batch * 2).min(max_batch);
            }

            let elapsed = timer.elapsed();
            tracing::info!(
                pass = pass + 1,
                alpha,
                elapsed_ms = elapsed.as_millis() as u64,
                "Build pass finished"
            );
            pass_times.push(elapsed);
        }

        let distance_computations = ctx.distance_computations.load(Ordering::Relaxed);
        (ctx.graph.into_adjacency(), entry, pass_times, distance_computations)
    }
}

/// Build `store` into a graph with `params`
pub fn build(store: Arc<VectorStore>, metric: Metric, params: &BuildParams) -> Result<GraphIndex> {
    GraphIndexBuilder::new(metric, params.clone()).build(store)
}

/// Vector closest (squared L2) to the centroid
fn find_medoid(store: &VectorStore) -> VectorId {
    let center = centroid(store.dimension(), store.iter().map(|(_, v)| v));
    let center = VectorRef::F32(&center);
    (0..store.len())
        .into_par_iter()
        .map(|i| {
            let d = DistanceKernel::new(Metric::SquaredEuclidean).distance_unchecked(center, store.row(i));
            Neighbor::new(i as VectorId, d)
        })
        .min()
        .map(|n| n.id)
        .unwrap_or(0)
}

/// Shared state of one build
struct BuildContext<'a> {
    store: &'a VectorStore,
    graph: BuildGraph,
    kernel: DistanceKernel,
    max_degree: usize,
    l_build: usize,
    distance_computations: AtomicU64,
}

impl BuildContext<'_> {
    #[inline]
    fn dist(&self, a: VectorId, b: VectorId) -> f32 {
        self.kernel
            .distance_unchecked(self.store.row(a as usize), self.store.row(b as usize))
    }

    /// Insert (or re-insert) `id` into the graph
    fn insert(&self, id: VectorId, entry: VectorId, alpha: f32) {
        let query = self.store.row(id as usize);
        let traversal = beam_search(
            &self.graph,
            self.store,
            self.kernel,
            query,
            &[entry],
            self.l_build,
            None,
        );
        let mut computed = traversal.stats.distance_computations;

        let mut candidates = traversal.expanded;
        let mut current = Vec::new();
        self.graph.copy_neighbors(id, &mut current);
        for &nb in &current {
            candidates.push(Neighbor::new(nb, self.dist(id, nb)));
        }
        computed += current.len() as u64;

        let (new_out, pruned) = self.robust_prune(id, candidates, alpha);
        computed += pruned;
        let (new_out, committed) = self.commit_neighbors(id, &current, new_out, alpha);
        computed += committed;

        for &nb in &new_out {
            computed += self.add_reverse_edge(nb, id, alpha);
        }
        self.distance_computations.fetch_add(computed, Ordering::Relaxed);
    }

    /// Replace `id`'s list with `pruned`, keeping any edge another worker
    /// added since `snapshot` was read. Re-prunes under the lock if the merge
    /// overflows `R`. Returns the committed list and the distance
    /// computations spent.
    fn commit_neighbors(
        &self,
        id: VectorId,
        snapshot: &[VectorId],
        pruned: Vec<VectorId>,
        alpha: f32,
    ) -> (Vec<VectorId>, u64) {
        let mut list = self.graph.node(id).write();
        let mut merged = pruned;
        for &nb in list.iter() {
            if !snapshot.contains(&nb) && !merged.contains(&nb) {
                merged.push(nb);
            }
        }

        let mut spent = 0;
        if merged.len() > self.max_degree {
            let candidates: Vec<Neighbor> = merged
                .iter()
                .map(|&nb| Neighbor::new(nb, self.dist(id, nb)))
                .collect();
            spent += candidates.len() as u64;
            let (kept, prune_cost) = self.robust_prune(id, candidates, alpha);
            merged = kept;
            spent += prune_cost;
        }
        *list = merged.clone();
        (merged, spent)
    }

    /// Add `from -> to`, re-pruning `from` if it overflows. Holds only
    /// `from`'s lock. Returns the distance computations spent.
    fn add_reverse_edge(&self, from: VectorId, to: VectorId, alpha: f32) -> u64 {
        let mut list = self.graph.node(from).write();
        if list.contains(&to) {
            return 0;
        }
        if list.len() < self.max_degree {
            list.push(to);
            return 0;
        }

        let mut candidates: Vec<Neighbor> = list
            .iter()
            .map(|&nb| Neighbor::new(nb, self.dist(from, nb)))
            .collect();
        candidates.push(Neighbor::new(to, self.dist(from, to)));
        let spent = candidates.len() as u64;
        let (pruned, prune_cost) = self.robust_prune(from, candidates, alpha);
        *list = pruned;
        spent + prune_cost
    }

    /// RobustPrune: pick up to `R` diverse neighbors of `p` from `candidates`.
    ///
    /// Candidates are taken in (distance, id) order; each pick `p*` removes
    /// every remaining `c` with `alpha * d(p*, c) <= d(p, c)`.
    fn robust_prune(&self, p: VectorId, mut candidates: Vec<Neighbor>, alpha: f32) -> (Vec<VectorId>, u64) {
        candidates.retain(|c| c.id != p);
        candidates.sort_unstable();
        candidates.dedup_by_key(|c| c.id);

        let mut result = Vec::with_capacity(self.max_degree);
        let mut removed = vec![false; candidates.len()];
        let mut computed = 0u64;

        for i in 0..candidates.len() {
            if removed[i] {
                continue;
            }
            let best = candidates[i];
            result.push(best.id);
            if result.len() >= self.max_degree {
                break;
            }
            for j in (i + 1)..candidates.len() {
                if removed[j] {
                    continue;
                }
                let d = self.dist(best.id, candidates[j].id);
                computed += 1;
                if alpha * d <= candidates[j].distance {
                    removed[j] = true;
                }
            }
        }

        (result, computed)
    }
}
