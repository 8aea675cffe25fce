//! # Flat Index (Brute-Force Exact Search)
//!
//! The index that scans everything. Used for:
//! 1. Ground truth files (100% recall)
//! 2. The test oracle for graph search accuracy
//!
//! Search is O(n) distance calculations with the top-k kept in a max-heap.
//! Results use the same (distance, id) ordering as the graph search.

use std::collections::BinaryHeap;
use std::sync::Arc;

use rayon::prelude::*;

use graphann_core::error::{Error, Result};
use graphann_core::{Metric, Neighbor, SearchResult, VectorId, VectorRef};
use graphann_storage::{GroundTruth, VectorStore};

use crate::distance::DistanceKernel;

/// Exact nearest neighbor search over a [`VectorStore`]
pub struct FlatIndex {
    store: Arc<VectorStore>,
    kernel: DistanceKernel,
}

impl FlatIndex {
    pub fn new(store: Arc<VectorStore>, metric: Metric) -> Self {
        Self { store, kernel: DistanceKernel::new(metric) }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn metric(&self) -> Metric {
        self.kernel.metric()
    }

    /// Exact top-k of `query`
    pub fn search(&self, query: VectorRef<'_>, k: usize) -> Result<SearchResult> {
        if query.dim() != self.store.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.store.dimension(),
                actual: query.dim(),
            });
        }
        if k == 0 {
            return Ok(SearchResult::default());
        }

        // Max-heap: the root is the worst of the current top-k
        let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
        for (id, v) in self.store.iter() {
            let candidate = Neighbor::new(id, self.kernel.distance_unchecked(query, v));
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }
        Ok(SearchResult::new(heap.into_sorted_vec()))
    }

    /// Exact top-k for every row of `queries` on `num_threads` workers.
    ///
    /// `k` may not exceed the number of base vectors.
    pub fn compute_ground_truth(&self, queries: &VectorStore, k: usize, num_threads: usize) -> Result<GroundTruth> {
        if k == 0 || k > self.len() {
            return Err(Error::invalid_params(format!(
                "ground truth k must be in 1..={}, got {}",
                self.len(),
                k
            )));
        }
        if num_threads == 0 {
            return Err(Error::invalid_params("num_threads must be at least 1"));
        }
        if !queries.is_empty() && queries.dimension() != self.store.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.store.dimension(),
                actual: queries.dimension(),
            });
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("graphann-flat-{}", i))
            .build()
            .map_err(|e| Error::Internal { message: format!("thread pool: {}", e) })?;

        let started = std::time::Instant::now();
        let rows = pool.install(|| {
            (0..queries.len())
                .into_par_iter()
                .map(|q| self.search(queries.row(q), k))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut ids: Vec<VectorId> = Vec::with_capacity(rows.len() * k);
        let mut distances = Vec::with_capacity(rows.len() * k);
        for row in &rows {
            ids.extend(row.iter().map(|n| n.id));
            distances.extend(row.iter().map(|n| n.distance));
        }

        tracing::info!(
            queries = rows.len(),
            base = self.len(),
            k,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Computed exact ground truth"
        );
        GroundTruth::new(rows.len(), k, ids, distances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Arc<VectorStore> {
        // 0,0 1,0 2,0 ... 9,0
        let data = (0..10).flat_map(|i| [i as f32, 0.0]).collect();
        Arc::new(VectorStore::from_f32(data, 2).unwrap())
    }

    #[test]
    fn test_exact_top_k() {
        let flat = FlatIndex::new(grid(), Metric::SquaredEuclidean);
        let q = [4.4f32, 0.0];
        let res = flat.search(VectorRef::from(&q[..]), 3).unwrap();
        assert_eq!(res.ids(), vec![4, 5, 3]);
        assert!(res.distances().windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_ties_break_by_id() {
        let flat = FlatIndex::new(grid(), Metric::SquaredEuclidean);
        let q = [4.5f32, 0.0];
        let res = flat.search(VectorRef::from(&q[..]), 2).unwrap();
        assert_eq!(res.ids(), vec![4, 5]);
    }

    #[test]
    fn test_inner_product() {
        let flat = FlatIndex::new(grid(), Metric::InnerProduct);
        let q = [1.0f32, 0.0];
        let res = flat.search(VectorRef::from(&q[..]), 1).unwrap();
        assert_eq!(res.ids(), vec![9]);
        assert_eq!(res.distances(), vec![-9.0]);
    }

    #[test]
    fn test_ground_truth_rows() {
        let flat = FlatIndex::new(grid(), Metric::SquaredEuclidean);
        let queries = VectorStore::from_f32(vec![0.0, 0.0, 9.0, 0.0], 2).unwrap();
        let gt = flat.compute_ground_truth(&queries, 2, 2).unwrap();
        assert_eq!(gt.num_queries(), 2);
        assert_eq!(gt.ids(0), &[0, 1]);
        assert_eq!(gt.ids(1), &[9, 8]);
        assert_eq!(gt.distances(1), &[0.0, 1.0]);

        assert!(flat.compute_ground_truth(&queries, 11, 2).is_err());
        let wrong = VectorStore::from_f32(vec![0.0; 3], 3).unwrap();
        assert!(matches!(
            flat.compute_ground_truth(&wrong, 1, 1).unwrap_err(),
            Error::DimensionMismatch { .. }
        ));
    }
}
