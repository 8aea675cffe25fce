//! # Index Handle
//!
//! File-driven entry points: build an index from a vector file into a
//! directory, load it back and query it.

use std::path::Path;
use std::sync::Arc;

use graphann_core::error::{Error, Result};
use graphann_core::{BuildParams, ElementType, Metric, SearchParams, SearchResult, VectorRef};
use graphann_index::{recall_matrix, BuildStats, GraphIndex, GraphIndexBuilder, IndexMetadata};
use graphann_storage::{GroundTruth, VectorStore};

/// Build a graph over the vectors in `data_path` and save it to `output_dir`.
///
/// `prune_fraction` caps each insertion batch at that fraction of the dataset.
#[allow(clippy::too_many_arguments)]
pub fn build_index(
    metric: Metric,
    element_type: ElementType,
    data_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    max_degree: usize,
    l_build: usize,
    num_threads: usize,
    alpha: f32,
    prune_fraction: f64,
) -> Result<BuildStats> {
    let params = BuildParams::new(max_degree, l_build, alpha)
        .with_threads(num_threads)
        .with_batch_fraction(prune_fraction);
    // Reject bad parameters before touching the data file
    params.validate()?;

    let store = Arc::new(VectorStore::open_with_header(data_path.as_ref(), element_type)?);
    let (index, stats) = GraphIndexBuilder::new(metric, params).build_with_stats(store)?;
    index.save(output_dir.as_ref())?;
    Ok(stats)
}

/// Load the index in `index_dir` over the `count × dim` vectors in `data_path`
pub fn load_index(
    metric: Metric,
    element_type: ElementType,
    data_path: impl AsRef<Path>,
    index_dir: impl AsRef<Path>,
    count: usize,
    dim: usize,
) -> Result<Index> {
    let index_dir = index_dir.as_ref();
    let metadata = IndexMetadata::read(index_dir)?;
    if metadata.metric != metric {
        return Err(Error::corrupt(format!(
            "index was built with metric {}, requested {}",
            metadata.metric, metric
        )));
    }

    let store = Arc::new(VectorStore::open(data_path.as_ref(), element_type, count, dim)?);
    if let Err(e) = store.advise_random() {
        tracing::warn!(error = %e, "madvise(RANDOM) failed on vector store");
    }
    let graph = GraphIndex::load(index_dir, store, count, dim)?;
    Ok(Index::from_graph(graph))
}

/// A loaded index and the vectors it points into.
///
/// Batch searches run on rayon's global pool unless [`Index::with_threads`]
/// gives the index a pool of its own.
pub struct Index {
    graph: GraphIndex,
    pool: Option<rayon::ThreadPool>,
}

impl Index {
    /// Wrap an index built in memory
    pub fn from_graph(graph: GraphIndex) -> Self {
        Self { graph, pool: None }
    }

    /// Run batch searches on a dedicated pool of `num_threads` workers
    pub fn with_threads(mut self, num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(Error::invalid_params("num_threads must be at least 1"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("graphann-search-{}", i))
            .build()
            .map_err(|e| Error::Internal { message: format!("thread pool: {}", e) })?;
        self.pool = Some(pool);
        Ok(self)
    }

    /// Number of workers batch searches run on
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Run `op` on this index's pool, or inline when it has none
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Top-k of one query
    pub fn search(&self, query: VectorRef<'_>, k: usize, l_search: usize) -> Result<SearchResult> {
        self.graph.search(query, &SearchParams::new(k, l_search))
    }

    /// Top-k of every row of `queries`, in input order
    pub fn batch_search(&self, queries: &VectorStore, k: usize, l_search: usize) -> Result<Vec<SearchResult>> {
        let params = SearchParams::new(k, l_search);
        self.install(|| self.graph.batch_search(queries, &params))
    }

    /// Search every query in `query_path`, which must hold exactly
    /// `num_queries` vectors of this index's element type.
    ///
    /// Returns row-major `num_queries × k` id and distance matrices.
    pub fn batch_search_from_file(
        &self,
        query_path: impl AsRef<Path>,
        num_queries: usize,
        k: usize,
        l_search: usize,
    ) -> Result<(Vec<u32>, Vec<f32>)> {
        let queries = VectorStore::open_with_header(query_path.as_ref(), self.element_type())?;
        if queries.len() != num_queries {
            return Err(Error::ShapeMismatch {
                what: "query count".into(),
                expected: num_queries,
                actual: queries.len(),
            });
        }
        let params = SearchParams::new(k, l_search);
        self.install(|| self.graph.batch_search_matrix(&queries, &params))
    }

    /// Recall@k of a row-major `neighbor_ids` matrix against a ground truth file.
    ///
    /// The row width is taken from the ground truth's query count, so ids
    /// searched at any width `>= k` can be checked at `k`.
    pub fn check_recall(&self, ground_truth_path: impl AsRef<Path>, neighbor_ids: &[u32], k: usize) -> Result<f64> {
        let gt = GroundTruth::read(ground_truth_path)?;
        let queries = gt.num_queries();
        if queries == 0 || neighbor_ids.len() % queries != 0 {
            return Err(Error::ShapeMismatch {
                what: "neighbor id matrix length".into(),
                expected: queries * k,
                actual: neighbor_ids.len(),
            });
        }
        let row_len = neighbor_ids.len() / queries;
        let recall = recall_matrix(neighbor_ids, row_len, &gt, k)?;
        tracing::info!(k, row_len, queries, recall, "Recall check");
        Ok(recall)
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.graph.dimension()
    }

    pub fn metric(&self) -> Metric {
        self.graph.metric()
    }

    pub fn element_type(&self) -> ElementType {
        self.graph.store().element_type()
    }

    /// Underlying graph for advanced operations
    pub fn graph(&self) -> &GraphIndex {
        &self.graph
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("len", &self.len())
            .field("dimension", &self.dimension())
            .field("metric", &self.metric())
            .field("element_type", &self.element_type())
            .field("num_threads", &self.num_threads())
            .finish()
    }
}
