//! # Metrics and Monitoring
//!
//! Lock-free counters for build and search activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Metrics collector
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    // Build metrics
    builds: AtomicU64,
    vectors_indexed: AtomicU64,

    // Query metrics
    searches: AtomicU64,
    search_errors: AtomicU64,
    distance_computations: AtomicU64,
    nodes_visited: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished build over `vectors` points
    pub fn record_build(&self, vectors: u64) {
        self.inner.builds.fetch_add(1, Ordering::Relaxed);
        self.inner.vectors_indexed.fetch_add(vectors, Ordering::Relaxed);
    }

    /// Record one query and the work it did
    pub fn record_search(&self, distance_computations: u64, nodes_visited: u64) {
        self.inner.searches.fetch_add(1, Ordering::Relaxed);
        self.inner
            .distance_computations
            .fetch_add(distance_computations, Ordering::Relaxed);
        self.inner.nodes_visited.fetch_add(nodes_visited, Ordering::Relaxed);
    }

    pub fn record_search_error(&self) {
        self.inner.search_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            builds: self.inner.builds.load(Ordering::Relaxed),
            vectors_indexed: self.inner.vectors_indexed.load(Ordering::Relaxed),
            searches: self.inner.searches.load(Ordering::Relaxed),
            search_errors: self.inner.search_errors.load(Ordering::Relaxed),
            distance_computations: self.inner.distance_computations.load(Ordering::Relaxed),
            nodes_visited: self.inner.nodes_visited.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub builds: u64,
    pub vectors_indexed: u64,
    pub searches: u64,
    pub search_errors: u64,
    pub distance_computations: u64,
    pub nodes_visited: u64,
}

impl MetricsSnapshot {
    /// Mean distance computations per query
    pub fn mean_distance_computations(&self) -> f64 {
        if self.searches == 0 {
            0.0
        } else {
            self.distance_computations as f64 / self.searches as f64
        }
    }
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    /// Start new timer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer, log and return the duration
    pub fn stop(self) -> Duration {
        let duration = self.elapsed();
        tracing::debug!(
            name = %self.name,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
        duration
    }
}
