//! # graphann Index
//!
//! Graph-based approximate nearest neighbor search.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Graph Index Layer                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │  Distance   │ →  │   Builder   │ →  │ GraphIndex  │      │
//! │  │ (SIMD, int) │    │ (Vamana)    │    │  (CSR)      │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │         │                                 │      │          │
//! │         ▼                                 ▼      ▼          │
//! │  ┌─────────────┐                  ┌──────────┐ ┌────────┐   │
//! │  │ Flat (exact)│ ── ground truth →│  Recall  │ │  Disk  │   │
//! │  └─────────────┘                  └──────────┘ └────────┘   │
//! │                                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `simd`: SIMD distance kernels (AVX2/FMA, NEON) with scalar fallbacks
//! - `distance`: metric dispatch over element types
//! - `traits`: `NeighborSource`, shared by build-time and frozen graphs
//! - `graph`: `GraphIndex` and its invariants
//! - `builder`: two-pass Vamana construction
//! - `search`: beam search, single and batch
//! - `persistence`: on-disk layout
//! - `recall`: recall@k
//! - `flat`: brute-force exact search

pub mod builder;
pub mod distance;
pub mod flat;
pub mod graph;
pub mod persistence;
pub mod recall;
pub mod search;
pub mod simd;
pub mod traits;

pub use builder::{build, BuildStats, GraphIndexBuilder};
pub use distance::{centroid, distance, DistanceKernel};
pub use flat::FlatIndex;
pub use graph::{BuildInfo, GraphIndex, GraphStats};
pub use persistence::{load, save, IndexMetadata};
pub use recall::{per_query_recall, recall_at_k, recall_matrix};
pub use search::{batch_search, flatten_results, search, QueryStats};
pub use traits::NeighborSource;
