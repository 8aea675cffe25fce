//! # graphann API
//!
//! File-level API over the graph index.
//!
//! ```ignore
//! use graphann_api::{build_index, load_index};
//! use graphann_core::{ElementType, Metric};
//!
//! build_index(Metric::SquaredEuclidean, ElementType::Uint8, "base.u8bin", "index/", 64, 128, 8, 1.2, 0.02)?;
//! let index = load_index(Metric::SquaredEuclidean, ElementType::Uint8, "base.u8bin", "index/", 1_000_000, 128)?;
//! let (ids, distances) = index.batch_search_from_file("query.u8bin", 10_000, 10, 100)?;
//! let recall = index.check_recall("gt.bin", &ids, 10)?;
//! ```

pub mod index;

pub use index::{build_index, load_index, Index};

pub use graphann_core::{ElementType, Error, Metric, Result};
pub use graphann_index::BuildStats;
