//! # graphann Core
//!
//! This crate provides the fundamental building blocks shared by every
//! graphann crate:
//! - Element types, metrics and vector views
//! - Build and search parameters
//! - Error types
//! - Configuration and metrics counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  graphann-core                  │
//! ├─────────────────────────────────────────────────┤
//! │  • types   - ElementType, Metric, VectorRef    │
//! │  • error   - Error taxonomy                    │
//! │  • config  - TOML configuration                │
//! │  • metrics - Atomic counters & timers          │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result, ResultExt};
pub use metrics::{Metrics, MetricsSnapshot, Timer};
pub use types::{
    BuildParams, ElementType, Metric, Neighbor, SearchParams, SearchResult, VectorId, VectorRef,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
