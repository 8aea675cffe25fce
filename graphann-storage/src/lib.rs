//! # graphann Storage
//!
//! On-disk datasets for the graph index.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Read Path                               │
//! │                                                              │
//! │  base.u8bin ──> mmap ──> alignment check ──> VectorRef      │
//! │                              │                               │
//! │                              ▼                               │
//! │                     misaligned: decode once                  │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Write Path                              │
//! │                                                              │
//! │  BinWriter ──> [count][dim][elements]                       │
//! │  GroundTruth ──> [n][k][ids][distances]                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod ground_truth;
pub mod vector_store;
pub mod writer;

pub use ground_truth::GroundTruth;
pub use vector_store::{read_header, VectorStore};
pub use writer::{write_bin, BinWriter};
