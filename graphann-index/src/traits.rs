//! # Graph Traits
//!
//! Common interface over the mutable build-time graph and the frozen index,
//! so the same beam search serves both.

use graphann_core::VectorId;

/// Anything that can list a node's out-neighbors
pub trait NeighborSource: Sync {
    /// Number of nodes
    fn num_nodes(&self) -> usize;

    /// Replace `out` with the out-neighbors of `id`
    fn copy_neighbors(&self, id: VectorId, out: &mut Vec<VectorId>);
}
