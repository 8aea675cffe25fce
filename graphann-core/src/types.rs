//! # Core Types
//!
//! Fundamental data structures shared by the storage, index and API crates.
//!
//! ## Type Design Philosophy
//!
//! 1. **Zero-Copy**: Vectors are borrowed views ([`VectorRef`]) into a store
//! 2. **Type Safety**: Element type and metric are enums, parsed once at the edge
//! 3. **Validation**: Parameter structs validate their own invariants

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identifier of a vector: its 0-based offset in the store
pub type VectorId = u32;

/// Element type of every component in a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Float32,
    Uint8,
    Int8,
    Int16,
}

impl ElementType {
    /// Size of one component in bytes
    pub fn size(self) -> usize {
        match self {
            ElementType::Float32 => 4,
            ElementType::Uint8 | ElementType::Int8 => 1,
            ElementType::Int16 => 2,
        }
    }

    /// Canonical name, as written to index metadata
    pub fn name(self) -> &'static str {
        match self {
            ElementType::Float32 => "float32",
            ElementType::Uint8 => "uint8",
            ElementType::Int8 => "int8",
            ElementType::Int16 => "int16",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "float" | "float32" | "f32" => Ok(ElementType::Float32),
            "uint8" | "u8" => Ok(ElementType::Uint8),
            "int8" | "i8" => Ok(ElementType::Int8),
            "int16" | "i16" => Ok(ElementType::Int16),
            other => Err(Error::invalid_params(format!("unknown element type '{}'", other))),
        }
    }
}

/// Distance metric. Smaller is always closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Squared Euclidean distance
    SquaredEuclidean,
    /// Negative inner product (maximum inner product search)
    InnerProduct,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::SquaredEuclidean => "squared_euclidean",
            Metric::InnerProduct => "inner_product",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "euclidian" | "euclidean" | "l2" | "squared_euclidean" => Ok(Metric::SquaredEuclidean),
            "mips" | "innerproduct" | "inner_product" | "ip" => Ok(Metric::InnerProduct),
            other => Err(Error::invalid_params(format!("unknown metric '{}'", other))),
        }
    }
}

/// Borrowed view of one vector, typed by its element type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VectorRef<'a> {
    F32(&'a [f32]),
    U8(&'a [u8]),
    I8(&'a [i8]),
    I16(&'a [i16]),
}

impl<'a> VectorRef<'a> {
    /// Number of components
    #[inline]
    pub fn dim(&self) -> usize {
        match self {
            VectorRef::F32(v) => v.len(),
            VectorRef::U8(v) => v.len(),
            VectorRef::I8(v) => v.len(),
            VectorRef::I16(v) => v.len(),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            VectorRef::F32(_) => ElementType::Float32,
            VectorRef::U8(_) => ElementType::Uint8,
            VectorRef::I8(_) => ElementType::Int8,
            VectorRef::I16(_) => ElementType::Int16,
        }
    }

    /// Component `i` widened to f32
    #[inline]
    pub fn get_f32(&self, i: usize) -> f32 {
        match self {
            VectorRef::F32(v) => v[i],
            VectorRef::U8(v) => v[i] as f32,
            VectorRef::I8(v) => v[i] as f32,
            VectorRef::I16(v) => v[i] as f32,
        }
    }

    /// Widen every component to f32
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            VectorRef::F32(v) => v.to_vec(),
            VectorRef::U8(v) => v.iter().map(|&x| x as f32).collect(),
            VectorRef::I8(v) => v.iter().map(|&x| x as f32).collect(),
            VectorRef::I16(v) => v.iter().map(|&x| x as f32).collect(),
        }
    }
}

impl<'a> From<&'a [f32]> for VectorRef<'a> {
    fn from(v: &'a [f32]) -> Self {
        VectorRef::F32(v)
    }
}

impl<'a> From<&'a [u8]> for VectorRef<'a> {
    fn from(v: &'a [u8]) -> Self {
        VectorRef::U8(v)
    }
}

impl<'a> From<&'a [i8]> for VectorRef<'a> {
    fn from(v: &'a [i8]) -> Self {
        VectorRef::I8(v)
    }
}

impl<'a> From<&'a [i16]> for VectorRef<'a> {
    fn from(v: &'a [i16]) -> Self {
        VectorRef::I16(v)
    }
}

impl<'a> From<&'a Vec<f32>> for VectorRef<'a> {
    fn from(v: &'a Vec<f32>) -> Self {
        VectorRef::F32(v.as_slice())
    }
}

/// A (vector id, distance) pair
///
/// Ordered by distance, then by id, so that sorting is total and deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: VectorId,
    pub distance: f32,
}

impl Neighbor {
    #[inline]
    pub fn new(id: VectorId, distance: f32) -> Self {
        Self { id, distance }
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Result of one k-NN query: neighbors sorted ascending by (distance, id)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub neighbors: Vec<Neighbor>,
}

impl SearchResult {
    pub fn new(neighbors: Vec<Neighbor>) -> Self {
        Self { neighbors }
    }

    pub fn ids(&self) -> Vec<VectorId> {
        self.neighbors.iter().map(|n| n.id).collect()
    }

    pub fn distances(&self) -> Vec<f32> {
        self.neighbors.iter().map(|n| n.distance).collect()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Neighbor> {
        self.neighbors.iter()
    }
}

/// Graph construction parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BuildParams {
    /// Max out-degree per node (R)
    pub max_degree: usize,
    /// Candidate list size during build (L)
    pub l_build: usize,
    /// Pruning aggressiveness for the second pass
    pub alpha: f32,
    /// Worker threads
    pub num_threads: usize,
    /// Largest insertion batch, as a fraction of the dataset
    pub batch_fraction: f64,
    /// Seed for the insertion order shuffle
    pub seed: u64,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            max_degree: 64,
            l_build: 128,
            alpha: 1.2,
            num_threads: default_threads(),
            batch_fraction: 0.02,
            seed: 0x5eed,
        }
    }
}

impl BuildParams {
    pub fn new(max_degree: usize, l_build: usize, alpha: f32) -> Self {
        Self { max_degree, l_build, alpha, ..Default::default() }
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_batch_fraction(mut self, batch_fraction: f64) -> Self {
        self.batch_fraction = batch_fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check R, L, alpha, thread count and batch fraction
    pub fn validate(&self) -> Result<()> {
        if self.max_degree < 1 {
            return Err(Error::invalid_params("max degree R must be at least 1"));
        }
        if self.max_degree > u32::MAX as usize {
            return Err(Error::invalid_params("max degree R does not fit in u32"));
        }
        if self.l_build < self.max_degree {
            return Err(Error::invalid_params(format!(
                "L_build ({}) must be >= R ({})",
                self.l_build, self.max_degree
            )));
        }
        if !self.alpha.is_finite() || self.alpha < 1.0 {
            return Err(Error::invalid_params(format!("alpha must be >= 1.0, got {}", self.alpha)));
        }
        if self.num_threads == 0 {
            return Err(Error::invalid_params("num_threads must be at least 1"));
        }
        if !(self.batch_fraction > 0.0 && self.batch_fraction <= 1.0) {
            return Err(Error::invalid_params(format!(
                "batch fraction must be in (0, 1], got {}",
                self.batch_fraction
            )));
        }
        Ok(())
    }
}

/// Query-time parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    /// Number of neighbors to return
    pub k: usize,
    /// Candidate frontier size (L)
    pub l_search: usize,
    /// Stop after this many nodes have been expanded
    pub visit_limit: Option<usize>,
}

impl SearchParams {
    pub fn new(k: usize, l_search: usize) -> Self {
        Self { k, l_search, visit_limit: None }
    }

    pub fn with_visit_limit(mut self, limit: usize) -> Self {
        self.visit_limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.l_search < self.k {
            return Err(Error::invalid_params(format!(
                "L_search ({}) must be >= k ({})",
                self.l_search, self.k
            )));
        }
        if self.visit_limit == Some(0) {
            return Err(Error::invalid_params("visit limit must be at least 1"));
        }
        Ok(())
    }
}

/// Available hardware parallelism, at least 1
pub fn default_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
