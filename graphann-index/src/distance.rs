//! # Distance Kernel
//!
//! Metric evaluation between two typed vectors. Smaller is always closer:
//! squared Euclidean for L2, negated dot product for inner product.
//!
//! Same-type integer pairs go through the exact `i64` kernels in
//! [`simd`](crate::simd); mixed pairs (e.g. an f32 query against a u8 base)
//! widen every component to f32.

use graphann_core::error::{Error, Result};
use graphann_core::{Metric, VectorRef};

use crate::simd;

/// Distance between `a` and `b`, checking dimensions first
#[inline]
pub fn distance(a: VectorRef<'_>, b: VectorRef<'_>, metric: Metric) -> Result<f32> {
    if a.dim() != b.dim() {
        return Err(Error::DimensionMismatch { expected: a.dim(), actual: b.dim() });
    }
    Ok(distance_unchecked(a, b, metric))
}

/// Distance between two vectors already known to share a dimension
#[inline]
pub fn distance_unchecked(a: VectorRef<'_>, b: VectorRef<'_>, metric: Metric) -> f32 {
    debug_assert_eq!(a.dim(), b.dim());
    match metric {
        Metric::SquaredEuclidean => match (a, b) {
            (VectorRef::F32(x), VectorRef::F32(y)) => simd::l2_distance_squared(x, y),
            (VectorRef::U8(x), VectorRef::U8(y)) => simd::l2_squared_u8(x, y) as f32,
            (VectorRef::I8(x), VectorRef::I8(y)) => simd::l2_squared_i8(x, y) as f32,
            (VectorRef::I16(x), VectorRef::I16(y)) => simd::l2_squared_i16(x, y) as f32,
            (x, y) => mixed_l2(x, y),
        },
        Metric::InnerProduct => match (a, b) {
            (VectorRef::F32(x), VectorRef::F32(y)) => -simd::dot_product(x, y),
            (VectorRef::U8(x), VectorRef::U8(y)) => -(simd::dot_product_u8(x, y) as f32),
            (VectorRef::I8(x), VectorRef::I8(y)) => -(simd::dot_product_i8(x, y) as f32),
            (VectorRef::I16(x), VectorRef::I16(y)) => -(simd::dot_product_i16(x, y) as f32),
            (x, y) => -mixed_dot(x, y),
        },
    }
}

fn mixed_l2(a: VectorRef<'_>, b: VectorRef<'_>) -> f32 {
    (0..a.dim())
        .map(|i| {
            let d = a.get_f32(i) - b.get_f32(i);
            d * d
        })
        .sum()
}

fn mixed_dot(a: VectorRef<'_>, b: VectorRef<'_>) -> f32 {
    (0..a.dim()).map(|i| a.get_f32(i) * b.get_f32(i)).sum()
}

/// A metric bound to the kernel dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistanceKernel {
    metric: Metric,
}

impl DistanceKernel {
    pub fn new(metric: Metric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Checked distance
    #[inline]
    pub fn distance(&self, a: VectorRef<'_>, b: VectorRef<'_>) -> Result<f32> {
        distance(a, b, self.metric)
    }

    #[inline]
    pub fn distance_unchecked(&self, a: VectorRef<'_>, b: VectorRef<'_>) -> f32 {
        distance_unchecked(a, b, self.metric)
    }
}

/// Component-wise mean of a set of vectors, used to pick the entry point
pub fn centroid<'a>(dim: usize, vectors: impl Iterator<Item = VectorRef<'a>>) -> Vec<f32> {
    let mut sum = vec![0.0f64; dim];
    let mut n = 0usize;
    for v in vectors {
        for (i, s) in sum.iter_mut().enumerate() {
            *s += v.get_f32(i) as f64;
        }
        n += 1;
    }
    let n = n.max(1) as f64;
    sum.into_iter().map(|s| (s / n) as f32).collect()
}
