//! # SIMD-Accelerated Distance Functions
//!
//! Vector kernels using CPU intrinsics, dispatched at runtime.
//!
//! ## Supported Operations
//! - Squared L2 distance (f32, u8, i8, i16)
//! - Dot product (f32, u8, i8, i16)
//!
//! ## Implementation Strategy
//! 1. Detect CPU features at runtime
//! 2. Dispatch to fastest available: AVX2+FMA > AVX > SSE > Scalar (NEON on aarch64)
//! 3. Integer kernels return exact `i64` sums. The AVX2 integer paths keep
//!    `i32` lane accumulators, so they are only taken below
//!    [`MAX_SIMD_INT_DIM`].

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

/// Largest dimension whose 8-bit kernels can't overflow an `i32` total.
///
/// Every term is at most `255 * 255`, and `2^15 * 255^2 < i32::MAX`.
pub const MAX_SIMD_INT_DIM: usize = 1 << 15;

/// Compute dot product of two vectors using best available SIMD
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return unsafe { dot_product_avx2_fma(a, b) };
        }
        if is_x86_feature_detected!("avx") {
            return unsafe { dot_product_avx(a, b) };
        }
        if is_x86_feature_detected!("sse3") {
            return unsafe { dot_product_sse(a, b) };
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { dot_product_neon(a, b) };
    }

    #[allow(unreachable_code)]
    dot_product_scalar(a, b)
}

/// Compute L2 (Euclidean) distance squared
#[inline]
pub fn l2_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return unsafe { l2_squared_avx2_fma(a, b) };
        }
        if is_x86_feature_detected!("avx") {
            return unsafe { l2_squared_avx(a, b) };
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { l2_squared_neon(a, b) };
    }

    #[allow(unreachable_code)]
    l2_squared_scalar(a, b)
}

/// Exact squared L2 distance between u8 vectors
#[inline]
pub fn l2_squared_u8(a: &[u8], b: &[u8]) -> i64 {
    debug_assert_eq!(a.len(), b.len());

    #[cfg(target_arch = "x86_64")]
    {
        if a.len() <= MAX_SIMD_INT_DIM && is_x86_feature_detected!("avx2") {
            return unsafe { l2_squared_u8_avx2(a, b) } as i64;
        }
    }

    l2_squared_int_scalar(a, b)
}

/// Exact squared L2 distance between i8 vectors
#[inline]
pub fn l2_squared_i8(a: &[i8], b: &[i8]) -> i64 {
    debug_assert_eq!(a.len(), b.len());

    #[cfg(target_arch = "x86_64")]
    {
        if a.len() <= MAX_SIMD_INT_DIM && is_x86_feature_detected!("avx2") {
            return unsafe { l2_squared_i8_avx2(a, b) } as i64;
        }
    }

    l2_squared_int_scalar(a, b)
}

/// Exact squared L2 distance between i16 vectors
#[inline]
pub fn l2_squared_i16(a: &[i16], b: &[i16]) -> i64 {
    debug_assert_eq!(a.len(), b.len());
    l2_squared_int_scalar(a, b)
}

/// Exact dot product of u8 vectors
#[inline]
pub fn dot_product_u8(a: &[u8], b: &[u8]) -> i64 {
    debug_assert_eq!(a.len(), b.len());

    #[cfg(target_arch = "x86_64")]
    {
        if a.len() <= MAX_SIMD_INT_DIM && is_x86_feature_detected!("avx2") {
            return unsafe { dot_product_u8_avx2(a, b) } as i64;
        }
    }

    dot_product_int_scalar(a, b)
}

/// Exact dot product of i8 vectors
#[inline]
pub fn dot_product_i8(a: &[i8], b: &[i8]) -> i64 {
    debug_assert_eq!(a.len(), b.len());

    #[cfg(target_arch = "x86_64")]
    {
        if a.len() <= MAX_SIMD_INT_DIM && is_x86_feature_detected!("avx2") {
            return unsafe { dot_product_i8_avx2(a, b) } as i64;
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        if a.len() <= MAX_SIMD_INT_DIM {
            return unsafe { dot_product_i8_neon(a, b) } as i64;
        }
    }

    dot_product_int_scalar(a, b)
}

/// Exact dot product of i16 vectors
#[inline]
pub fn dot_product_i16(a: &[i16], b: &[i16]) -> i64 {
    debug_assert_eq!(a.len(), b.len());
    dot_product_int_scalar(a, b)
}

// ============================================================================
// Scalar implementations (fallback)
// ============================================================================

#[inline]
pub(crate) fn dot_product_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
pub(crate) fn l2_squared_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[inline]
pub(crate) fn l2_squared_int_scalar<T: Copy + Into<i64>>(a: &[T], b: &[T]) -> i64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x.into() - y.into();
            d * d
        })
        .sum()
}

#[inline]
pub(crate) fn dot_product_int_scalar<T: Copy + Into<i64>>(a: &[T], b: &[T]) -> i64 {
    a.iter().zip(b.iter()).map(|(&x, &y)| x.into() * y.into()).sum()
}

// ============================================================================
// AVX2 + FMA implementations (256-bit, 8 floats at a time)
// ============================================================================

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn dot_product_avx2_fma(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 8;
    let remainder = n % 8;

    let mut sum = _mm256_setzero_ps();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 8;
        let va = _mm256_loadu_ps(a_ptr.add(offset));
        let vb = _mm256_loadu_ps(b_ptr.add(offset));
        sum = _mm256_fmadd_ps(va, vb, sum);
    }

    let mut result = hsum256_ps(sum);

    let base = chunks * 8;
    for i in 0..remainder {
        result += a[base + i] * b[base + i];
    }

    result
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn l2_squared_avx2_fma(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 8;
    let remainder = n % 8;

    let mut sum = _mm256_setzero_ps();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 8;
        let va = _mm256_loadu_ps(a_ptr.add(offset));
        let vb = _mm256_loadu_ps(b_ptr.add(offset));
        let diff = _mm256_sub_ps(va, vb);
        sum = _mm256_fmadd_ps(diff, diff, sum);
    }

    let mut result = hsum256_ps(sum);

    let base = chunks * 8;
    for i in 0..remainder {
        let d = a[base + i] - b[base + i];
        result += d * d;
    }

    result
}

// ============================================================================
// AVX implementations (256-bit, no FMA)
// ============================================================================

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn dot_product_avx(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 8;
    let remainder = n % 8;

    let mut sum = _mm256_setzero_ps();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 8;
        let va = _mm256_loadu_ps(a_ptr.add(offset));
        let vb = _mm256_loadu_ps(b_ptr.add(offset));
        sum = _mm256_add_ps(sum, _mm256_mul_ps(va, vb));
    }

    let mut result = hsum256_ps(sum);

    let base = chunks * 8;
    for i in 0..remainder {
        result += a[base + i] * b[base + i];
    }

    result
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn l2_squared_avx(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 8;
    let remainder = n % 8;

    let mut sum = _mm256_setzero_ps();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 8;
        let va = _mm256_loadu_ps(a_ptr.add(offset));
        let vb = _mm256_loadu_ps(b_ptr.add(offset));
        let diff = _mm256_sub_ps(va, vb);
        sum = _mm256_add_ps(sum, _mm256_mul_ps(diff, diff));
    }

    let mut result = hsum256_ps(sum);

    let base = chunks * 8;
    for i in 0..remainder {
        let d = a[base + i] - b[base + i];
        result += d * d;
    }

    result
}

// ============================================================================
// SSE implementations (128-bit, 4 floats at a time)
// ============================================================================

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse3")]
unsafe fn dot_product_sse(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 4;
    let remainder = n % 4;

    let mut sum = _mm_setzero_ps();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        let va = _mm_loadu_ps(a_ptr.add(offset));
        let vb = _mm_loadu_ps(b_ptr.add(offset));
        sum = _mm_add_ps(sum, _mm_mul_ps(va, vb));
    }

    let mut result = hsum128_ps(sum);

    let base = chunks * 4;
    for i in 0..remainder {
        result += a[base + i] * b[base + i];
    }

    result
}

// ============================================================================
// AVX2 integer implementations (32 bytes at a time, widened to i16)
// ============================================================================

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn l2_squared_u8_avx2(a: &[u8], b: &[u8]) -> i32 {
    let n = a.len();
    let chunks = n / 32;
    let remainder = n % 32;

    let mut sum = _mm256_setzero_si256();

    let a_ptr = a.as_ptr() as *const __m256i;
    let b_ptr = b.as_ptr() as *const __m256i;

    for i in 0..chunks {
        let va = _mm256_loadu_si256(a_ptr.add(i));
        let vb = _mm256_loadu_si256(b_ptr.add(i));

        let va_lo = _mm256_cvtepu8_epi16(_mm256_castsi256_si128(va));
        let vb_lo = _mm256_cvtepu8_epi16(_mm256_castsi256_si128(vb));
        let va_hi = _mm256_cvtepu8_epi16(_mm256_extracti128_si256(va, 1));
        let vb_hi = _mm256_cvtepu8_epi16(_mm256_extracti128_si256(vb, 1));

        let d_lo = _mm256_sub_epi16(va_lo, vb_lo);
        let d_hi = _mm256_sub_epi16(va_hi, vb_hi);

        sum = _mm256_add_epi32(sum, _mm256_madd_epi16(d_lo, d_lo));
        sum = _mm256_add_epi32(sum, _mm256_madd_epi16(d_hi, d_hi));
    }

    let mut result = hsum256_epi32(sum);

    let base = chunks * 32;
    for i in 0..remainder {
        let d = a[base + i] as i32 - b[base + i] as i32;
        result += d * d;
    }

    result
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn l2_squared_i8_avx2(a: &[i8], b: &[i8]) -> i32 {
    let n = a.len();
    let chunks = n / 32;
    let remainder = n % 32;

    let mut sum = _mm256_setzero_si256();

    let a_ptr = a.as_ptr() as *const __m256i;
    let b_ptr = b.as_ptr() as *const __m256i;

    for i in 0..chunks {
        let va = _mm256_loadu_si256(a_ptr.add(i));
        let vb = _mm256_loadu_si256(b_ptr.add(i));

        let va_lo = _mm256_cvtepi8_epi16(_mm256_castsi256_si128(va));
        let vb_lo = _mm256_cvtepi8_epi16(_mm256_castsi256_si128(vb));
        let va_hi = _mm256_cvtepi8_epi16(_mm256_extracti128_si256(va, 1));
        let vb_hi = _mm256_cvtepi8_epi16(_mm256_extracti128_si256(vb, 1));

        let d_lo = _mm256_sub_epi16(va_lo, vb_lo);
        let d_hi = _mm256_sub_epi16(va_hi, vb_hi);

        sum = _mm256_add_epi32(sum, _mm256_madd_epi16(d_lo, d_lo));
        sum = _mm256_add_epi32(sum, _mm256_madd_epi16(d_hi, d_hi));
    }

    let mut result = hsum256_epi32(sum);

    let base = chunks * 32;
    for i in 0..remainder {
        let d = a[base + i] as i32 - b[base + i] as i32;
        result += d * d;
    }

    result
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn dot_product_u8_avx2(a: &[u8], b: &[u8]) -> i32 {
    let n = a.len();
    let chunks = n / 32;
    let remainder = n % 32;

    let mut sum = _mm256_setzero_si256();

    let a_ptr = a.as_ptr() as *const __m256i;
    let b_ptr = b.as_ptr() as *const __m256i;

    for i in 0..chunks {
        let va = _mm256_loadu_si256(a_ptr.add(i));
        let vb = _mm256_loadu_si256(b_ptr.add(i));

        let va_lo = _mm256_cvtepu8_epi16(_mm256_castsi256_si128(va));
        let vb_lo = _mm256_cvtepu8_epi16(_mm256_castsi256_si128(vb));
        let va_hi = _mm256_cvtepu8_epi16(_mm256_extracti128_si256(va, 1));
        let vb_hi = _mm256_cvtepu8_epi16(_mm256_extracti128_si256(vb, 1));

        sum = _mm256_add_epi32(sum, _mm256_madd_epi16(va_lo, vb_lo));
        sum = _mm256_add_epi32(sum, _mm256_madd_epi16(va_hi, vb_hi));
    }

    let mut result = hsum256_epi32(sum);

    let base = chunks * 32;
    for i in 0..remainder {
        result += a[base + i] as i32 * b[base + i] as i32;
    }

    result
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn dot_product_i8_avx2(a: &[i8], b: &[i8]) -> i32 {
    let n = a.len();
    let chunks = n / 32;
    let remainder = n % 32;

    let mut sum = _mm256_setzero_si256();

    let a_ptr = a.as_ptr() as *const __m256i;
    let b_ptr = b.as_ptr() as *const __m256i;

    for i in 0..chunks {
        let va = _mm256_loadu_si256(a_ptr.add(i));
        let vb = _mm256_loadu_si256(b_ptr.add(i));

        // maddubs wants unsigned*signed, so widen both sides to i16 instead
        let va_lo = _mm256_cvtepi8_epi16(_mm256_castsi256_si128(va));
        let vb_lo = _mm256_cvtepi8_epi16(_mm256_castsi256_si128(vb));
        let va_hi = _mm256_cvtepi8_epi16(_mm256_extracti128_si256(va, 1));
        let vb_hi = _mm256_cvtepi8_epi16(_mm256_extracti128_si256(vb, 1));

        sum = _mm256_add_epi32(sum, _mm256_madd_epi16(va_lo, vb_lo));
        sum = _mm256_add_epi32(sum, _mm256_madd_epi16(va_hi, vb_hi));
    }

    let mut result = hsum256_epi32(sum);

    let base = chunks * 32;
    for i in 0..remainder {
        result += a[base + i] as i32 * b[base + i] as i32;
    }

    result
}

// ============================================================================
// Helper functions for horizontal sums
// ============================================================================

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
#[inline]
unsafe fn hsum256_ps(v: __m256) -> f32 {
    let high = _mm256_extractf128_ps(v, 1);
    let low = _mm256_castps256_ps128(v);
    hsum128_ps(_mm_add_ps(high, low))
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse3")]
#[inline]
unsafe fn hsum128_ps(v: __m128) -> f32 {
    let shuf = _mm_movehdup_ps(v); // [1,1,3,3]
    let sums = _mm_add_ps(v, shuf);
    let shuf = _mm_movehl_ps(sums, sums);
    let sums = _mm_add_ss(sums, shuf);
    _mm_cvtss_f32(sums)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[inline]
unsafe fn hsum256_epi32(v: __m256i) -> i32 {
    let high = _mm256_extracti128_si256(v, 1);
    let low = _mm256_castsi256_si128(v);
    let sum128 = _mm_add_epi32(high, low);

    let shuf = _mm_shuffle_epi32(sum128, 0b11_10_11_10);
    let sums = _mm_add_epi32(sum128, shuf);
    let shuf = _mm_shuffle_epi32(sums, 0b00_00_00_01);
    let sums = _mm_add_epi32(sums, shuf);

    _mm_cvtsi128_si32(sums)
}

// ============================================================================
// ARM NEON implementations (128-bit)
// ============================================================================

#[cfg(target_arch = "aarch64")]
#[inline]
unsafe fn dot_product_neon(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 4;
    let remainder = n % 4;

    let mut sum = vdupq_n_f32(0.0);

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        let va = vld1q_f32(a_ptr.add(offset));
        let vb = vld1q_f32(b_ptr.add(offset));
        sum = vfmaq_f32(sum, va, vb);
    }

    let mut result = vaddvq_f32(sum);

    let base = chunks * 4;
    for i in 0..remainder {
        result += a[base + i] * b[base + i];
    }

    result
}

#[cfg(target_arch = "aarch64")]
#[inline]
unsafe fn l2_squared_neon(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 4;
    let remainder = n % 4;

    let mut sum = vdupq_n_f32(0.0);

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        let va = vld1q_f32(a_ptr.add(offset));
        let vb = vld1q_f32(b_ptr.add(offset));
        let diff = vsubq_f32(va, vb);
        sum = vfmaq_f32(sum, diff, diff);
    }

    let mut result = vaddvq_f32(sum);

    let base = chunks * 4;
    for i in 0..remainder {
        let d = a[base + i] - b[base + i];
        result += d * d;
    }

    result
}

#[cfg(target_arch = "aarch64")]
#[inline]
unsafe fn dot_product_i8_neon(a: &[i8], b: &[i8]) -> i32 {
    let n = a.len();
    let chunks = n / 16;
    let remainder = n % 16;

    let mut sum = vdupq_n_s32(0);

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 16;
        let va = vld1q_s8(a_ptr.add(offset));
        let vb = vld1q_s8(b_ptr.add(offset));

        let va_lo = vmovl_s8(vget_low_s8(va));
        let vb_lo = vmovl_s8(vget_low_s8(vb));
        let va_hi = vmovl_s8(vget_high_s8(va));
        let vb_hi = vmovl_s8(vget_high_s8(vb));

        sum = vaddq_s32(sum, vmull_s16(vget_low_s16(va_lo), vget_low_s16(vb_lo)));
        sum = vaddq_s32(sum, vmull_s16(vget_high_s16(va_lo), vget_high_s16(vb_lo)));
        sum = vaddq_s32(sum, vmull_s16(vget_low_s16(va_hi), vget_low_s16(vb_hi)));
        sum = vaddq_s32(sum, vmull_s16(vget_high_s16(va_hi), vget_high_s16(vb_hi)));
    }

    let mut result = vaddvq_s32(sum);

    let base = chunks * 16;
    for i in 0..remainder {
        result += a[base + i] as i32 * b[base + i] as i32;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-3 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_f32_kernels_match_scalar() {
        let mut rng = StdRng::seed_from_u64(42);
        for dim in [1, 3, 7, 8, 9, 16, 31, 100, 128, 768] {
            let a: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let b: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
            assert!(close(dot_product(&a, &b), dot_product_scalar(&a, &b)), "dot dim={}", dim);
            assert!(close(l2_distance_squared(&a, &b), l2_squared_scalar(&a, &b)), "l2 dim={}", dim);
        }
    }

    #[test]
    fn test_integer_kernels_exact() {
        let mut rng = StdRng::seed_from_u64(7);
        for dim in [1, 31, 32, 33, 96, 128, 1000] {
            let a: Vec<u8> = (0..dim).map(|_| rng.gen()).collect();
            let b: Vec<u8> = (0..dim).map(|_| rng.gen()).collect();
            assert_eq!(l2_squared_u8(&a, &b), l2_squared_int_scalar(&a, &b));
            assert_eq!(dot_product_u8(&a, &b), dot_product_int_scalar(&a, &b));

            let c: Vec<i8> = (0..dim).map(|_| rng.gen()).collect();
            let d: Vec<i8> = (0..dim).map(|_| rng.gen()).collect();
            assert_eq!(l2_squared_i8(&c, &d), l2_squared_int_scalar(&c, &d));
            assert_eq!(dot_product_i8(&c, &d), dot_product_int_scalar(&c, &d));
        }
    }

    #[test]
    fn test_extreme_u8_values() {
        let a = vec![255u8; 128];
        let b = vec![0u8; 128];
        assert_eq!(l2_squared_u8(&a, &b), 128 * 255 * 255);
        assert_eq!(dot_product_u8(&a, &a), 128 * 255 * 255);

        let c = vec![i8::MIN; 64];
        let d = vec![i8::MAX; 64];
        assert_eq!(l2_squared_i8(&c, &d), 64 * 255 * 255);
        assert_eq!(dot_product_i8(&c, &c), 64 * 128 * 128);
    }

    #[test]
    fn test_i16_does_not_overflow() {
        let a = vec![i16::MAX; 1000];
        let b = vec![i16::MIN; 1000];
        let d = i16::MAX as i64 - i16::MIN as i64;
        assert_eq!(l2_squared_i16(&a, &b), 1000 * d * d);
        assert_eq!(dot_product_i16(&b, &b), 1000 * 32768 * 32768);
    }
}
