#[inline]
pub fn sum_f32_f64(values: &[f32]) -> f64 {
    backend::sum_f32_f64(values)
}

#[inline]
pub fn dot_f32_f64(a: &[f32], b: &[f32]) -> f64 {
    backend::dot_f32_f64(a, b)
}

#[inline]
pub fn dot_f32(a: &[f32], b: &[f32]) -> f32 {
    dot_f32_f64(a, b) as f32
}

#[inline]
pub fn norm_f32(values: &[f32]) -> f32 {
    dot_f32_f64(values, values).sqrt() as f32
}

#[inline]
pub fn max_f32(values: &[f32]) -> f32 {
    backend::max_f32(values)
}

/// Scales `values` in place to unit L2 norm. Zero vectors are left untouched.
pub fn normalise_l2(values: &mut [f32]) -> f32 {
    let norm = norm_f32(values);
    if norm > 0.0 {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
    norm
}

#[inline]
pub fn backend_name() -> &'static str {
    backend::backend_name()
}

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
mod backend {
    pub use crate::simd::avx2::*;
}

#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
mod backend {
    pub use crate::simd::neon::*;
}

#[cfg(not(any(
    all(target_arch = "x86_64", target_feature = "avx2"),
    all(target_arch = "aarch64", target_feature = "neon"),
)))]
mod backend {
    pub use crate::simd::scalar::*;
}

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
pub mod avx2;
#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
pub mod neon;
pub mod scalar;

#[cfg(test)]
#[path = "../../tests/src_inline/simd/mod.rs"]
mod tests;
