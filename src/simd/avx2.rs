#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

pub fn sum_f32_f64(values: &[f32]) -> f64 {
    // Lanes are accumulated one by one so the order matches the scalar path.
    let mut sum = 0f64;
    let mut i = 0usize;
    let n = values.len();
    unsafe {
        while i + 8 <= n {
            let ptr = values.as_ptr().add(i);
            let v = _mm256_loadu_ps(ptr);
            let mut lanes = [0f32; 8];
            _mm256_storeu_ps(lanes.as_mut_ptr(), v);
            for lane in &lanes {
                sum += *lane as f64;
            }
            i += 8;
        }
    }
    while i < n {
        sum += values[i] as f64;
        i += 1;
    }
    sum
}

pub fn dot_f32_f64(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    let mut sum = 0f64;
    let mut i = 0usize;
    unsafe {
        while i + 8 <= n {
            let va = _mm256_loadu_ps(a.as_ptr().add(i));
            let vb = _mm256_loadu_ps(b.as_ptr().add(i));
            let mut la = [0f32; 8];
            let mut lb = [0f32; 8];
            _mm256_storeu_ps(la.as_mut_ptr(), va);
            _mm256_storeu_ps(lb.as_mut_ptr(), vb);
            for k in 0..8 {
                sum += (la[k] as f64) * (lb[k] as f64);
            }
            i += 8;
        }
    }
    while i < n {
        sum += (a[i] as f64) * (b[i] as f64);
        i += 1;
    }
    sum
}

pub fn max_f32(values: &[f32]) -> f32 {
    let mut max = f32::NEG_INFINITY;
    let mut i = 0usize;
    let n = values.len();
    unsafe {
        while i + 8 <= n {
            let v = _mm256_loadu_ps(values.as_ptr().add(i));
            let mut lanes = [0f32; 8];
            _mm256_storeu_ps(lanes.as_mut_ptr(), v);
            for lane in &lanes {
                if *lane > max {
                    max = *lane;
                }
            }
            i += 8;
        }
    }
    while i < n {
        let v = values[i];
        if v > max {
            max = v;
        }
        i += 1;
    }
    if max.is_finite() { max } else { 0.0 }
}

pub fn backend_name() -> &'static str {
    "avx2"
}

#[cfg(test)]
#[path = "../../tests/src_inline/simd/avx2.rs"]
mod tests;
