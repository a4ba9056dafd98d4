#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

pub fn sum_f32_f64(values: &[f32]) -> f64 {
    let mut sum = 0f64;
    let mut i = 0usize;
    let n = values.len();
    unsafe {
        while i + 4 <= n {
            let v = vld1q_f32(values.as_ptr().add(i));
            let mut lanes = [0f32; 4];
            vst1q_f32(lanes.as_mut_ptr(), v);
            for lane in &lanes {
                sum += *lane as f64;
            }
            i += 4;
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
        while i + 4 <= n {
            let va = vld1q_f32(a.as_ptr().add(i));
            let vb = vld1q_f32(b.as_ptr().add(i));
            let mut la = [0f32; 4];
            let mut lb = [0f32; 4];
            vst1q_f32(la.as_mut_ptr(), va);
            vst1q_f32(lb.as_mut_ptr(), vb);
            for k in 0..4 {
                sum += (la[k] as f64) * (lb[k] as f64);
            }
            i += 4;
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
        while i + 4 <= n {
            let v = vld1q_f32(values.as_ptr().add(i));
            let mut lanes = [0f32; 4];
            vst1q_f32(lanes.as_mut_ptr(), v);
            for lane in &lanes {
                if *lane > max {
                    max = *lane;
                }
            }
            i += 4;
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
    "neon"
}

#[cfg(test)]
#[path = "../../tests/src_inline/simd/neon.rs"]
mod tests;
