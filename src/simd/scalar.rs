pub fn sum_f32_f64(values: &[f32]) -> f64 {
    let mut sum = 0f64;
    for &v in values {
        sum += v as f64;
    }
    sum
}

pub fn dot_f32_f64(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    let mut sum = 0f64;
    for i in 0..n {
        sum += (a[i] as f64) * (b[i] as f64);
    }
    sum
}

pub fn max_f32(values: &[f32]) -> f32 {
    let mut max = f32::NEG_INFINITY;
    for &v in values {
        if v > max {
            max = v;
        }
    }
    if max.is_finite() { max } else { 0.0 }
}

pub fn backend_name() -> &'static str {
    "scalar"
}

#[cfg(test)]
#[path = "../../tests/src_inline/simd/scalar.rs"]
mod tests;
