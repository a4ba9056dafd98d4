use std::cmp::Ordering;

fn sorted_finite(values: &[f32]) -> Vec<f32> {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Percentile with linear interpolation between closest ranks. `q` is in
/// `[0, 100]`. NaN values are ignored; an empty input gives 0.
pub fn percentile(values: &[f32], q: f32) -> f32 {
    let sorted = sorted_finite(values);
    percentile_sorted(&sorted, q)
}

pub fn percentile_sorted(sorted: &[f32], q: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let q = q.clamp(0.0, 100.0) as f64;
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    (sorted[lo] as f64 + (sorted[hi] as f64 - sorted[lo] as f64) * frac) as f32
}

pub fn median(values: &[f32]) -> f32 {
    percentile(values, 50.0)
}

pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (crate::simd::sum_f32_f64(values) / values.len() as f64) as f32
}

/// Index of the maximum value, first occurrence wins. `None` when empty.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Column-wise median of a row-major `[n_rows][n_cols]` matrix.
pub fn median_columns(data: &[f32], n_rows: usize, n_cols: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(n_cols);
    let mut column = Vec::with_capacity(n_rows);
    for c in 0..n_cols {
        column.clear();
        for r in 0..n_rows {
            column.push(data[r * n_cols + c]);
        }
        out.push(median(&column));
    }
    out
}
