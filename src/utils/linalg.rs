//! Small dense solvers for the least-squares fits in call spots and OMP.
//!
//! Matrices are row-major `Vec<f64>` of shape `n x n`. Systems here are tiny
//! (at most a few dozen unknowns), so there is no blocking.

/// Solves `a x = b` for symmetric positive-definite `a` by Cholesky
/// factorisation. Returns `None` when `a` is not positive definite.
pub fn cholesky_solve(a: &[f64], b: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut l = vec![0f64; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 1e-12 {
                    return None;
                }
                l[i * n + i] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    let mut y = vec![0f64; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * n + k] * y[k];
        }
        y[i] = sum / l[i * n + i];
    }
    let mut x = vec![0f64; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[k * n + i] * x[k];
        }
        x[i] = sum / l[i * n + i];
    }
    Some(x)
}

/// Gaussian elimination with partial pivoting. Singular pivots are treated
/// as zero, which gives a zero for that unknown.
pub fn gauss_solve(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut m = a.to_vec();
    let mut rhs = b.to_vec();
    for col in 0..n {
        let mut pivot = col;
        for row in (col + 1)..n {
            if m[row * n + col].abs() > m[pivot * n + col].abs() {
                pivot = row;
            }
        }
        if pivot != col {
            for k in 0..n {
                m.swap(col * n + k, pivot * n + k);
            }
            rhs.swap(col, pivot);
        }
        let p = m[col * n + col];
        if p.abs() < 1e-12 {
            continue;
        }
        for row in (col + 1)..n {
            let factor = m[row * n + col] / p;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[row * n + k] -= factor * m[col * n + k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    let mut x = vec![0f64; n];
    for i in (0..n).rev() {
        let p = m[i * n + i];
        if p.abs() < 1e-12 {
            x[i] = 0.0;
            continue;
        }
        let mut sum = rhs[i];
        for k in (i + 1)..n {
            sum -= m[i * n + k] * x[k];
        }
        x[i] = sum / p;
    }
    x
}

/// Weighted least squares: minimise `sum_i w_i (y_i - sum_j x_j cols[j][i])^2`.
///
/// `cols` are the design-matrix columns, each of the same length as `y`.
/// `weights` of `None` means unit weights.
pub fn least_squares(cols: &[&[f32]], y: &[f32], weights: Option<&[f32]>) -> Vec<f32> {
    let k = cols.len();
    if k == 0 {
        return Vec::new();
    }
    let n = y.len();
    let mut ata = vec![0f64; k * k];
    let mut aty = vec![0f64; k];
    for i in 0..n {
        let w = weights.map_or(1.0, |w| w[i] as f64);
        for a in 0..k {
            let va = cols[a][i] as f64 * w;
            aty[a] += va * y[i] as f64;
            for b in a..k {
                ata[a * k + b] += va * cols[b][i] as f64;
            }
        }
    }
    for a in 0..k {
        for b in 0..a {
            ata[a * k + b] = ata[b * k + a];
        }
    }
    let x = cholesky_solve(&ata, &aty, k).unwrap_or_else(|| gauss_solve(&ata, &aty, k));
    x.into_iter().map(|v| v as f32).collect()
}

/// Least-squares scale `s` minimising `|y - s x|^2`. Zero when `x` is zero.
pub fn scale_fit(x: &[f32], y: &[f32]) -> f32 {
    let xx = crate::simd::dot_f32_f64(x, x);
    if xx <= 0.0 {
        return 0.0;
    }
    (crate::simd::dot_f32_f64(x, y) / xx) as f32
}

#[cfg(test)]
#[path = "../../tests/src_inline/utils/linalg.rs"]
mod tests;
