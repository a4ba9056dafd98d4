//! Orthogonal matching pursuit on single pixels.

use rayon::prelude::*;

use super::background::{background_codes, fit_background};
use crate::model::{BledCodes, Image3d, SpotColours};
use crate::simd;
use crate::utils::linalg::least_squares;

/// Non-zero gene coefficients of one pixel as `(gene, coefficient)`, in the
/// order the genes were chosen.
pub type PixelCoefs = Vec<(usize, f32)>;

#[derive(Debug, Clone, Copy)]
pub struct CoefOptions {
    pub max_genes: usize,
    pub dp_thresh: f32,
    pub norm_shift: f32,
    pub fit_background: bool,
    pub weight_coef_fit: bool,
    pub alpha: f32,
    pub beta: f32,
}

/// Runs pursuit on every pixel of `colours`, `subset_pixels` at a time.
/// Output order follows the input.
pub fn compute_omp_coefficients(
    colours: &SpotColours,
    bled_codes: &BledCodes,
    options: &CoefOptions,
    subset_pixels: usize,
) -> Vec<PixelCoefs> {
    let bg_codes = background_codes(colours.n_rounds, colours.n_channels);
    let n_pixels = colours.n_spots;
    let step = subset_pixels.max(1);
    let mut out = Vec::with_capacity(n_pixels);
    let mut start = 0;
    while start < n_pixels {
        let end = (start + step).min(n_pixels);
        let subset: Vec<PixelCoefs> = (start..end)
            .into_par_iter()
            .map(|p| pixel_coefficients(colours.spot(p), bled_codes, &bg_codes, options))
            .collect();
        out.extend(subset);
        start = end;
    }
    out
}

/// Pursuit on one `[round][channel]` colour vector.
pub fn pixel_coefficients(
    colour: &[f32],
    bled_codes: &BledCodes,
    bg_codes: &[Vec<f32>],
    options: &CoefOptions,
) -> PixelCoefs {
    let n = colour.len();
    let mut y = colour.to_vec();
    let bg_coefs = if options.fit_background {
        fit_background(&mut y, bg_codes)
    } else {
        vec![0.0; bg_codes.len()]
    };

    // Residuals below this are rounding noise.
    let tol = 1e-5 * simd::norm_f32(&y);
    let mut chosen: Vec<usize> = Vec::new();
    let mut coefs: Vec<f32> = Vec::new();
    let mut residual = y.clone();
    let mut weight = options
        .weight_coef_fit
        .then(|| fit_weight(n, bled_codes, &chosen, &coefs, bg_codes, &bg_coefs, options));

    for _ in 0..options.max_genes.min(bled_codes.n_genes) {
        if simd::norm_f32(&residual) <= tol {
            break;
        }
        let Some((best, score)) =
            best_gene(&residual, bled_codes, &chosen, weight.as_deref(), options)
        else {
            break;
        };
        if score.abs() < options.dp_thresh {
            break;
        }
        chosen.push(best);
        let cols: Vec<&[f32]> = chosen.iter().map(|&g| bled_codes.code(g)).collect();
        coefs = least_squares(&cols, &y, weight.as_deref());
        residual.copy_from_slice(&y);
        for (col, &k) in cols.iter().zip(&coefs) {
            for (r, b) in residual.iter_mut().zip(col.iter()) {
                *r -= k * b;
            }
        }
        if options.weight_coef_fit {
            weight = Some(fit_weight(
                n, bled_codes, &chosen, &coefs, bg_codes, &bg_coefs, options,
            ));
        }
    }

    chosen
        .into_iter()
        .zip(coefs)
        .filter(|(_, k)| *k != 0.0 && k.is_finite())
        .collect()
}

/// `1 / (beta^2 + alpha * sum_k coef_k^2 code_k^2)` per element, over the
/// chosen genes and the background.
fn fit_weight(
    n: usize,
    bled_codes: &BledCodes,
    chosen: &[usize],
    coefs: &[f32],
    bg_codes: &[Vec<f32>],
    bg_coefs: &[f32],
    options: &CoefOptions,
) -> Vec<f32> {
    let mut variance = vec![0f32; n];
    let genes = chosen.iter().map(|&g| bled_codes.code(g)).zip(coefs);
    let background = bg_codes.iter().map(Vec::as_slice).zip(bg_coefs);
    for (code, &k) in genes.chain(background) {
        for (v, b) in variance.iter_mut().zip(code) {
            *v += k * k * b * b;
        }
    }
    let beta2 = options.beta * options.beta;
    variance
        .into_iter()
        .map(|v| 1.0 / (beta2 + options.alpha * v))
        .collect()
}

/// Gene with the largest absolute normalised dot product with `residual`,
/// skipping genes already chosen.
fn best_gene(
    residual: &[f32],
    bled_codes: &BledCodes,
    chosen: &[usize],
    weight: Option<&[f32]>,
    options: &CoefOptions,
) -> Option<(usize, f32)> {
    let norm = simd::norm_f32(residual) + options.norm_shift;
    if norm <= 0.0 {
        return None;
    }
    let mut scaled: Vec<f32> = residual.iter().map(|v| v / norm).collect();
    if let Some(w) = weight {
        let total = simd::sum_f32_f64(w);
        if total > 0.0 {
            let factor = (residual.len() as f64 / total) as f32;
            for (v, w) in scaled.iter_mut().zip(w) {
                *v *= w * factor;
            }
        }
    }
    let mut best: Option<(usize, f32)> = None;
    for g in (0..bled_codes.n_genes).filter(|g| !chosen.contains(g)) {
        let score = simd::dot_f32(&scaled, bled_codes.code(g));
        if best.is_none_or(|(_, s)| score.abs() > s.abs()) {
            best = Some((g, score));
        }
    }
    best
}

/// Coefficient image of one gene. `yxz[i]` is the position of pixel `i`.
pub fn coefficient_image(
    coefs: &[PixelCoefs],
    yxz: &[[i32; 3]],
    gene: usize,
    shape: [usize; 3],
) -> Image3d {
    let mut image = Image3d::zeros(shape[0], shape[1], shape[2]);
    for (pixel, p) in coefs.iter().zip(yxz) {
        if let Some(&(_, k)) = pixel.iter().find(|(g, _)| *g == gene) {
            image.set(p[0] as usize, p[1] as usize, p[2] as usize, k);
        }
    }
    image
}
