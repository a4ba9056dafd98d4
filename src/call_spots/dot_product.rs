use rayon::prelude::*;

use super::CallSpotsError;
use crate::model::{BledCodes, ShapeError, SpotColours};
use crate::simd;

/// Best gene of every spot with its score and the runner-up score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DotProductScores {
    pub gene_no: Vec<usize>,
    pub score: Vec<f32>,
    pub score_second: Vec<f32>,
}

/// Scores every spot against every bled code.
///
/// Spots are divided by `|spot| + norm_shift`. With `weight_squared`
/// (`[spot][round][channel]`) the product is `sum w^2 s b` scaled by
/// `n_rounds * n_channels / sum w^2`.
pub fn dot_product_score(
    spot_colours: &SpotColours,
    bled_codes: &BledCodes,
    weight_squared: Option<&[f32]>,
    norm_shift: f32,
) -> Result<DotProductScores, CallSpotsError> {
    let code_len = bled_codes.code_len();
    if spot_colours.spot_len() != code_len {
        return Err(ShapeError::new(
            "spot_colours",
            vec![spot_colours.n_spots, spot_colours.n_rounds, spot_colours.n_channels],
            vec![spot_colours.n_spots, bled_codes.n_rounds, bled_codes.n_channels],
        )
        .into());
    }
    if let Some(w) = weight_squared {
        if w.len() != spot_colours.data.len() {
            return Err(ShapeError::new(
                "weight_squared",
                vec![w.len()],
                vec![spot_colours.n_spots, bled_codes.n_rounds, bled_codes.n_channels],
            )
            .into());
        }
    }
    if bled_codes.n_genes == 0 {
        return Err(CallSpotsError::NoGenes);
    }

    let per_spot: Vec<(usize, f32, f32)> = (0..spot_colours.n_spots)
        .into_par_iter()
        .map(|s| {
            let spot = spot_colours.spot(s);
            let norm = simd::norm_f32(spot) + norm_shift;
            let scaled: Vec<f32> = if norm > 0.0 {
                spot.iter().map(|v| v / norm).collect()
            } else {
                vec![0.0; code_len]
            };
            let w = weight_squared.map(|w| &w[s * code_len..(s + 1) * code_len]);
            let weighted: Vec<f32> = match w {
                Some(w) => {
                    let total = simd::sum_f32_f64(w);
                    let factor = if total > 0.0 {
                        (code_len as f64 / total) as f32
                    } else {
                        0.0
                    };
                    scaled
                        .iter()
                        .zip(w)
                        .map(|(v, w)| v * w * factor)
                        .collect()
                }
                None => scaled,
            };
            best_two(&weighted, bled_codes)
        })
        .collect();

    let mut out = DotProductScores::default();
    for (g, best, second) in per_spot {
        out.gene_no.push(g);
        out.score.push(best);
        out.score_second.push(second);
    }
    Ok(out)
}

fn best_two(spot: &[f32], bled_codes: &BledCodes) -> (usize, f32, f32) {
    let mut best = (0usize, f32::NEG_INFINITY);
    let mut second = f32::NEG_INFINITY;
    for g in 0..bled_codes.n_genes {
        let score = simd::dot_f32(spot, bled_codes.code(g));
        if score > best.1 {
            second = best.1;
            best = (g, score);
        } else if score > second {
            second = score;
        }
    }
    if !second.is_finite() {
        second = 0.0;
    }
    (best.0, best.1, second)
}
