use super::CallSpotsError;
use crate::model::{BleedMatrix, GeneCodes, ShapeError, SpotColours};
use crate::simd;

/// Re-estimates the dye vectors from confidently assigned spots.
///
/// Every spot scoring above `score_thresh` contributes each round's unit
/// channel vector to the dye its gene uses in that round. A dye's new vector
/// is the normalised mean of its contributions, shared by every round. Dyes
/// with fewer than `min_spots` contributions keep their initial vectors.
pub fn estimate_bleed_matrix(
    spot_colours: &SpotColours,
    gene_no: &[usize],
    gene_score: &[f32],
    gene_codes: &GeneCodes,
    initial: &BleedMatrix,
    score_thresh: f32,
    min_spots: usize,
) -> Result<BleedMatrix, CallSpotsError> {
    let (n_rounds, n_channels, n_dyes) = (initial.n_rounds, initial.n_channels, initial.n_dyes);
    if spot_colours.n_rounds != n_rounds
        || spot_colours.n_channels != n_channels
        || gene_no.len() != spot_colours.n_spots
        || gene_score.len() != spot_colours.n_spots
    {
        return Err(ShapeError::new(
            "spot_colours",
            vec![spot_colours.n_spots, spot_colours.n_rounds, spot_colours.n_channels],
            vec![gene_no.len(), n_rounds, n_channels],
        )
        .into());
    }

    let mut sums = vec![0f64; n_dyes * n_channels];
    let mut counts = vec![0usize; n_dyes];
    let mut unit = vec![0f32; n_channels];
    for s in 0..spot_colours.n_spots {
        if gene_score[s] <= score_thresh {
            continue;
        }
        let g = gene_no[s];
        let code = gene_codes
            .codes
            .get(g)
            .ok_or(CallSpotsError::GeneOutOfRange(g, gene_codes.n_genes()))?;
        for (r, &dye) in code.iter().enumerate().take(n_rounds) {
            let d = dye as usize;
            if d >= n_dyes {
                return Err(CallSpotsError::DyeOutOfRange {
                    gene: g,
                    round: r,
                    dye: d,
                    n_dyes,
                });
            }
            unit.copy_from_slice(spot_colours.round(s, r));
            if simd::normalise_l2(&mut unit) == 0.0 {
                continue;
            }
            for (c, v) in unit.iter().enumerate() {
                sums[d * n_channels + c] += *v as f64;
            }
            counts[d] += 1;
        }
    }

    let mut out = initial.clone();
    for d in 0..n_dyes {
        if counts[d] < min_spots {
            continue;
        }
        let mut vector: Vec<f32> = sums[d * n_channels..(d + 1) * n_channels]
            .iter()
            .map(|v| (v / counts[d] as f64) as f32)
            .collect();
        if simd::normalise_l2(&mut vector) == 0.0 {
            continue;
        }
        for r in 0..n_rounds {
            out.set_dye_vector(r, d, &vector);
        }
    }
    Ok(out)
}
