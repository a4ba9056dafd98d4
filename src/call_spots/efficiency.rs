//! Relative strength of each gene in each round.

use super::CallSpotsError;
use crate::model::{BledCodes, BleedMatrix, GeneCodes, ShapeError, SpotColours};
use crate::utils::linalg::scale_fit;
use crate::utils::stats::{median, median_columns};

/// Limits applied by [`get_gene_efficiency`].
#[derive(Debug, Clone, Copy)]
pub struct EfficiencyLimits {
    /// A gene needs more than this many spots, otherwise its efficiency is 1.
    pub min_spots: usize,
    /// Spots with any relative round strength at or above this are dropped.
    pub max_efficiency: f32,
    /// At most `ceil(min_factor * n_rounds)` rounds of a spot may fall
    /// below `min_efficiency`.
    pub min_efficiency: f32,
    pub min_factor: f32,
}

impl Default for EfficiencyLimits {
    fn default() -> Self {
        Self {
            min_spots: 30,
            max_efficiency: f32::INFINITY,
            min_efficiency: 0.0,
            min_factor: 1.0,
        }
    }
}

/// Gene efficiency `[gene][round]` from least-squares round strengths.
///
/// For each gene the reference round is the one whose median strength is
/// closest to the median over rounds; strengths are taken relative to it.
pub fn get_gene_efficiency(
    spot_colours: &SpotColours,
    spot_gene_no: &[usize],
    gene_codes: &GeneCodes,
    bleed_matrix: &BleedMatrix,
    limits: EfficiencyLimits,
) -> Result<Vec<f32>, CallSpotsError> {
    let n_genes = gene_codes.n_genes();
    let n_rounds = gene_codes.n_rounds();
    check_colours(spot_colours, spot_gene_no.len(), n_rounds, bleed_matrix.n_channels)?;
    if let Some(&g) = spot_gene_no.iter().find(|&&g| g >= n_genes) {
        return Err(CallSpotsError::GeneOutOfRange(g, n_genes));
    }

    let mut efficiency = vec![1f32; n_genes * n_rounds];
    let n_min_thresh = (limits.min_factor * n_rounds as f32).ceil() as usize;
    for g in 0..n_genes {
        let spots: Vec<usize> = (0..spot_colours.n_spots)
            .filter(|&s| spot_gene_no[s] == g)
            .collect();
        if spots.len() <= limits.min_spots {
            continue;
        }
        let dyes: Vec<Vec<f32>> = gene_codes.codes[g]
            .iter()
            .enumerate()
            .map(|(r, &d)| bleed_matrix.dye_vector(r, d as usize))
            .collect();
        let strength: Vec<Vec<f32>> = spots
            .iter()
            .map(|&s| {
                (0..n_rounds)
                    .map(|r| scale_fit(&dyes[r], spot_colours.round(s, r)))
                    .collect()
            })
            .collect();

        let round_medians = median_columns(&strength.concat(), strength.len(), n_rounds);
        let centre = median(&round_medians);
        let mut ref_round = 0;
        for r in 1..n_rounds {
            if (round_medians[r] - centre).abs() < (round_medians[ref_round] - centre).abs() {
                ref_round = r;
            }
        }

        let relative: Vec<Vec<f32>> = strength
            .iter()
            .filter(|row| row[ref_round] > 0.0)
            .map(|row| row.iter().map(|v| v / row[ref_round]).collect())
            .collect();
        if relative.len() <= limits.min_spots {
            continue;
        }
        let kept: Vec<&Vec<f32>> = relative
            .iter()
            .filter(|row| {
                let below_max = row.iter().all(|&v| v < limits.max_efficiency);
                let n_low = row.iter().filter(|&&v| v < limits.min_efficiency).count();
                below_max && n_low <= n_min_thresh
            })
            .collect();
        if kept.len() <= limits.min_spots {
            continue;
        }
        let kept_flat: Vec<f32> = kept.iter().flat_map(|row| row.iter().copied()).collect();
        efficiency[g * n_rounds..(g + 1) * n_rounds]
            .copy_from_slice(&median_columns(&kept_flat, kept.len(), n_rounds));
    }
    for v in efficiency.iter_mut() {
        *v = v.max(0.0);
    }
    Ok(efficiency)
}

/// Thresholds for [`compute_gene_efficiency`].
#[derive(Debug, Clone, Copy)]
pub struct EfficiencyThresholds {
    pub spot_number: usize,
    pub score: f32,
    pub intensity: f32,
}

/// Gene efficiency as the median, over confidently assigned spots, of the
/// scale matching each round of the spot to the bled code.
///
/// A gene needs at least `spot_number` spots with score and intensity above
/// their thresholds; other genes keep efficiency 1. Negative values are set
/// to 0. The second vector flags the spots that were used.
pub fn compute_gene_efficiency(
    spot_colours: &SpotColours,
    bled_codes: &BledCodes,
    gene_no: &[usize],
    gene_score: &[f32],
    intensity: &[f32],
    thresholds: EfficiencyThresholds,
) -> Result<(Vec<f32>, Vec<bool>), CallSpotsError> {
    let (n_genes, n_rounds) = (bled_codes.n_genes, bled_codes.n_rounds);
    let n_spots = spot_colours.n_spots;
    check_colours(spot_colours, gene_no.len(), n_rounds, bled_codes.n_channels)?;
    if gene_score.len() != n_spots || intensity.len() != n_spots {
        return Err(ShapeError::new(
            "gene_score",
            vec![gene_score.len(), intensity.len()],
            vec![n_spots, n_spots],
        )
        .into());
    }

    let mut efficiency = vec![1f32; n_genes * n_rounds];
    let mut use_ge = vec![false; n_spots];
    for g in 0..n_genes {
        let spots: Vec<usize> = (0..n_spots)
            .filter(|&s| {
                gene_no[s] == g
                    && gene_score[s] > thresholds.score
                    && intensity[s] > thresholds.intensity
            })
            .collect();
        if spots.len() < thresholds.spot_number {
            continue;
        }
        for &s in &spots {
            use_ge[s] = true;
        }
        for r in 0..n_rounds {
            let expected = bled_codes.round(g, r);
            let scales: Vec<f32> = spots
                .iter()
                .map(|&s| scale_fit(expected, spot_colours.round(s, r)))
                .collect();
            efficiency[g * n_rounds + r] = median(&scales).max(0.0);
        }
    }
    Ok((efficiency, use_ge))
}

fn check_colours(
    colours: &SpotColours,
    n_spots: usize,
    n_rounds: usize,
    n_channels: usize,
) -> Result<(), ShapeError> {
    if colours.n_spots != n_spots || colours.n_rounds != n_rounds || colours.n_channels != n_channels
    {
        return Err(ShapeError::new(
            "spot_colours",
            vec![colours.n_spots, colours.n_rounds, colours.n_channels],
            vec![n_spots, n_rounds, n_channels],
        ));
    }
    Ok(())
}
