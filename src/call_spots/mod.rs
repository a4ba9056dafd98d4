//! Gene assignment of reference spots.

pub mod bled;
pub mod bleed;
pub mod dot_product;
pub mod duplicates;
pub mod efficiency;

pub use bled::get_bled_codes;
pub use bleed::estimate_bleed_matrix;
pub use dot_product::dot_product_score;
pub use duplicates::get_non_duplicate;
pub use efficiency::{
    EfficiencyLimits, EfficiencyThresholds, compute_gene_efficiency, get_gene_efficiency,
};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{CallSpotsConfig, GeneEfficiencyMethod};
use crate::model::{BledCodes, BleedMatrix, GeneCodes, ShapeError, SpotColours};
use crate::simd::max_f32;
use crate::spot_colours::{normalise_rc, remove_background};
use crate::utils::stats::median;

#[derive(Debug, Error)]
pub enum CallSpotsError {
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("gene {gene} round {round} uses dye {dye} but there are only {n_dyes} dyes")]
    DyeOutOfRange {
        gene: usize,
        round: usize,
        dye: usize,
        n_dyes: usize,
    },
    #[error("gene number {0} out of range for {1} genes")]
    GeneOutOfRange(usize, usize),
    #[error("tile origin of tiles {0:?} contains NaN but spots were found on them")]
    NanTileOrigin(Vec<usize>),
    #[error("no genes to score against")]
    NoGenes,
    #[error("no reference spots to call")]
    NoSpots,
}

/// Everything the call spots stage produces.
#[derive(Debug, Clone)]
pub struct CallSpotsOutput {
    /// Multiplier applied to raw colours, `[round][channel]`.
    pub colour_norm_factor: Vec<f32>,
    pub initial_bleed_matrix: BleedMatrix,
    pub bleed_matrix: BleedMatrix,
    /// `[gene][round]`.
    pub gene_efficiency: Vec<f32>,
    pub bled_codes: BledCodes,
    pub use_ge: Vec<bool>,
    /// `[spot][channel]`.
    pub background: Vec<f32>,
    pub gene_no: Vec<usize>,
    pub gene_score: Vec<f32>,
    pub gene_score_second: Vec<f32>,
    pub intensity: Vec<f32>,
}

/// Median over rounds of the brightest channel of each spot.
pub fn spot_intensity(colours: &SpotColours) -> Vec<f32> {
    (0..colours.n_spots)
        .map(|s| {
            let per_round: Vec<f32> = (0..colours.n_rounds)
                .map(|r| max_f32(colours.round(s, r)))
                .collect();
            median(&per_round)
        })
        .collect()
}

/// Multiplies every spot by a `[round][channel]` factor.
pub fn apply_colour_norm(colours: &mut SpotColours, factor: &[f32]) {
    let n = colours.spot_len();
    for s in 0..colours.n_spots {
        for (v, f) in colours.spot_mut(s).iter_mut().zip(&factor[..n]) {
            *v *= f;
        }
    }
}

/// Runs the whole reference spot calling.
///
/// `ref_colours` are raw colours of the reference spots, `pixel_colours` raw
/// colours of a sample of pixels used to equalise rounds. Both use the same
/// rounds and channels as `gene_codes` and `initial_bleed` (`[dye][channel]`).
pub fn call_reference_spots(
    ref_colours: &SpotColours,
    pixel_colours: &SpotColours,
    gene_codes: &GeneCodes,
    initial_bleed: &[Vec<f32>],
    config: &CallSpotsConfig,
) -> Result<CallSpotsOutput, CallSpotsError> {
    if ref_colours.n_spots == 0 {
        return Err(CallSpotsError::NoSpots);
    }
    let n_rounds = ref_colours.n_rounds;
    if gene_codes.n_rounds() != n_rounds {
        return Err(ShapeError::new(
            "gene_codes",
            vec![gene_codes.n_genes(), gene_codes.n_rounds()],
            vec![gene_codes.n_genes(), n_rounds],
        )
        .into());
    }
    let initial_bleed_matrix = BleedMatrix::from_dye_channel(initial_bleed, n_rounds)?;
    if initial_bleed_matrix.n_channels != ref_colours.n_channels {
        return Err(ShapeError::new(
            "initial_bleed_matrix",
            vec![initial_bleed_matrix.n_dyes, initial_bleed_matrix.n_channels],
            vec![initial_bleed_matrix.n_dyes, ref_colours.n_channels],
        )
        .into());
    }

    let mut colours = ref_colours.clone();
    let background = remove_background(&mut colours);
    let norm_factor = normalise_rc(
        pixel_colours,
        &colours,
        config.norm_cutoff_percentile,
        config.norm_num_spots,
    );
    let colour_norm_factor: Vec<f32> = norm_factor
        .iter()
        .map(|&f| {
            if f.is_finite() && f != 0.0 {
                1.0 / f
            } else {
                1.0
            }
        })
        .collect();
    apply_colour_norm(&mut colours, &colour_norm_factor);

    let n_genes = gene_codes.n_genes();
    let ones = vec![1f32; n_genes * n_rounds];
    let shift = config.dot_product_norm_shift;

    let initial_codes = get_bled_codes(gene_codes, &initial_bleed_matrix, &ones)?;
    let initial_scores = dot_product_score(&colours, &initial_codes, None, shift)?;
    let bleed_matrix = estimate_bleed_matrix(
        &colours,
        &initial_scores.gene_no,
        &initial_scores.score,
        gene_codes,
        &initial_bleed_matrix,
        config.bleed_matrix_score_thresh,
        config.bleed_matrix_min_spots,
    )?;

    let bled_no_ge = get_bled_codes(gene_codes, &bleed_matrix, &ones)?;
    let scores = dot_product_score(&colours, &bled_no_ge, None, shift)?;
    let intensity = spot_intensity(&colours);
    let (gene_efficiency, use_ge) = match config.gene_efficiency_method {
        GeneEfficiencyMethod::MedianScale => compute_gene_efficiency(
            &colours,
            &bled_no_ge,
            &scores.gene_no,
            &scores.score,
            &intensity,
            EfficiencyThresholds {
                spot_number: config.gene_efficiency_min_spots,
                score: config.gene_efficiency_score_thresh,
                intensity: config.gene_efficiency_intensity_thresh,
            },
        )?,
        GeneEfficiencyMethod::LeastSquares => least_squares_efficiency(
            &colours,
            &scores.gene_no,
            &scores.score,
            &intensity,
            gene_codes,
            &bleed_matrix,
            config,
        )?,
    };
    debug!(
        n_used = use_ge.iter().filter(|u| **u).count(),
        "computed gene efficiency"
    );

    let bled_codes = get_bled_codes(gene_codes, &bleed_matrix, &gene_efficiency)?;
    let final_scores = dot_product_score(&colours, &bled_codes, None, shift)?;
    info!(
        n_spots = colours.n_spots,
        n_genes, "assigned genes to reference spots"
    );

    Ok(CallSpotsOutput {
        colour_norm_factor,
        initial_bleed_matrix,
        bleed_matrix,
        gene_efficiency,
        bled_codes,
        use_ge,
        background,
        gene_no: final_scores.gene_no,
        gene_score: final_scores.score,
        gene_score_second: final_scores.score_second,
        intensity,
    })
}

/// Least-squares efficiency over the spots passing the score and intensity
/// thresholds, which are also the spots flagged as used.
fn least_squares_efficiency(
    colours: &SpotColours,
    gene_no: &[usize],
    gene_score: &[f32],
    intensity: &[f32],
    gene_codes: &GeneCodes,
    bleed_matrix: &BleedMatrix,
    config: &CallSpotsConfig,
) -> Result<(Vec<f32>, Vec<bool>), CallSpotsError> {
    let use_ge: Vec<bool> = gene_score
        .iter()
        .zip(intensity)
        .map(|(&s, &i)| {
            s > config.gene_efficiency_score_thresh && i > config.gene_efficiency_intensity_thresh
        })
        .collect();
    let selected_genes: Vec<usize> = gene_no
        .iter()
        .zip(&use_ge)
        .filter(|(_, used)| **used)
        .map(|(&g, _)| g)
        .collect();
    let efficiency = get_gene_efficiency(
        &colours.select(&use_ge),
        &selected_genes,
        gene_codes,
        bleed_matrix,
        EfficiencyLimits {
            min_spots: config.gene_efficiency_min_spots,
            max_efficiency: config.gene_efficiency_max.unwrap_or(f32::INFINITY),
            min_efficiency: config.gene_efficiency_min,
            min_factor: config.gene_efficiency_min_factor,
        },
    )?;
    Ok((efficiency, use_ge))
}

#[cfg(test)]
#[path = "../../tests/src_inline/call_spots/mod.rs"]
mod tests;
