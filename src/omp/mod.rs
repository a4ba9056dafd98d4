//! Gene spots from per-pixel orthogonal matching pursuit.

pub mod background;
pub mod coefs;
pub mod detect;
pub mod scores;
pub mod spots;

pub use coefs::{CoefOptions, PixelCoefs, coefficient_image, compute_omp_coefficients};
pub use detect::{detect_spots, isolated_spots, limit_spots_per_z};
pub use scores::score_coefficient_image;
pub use spots::{compute_mean_spot_from, count_edge_ones, spot_from_mean};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::call_spots::apply_colour_norm;
use crate::config::OmpConfig;
use crate::input::InputError;
use crate::model::{BledCodes, Image3d, ShapeError, SpotColours};
use crate::morphology::MorphologyError;
use crate::simd;
use crate::spot_colours::all_pixel_yxz;

#[derive(Debug, Error)]
pub enum OmpError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Morphology(#[from] MorphologyError),
    #[error("bled code of gene {0} is not L2 normalised")]
    BledCodeNorm(usize),
    #[error("no tiles to run OMP on")]
    NoTiles,
    #[error(
        "computed spot contains no strongly positive values; reduce shape_sign_thresh (currently {0})"
    )]
    NoPositiveSpot(f32),
    #[error("no OMP spots found on tile {0}; check registration and call spots or adjust the OMP config")]
    NoSpots(usize),
}

/// Supplies registered raw colours of a tile over the rounds and channels
/// in use, `[point][round][channel]`.
pub trait ColourSource {
    fn colours(&self, tile: usize, yxz: &[[i32; 3]]) -> Result<SpotColours, OmpError>;
}

#[derive(Debug, Clone)]
pub struct OmpInputs<'a> {
    pub tiles: &'a [usize],
    pub tile_shape: [usize; 3],
    pub bled_codes: &'a BledCodes,
    /// `[round][channel]`.
    pub colour_norm_factor: &'a [f32],
    pub pixel_size_xy: f32,
    pub pixel_size_z: f32,
}

#[derive(Debug, Clone)]
pub struct OmpOutput {
    pub spot_tile: usize,
    pub mean_spot: Image3d,
    pub spot: Image3d,
    pub local_yxz: Vec<[i32; 3]>,
    pub scores: Vec<f32>,
    pub tile: Vec<usize>,
    pub gene_no: Vec<usize>,
    pub colours: SpotColours,
}

pub fn run_omp<S: ColourSource>(
    source: &S,
    inputs: &OmpInputs<'_>,
    config: &OmpConfig,
) -> Result<OmpOutput, OmpError> {
    let first_tile = *inputs.tiles.first().ok_or(OmpError::NoTiles)?;
    let bled = inputs.bled_codes;
    for g in 0..bled.n_genes {
        let norm = simd::norm_f32(bled.code(g));
        if !norm.is_finite() || (norm != 0.0 && (norm - 1.0).abs() > 1e-3) {
            return Err(OmpError::BledCodeNorm(g));
        }
    }
    if inputs.colour_norm_factor.len() != bled.code_len() {
        return Err(ShapeError::new(
            "colour_norm_factor",
            vec![inputs.colour_norm_factor.len()],
            vec![bled.n_rounds, bled.n_channels],
        )
        .into());
    }
    let options = CoefOptions {
        max_genes: config.max_genes,
        dp_thresh: config.dp_thresh,
        norm_shift: 0.0,
        fit_background: config.fit_background,
        weight_coef_fit: config.weight_coef_fit,
        alpha: config.alpha,
        beta: config.beta,
    };
    let [ny, nx, nz] = inputs.tile_shape;
    let z_planes: Vec<usize> = (0..nz).collect();
    let yxz_all = all_pixel_yxz(ny, nx, &z_planes);

    let mut shape: Option<(Image3d, Image3d)> = None;
    let mut out_yxz = Vec::new();
    let mut out_scores = Vec::new();
    let mut out_tile = Vec::new();
    let mut out_gene = Vec::new();
    let mut out_colours = SpotColours::new(bled.n_rounds, bled.n_channels);

    for &t in inputs.tiles {
        info!(tile = t, "computing OMP coefficients");
        let mut colours = source.colours(t, &yxz_all)?;
        if colours.spot_len() != bled.code_len() || colours.n_spots != yxz_all.len() {
            return Err(ShapeError::new(
                "tile colours",
                vec![colours.n_spots, colours.n_rounds, colours.n_channels],
                vec![yxz_all.len(), bled.n_rounds, bled.n_channels],
            )
            .into());
        }
        if config.colour_normalise {
            apply_colour_norm(&mut colours, inputs.colour_norm_factor);
        }
        let coefficients =
            compute_omp_coefficients(&colours, bled, &options, config.subset_pixels);
        drop(colours);

        if t == first_tile {
            shape = Some(mean_spot_shape(&coefficients, &yxz_all, inputs, config)?);
        }
        let Some((mean_spot, spot)) = shape.as_ref() else {
            continue;
        };

        let n_before = out_tile.len();
        for g in 0..bled.n_genes {
            let image = coefficient_image(&coefficients, &yxz_all, g, inputs.tile_shape);
            let scores = score_coefficient_image(&image, spot, mean_spot, config.high_coef_bias);
            let (g_yxz, g_scores) =
                detect_spots(&scores, config.score_threshold, config.radius_xy, config.radius_z)?;
            if g_yxz.is_empty() {
                continue;
            }
            debug!(tile = t, gene = g, n_spots = g_yxz.len(), "detected OMP spots");
            out_tile.extend(std::iter::repeat_n(t, g_yxz.len()));
            out_gene.extend(std::iter::repeat_n(g, g_yxz.len()));
            out_yxz.extend(g_yxz);
            out_scores.extend(g_scores);
        }
        if out_tile.len() == n_before {
            return Err(OmpError::NoSpots(t));
        }
        let t_colours = source.colours(t, &out_yxz[n_before..])?;
        out_colours.extend(&t_colours);
        info!(tile = t, n_spots = out_tile.len() - n_before, "OMP tile complete");
    }

    let (mean_spot, spot) = shape.ok_or(OmpError::NoTiles)?;
    Ok(OmpOutput {
        spot_tile: first_tile,
        mean_spot,
        spot,
        local_yxz: out_yxz,
        scores: out_scores,
        tile: out_tile,
        gene_no: out_gene,
        colours: out_colours,
    })
}

/// Mean coefficient image around isolated maxima of every gene, weighted by
/// each gene's spot count, and the footprint derived from it.
fn mean_spot_shape(
    coefficients: &[PixelCoefs],
    yxz_all: &[[i32; 3]],
    inputs: &OmpInputs<'_>,
    config: &OmpConfig,
) -> Result<(Image3d, Image3d), OmpError> {
    let iso_yx = config.shape_isolation_distance_yx;
    let iso_z = config.shape_isolation_distance_z.unwrap_or_else(|| {
        (iso_yx as f32 * inputs.pixel_size_xy / inputs.pixel_size_z).ceil() as usize
    });
    let [sy, sx, sz] = config.spot_shape;
    let mut total = Image3d::zeros(sy, sx, sz);
    let mut n_isolated = 0usize;
    let mut genes_used = Vec::new();
    for g in 0..inputs.bled_codes.n_genes {
        if n_isolated >= config.spot_shape_max_spots {
            break;
        }
        let image = coefficient_image(coefficients, yxz_all, g, inputs.tile_shape);
        let (isolated, _) =
            detect_spots(&image, config.shape_coefficient_threshold, iso_yx, iso_z)?;
        let mean = compute_mean_spot_from(&image, &isolated, config.spot_shape);
        for (acc, v) in total.data.iter_mut().zip(&mean.data) {
            *acc += v * isolated.len() as f32;
        }
        n_isolated += isolated.len();
        genes_used.push(g);
    }
    if n_isolated > 0 {
        for v in total.data.iter_mut() {
            *v /= n_isolated as f32;
        }
    }
    debug!(n_isolated, ?genes_used, "computed OMP mean spot");
    if n_isolated < 10 {
        warn!("OMP mean spot computed with only {} isolated spots", n_isolated);
    }

    let spot = spot_from_mean(&total, config.shape_sign_thresh);
    let edge = count_edge_ones(&spot);
    if edge > 0 {
        warn!(
            "the spot contains {} ones on the y/x edges; spot_shape may need to grow to avoid cropping",
            edge
        );
    }
    let n_positive = spot.data.iter().filter(|v| **v == 1.0).count();
    if n_positive == 0 {
        return Err(OmpError::NoPositiveSpot(config.shape_sign_thresh));
    }
    if n_positive < 5 {
        warn!(
            "computed spot contains only {} strongly positive values; consider reducing shape_sign_thresh",
            n_positive
        );
    }
    Ok((total, spot))
}

#[cfg(test)]
#[path = "../../tests/src_inline/omp/mod.rs"]
mod tests;
