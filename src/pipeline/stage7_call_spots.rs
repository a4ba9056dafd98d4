use serde::{Deserialize, Serialize};
use tracing::info;

use super::{PipelineError, StageContext, gather_colours};
use crate::call_spots::call_reference_spots;
use crate::input::codebook::read_codebook;
use crate::input::matrix::read_bleed_matrix;
use crate::model::{BasicInfo, BledCodes, BleedMatrix, GeneCodes, SpotColours};
use crate::notebook::NotebookPage;
use crate::spot_colours::all_pixel_yxz;
use crate::utils::select_channels;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSpotsPage {
    pub gene_names: Vec<String>,
    /// `[gene][round]` over the rounds in use.
    pub gene_codes: Vec<Vec<u8>>,
    /// `[round][channel]`.
    pub colour_norm_factor: Vec<Vec<f32>>,
    pub initial_bleed_matrix: BleedMatrix,
    pub bleed_matrix: BleedMatrix,
    /// `[gene][round]`.
    pub gene_efficiency: Vec<Vec<f32>>,
    pub bled_codes: BledCodes,
    pub use_ge: Vec<bool>,
    /// `[spot][channel]`.
    pub background: Vec<Vec<f32>>,
    pub gene_no: Vec<usize>,
    pub gene_score: Vec<f32>,
    pub gene_score_second: Vec<f32>,
    pub intensity: Vec<f32>,
}

pub(crate) fn nest(flat: &[f32], width: usize) -> Vec<Vec<f32>> {
    flat.chunks(width.max(1)).map(<[f32]>::to_vec).collect()
}

/// Code book restricted to the sequencing rounds in use.
pub fn codes_for_rounds(codes: &GeneCodes, use_rounds: &[usize]) -> Result<GeneCodes, PipelineError> {
    let mut out = Vec::with_capacity(codes.n_genes());
    for (name, code) in codes.names.iter().zip(&codes.codes) {
        let picked: Option<Vec<u8>> = use_rounds.iter().map(|&r| code.get(r).copied()).collect();
        out.push(picked.ok_or_else(|| {
            PipelineError::Invalid(format!(
                "code of gene {} has {} rounds, rounds in use are {:?}",
                name,
                code.len(),
                use_rounds
            ))
        })?);
    }
    Ok(GeneCodes {
        names: codes.names.clone(),
        codes: out,
    })
}

/// Initial `[dye][channel]` bleed matrix over the channels in use. Without a
/// file, dye `i` is channel `i` alone.
pub fn initial_bleed(basic: &BasicInfo, path: Option<&std::path::Path>) -> Result<Vec<Vec<f32>>, PipelineError> {
    let n_use = basic.n_channels_use();
    let Some(path) = path else {
        return Ok((0..n_use)
            .map(|d| (0..n_use).map(|c| if c == d { 1.0 } else { 0.0 }).collect())
            .collect());
    };
    let full = read_bleed_matrix(path)?;
    let width = full.first().map_or(0, Vec::len);
    if width == n_use {
        return Ok(full);
    }
    if width != basic.n_channels {
        return Err(PipelineError::Invalid(format!(
            "{}: bleed matrix has {} channels, expected {} or {}",
            path.display(),
            width,
            basic.n_channels,
            n_use
        )));
    }
    let flat: Vec<f32> = full.iter().flatten().copied().collect();
    let selected = select_channels(&flat, width, &basic.use_channels)?;
    Ok(selected.chunks(n_use.max(1)).map(<[f32]>::to_vec).collect())
}

/// Central `n` z planes.
pub fn central_planes(nz: usize, n: usize) -> Vec<usize> {
    let n = n.clamp(1, nz.max(1));
    let start = (nz - n.min(nz)) / 2;
    (start..start + n).filter(|&z| z < nz).collect()
}

pub fn run_stage7(ctx: &StageContext<'_>) -> Result<Vec<NotebookPage>, PipelineError> {
    let basic = ctx.basic_info()?;
    let config = &ctx.config.call_spots;
    let codes = codes_for_rounds(&read_codebook(&ctx.config.file_names.code_book)?, &basic.use_rounds)?;
    let bleed = initial_bleed(&basic, ctx.config.file_names.initial_bleed_matrix.as_deref())?;
    let ref_colours: SpotColours = ctx.nb.get("ref_spots", "colours")?;

    let tile = basic
        .use_tiles
        .first()
        .copied()
        .ok_or_else(|| PipelineError::Invalid("no tiles in use".to_string()))?;
    let planes = central_planes(basic.nz, config.norm_z_planes);
    let pixel_yxz = all_pixel_yxz(basic.tile_sz, basic.tile_sz, &planes);
    let pixel_colours = gather_colours(
        &basic,
        &ctx.filtered_stack(tile)?,
        tile,
        &pixel_yxz,
        &ctx.transforms()?,
    )?;
    info!(
        n_spots = ref_colours.n_spots,
        n_pixels = pixel_colours.n_spots,
        n_genes = codes.n_genes(),
        "calling reference spots"
    );

    let out = call_reference_spots(&ref_colours, &pixel_colours, &codes, &bleed, config)?;
    let n_channels = basic.n_channels_use();
    let mut page = NotebookPage::new("call_spots")?;
    page.set_all(&CallSpotsPage {
        gene_names: codes.names.clone(),
        gene_codes: codes.codes.clone(),
        colour_norm_factor: nest(&out.colour_norm_factor, n_channels),
        initial_bleed_matrix: out.initial_bleed_matrix,
        bleed_matrix: out.bleed_matrix,
        gene_efficiency: nest(&out.gene_efficiency, basic.n_rounds_use()),
        bled_codes: out.bled_codes,
        use_ge: out.use_ge,
        background: nest(&out.background, n_channels),
        gene_no: out.gene_no,
        gene_score: out.gene_score,
        gene_score_second: out.gene_score_second,
        intensity: out.intensity,
    })?;
    Ok(vec![page])
}
