use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{PipelineError, StageContext, gather_colours};
use crate::input::InputError;
use crate::input::tile_bin::TileStack;
use crate::model::{BasicInfo, BledCodes, Image3d, SpotColours, Transforms};
use crate::notebook::NotebookPage;
use crate::omp::{ColourSource, OmpError, OmpInputs, run_omp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmpPage {
    pub spot_tile: usize,
    pub mean_spot: Image3d,
    pub spot: Image3d,
    pub local_yxz: Vec<[i32; 3]>,
    pub scores: Vec<f32>,
    pub tile: Vec<usize>,
    pub gene_no: Vec<usize>,
    pub colours: SpotColours,
}

/// Registered colours read from the filtered tile stacks.
pub struct TileColourSource<'a> {
    pub basic: &'a BasicInfo,
    pub transforms: &'a Transforms,
    pub filtered_paths: &'a [String],
}

impl ColourSource for TileColourSource<'_> {
    fn colours(&self, tile: usize, yxz: &[[i32; 3]]) -> Result<SpotColours, OmpError> {
        let path = self
            .filtered_paths
            .get(tile)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| InputError::MissingInput(format!("filtered stack of tile {}", tile)))?;
        let stack = TileStack::open(Path::new(path))?;
        Ok(gather_colours(self.basic, &stack, tile, yxz, self.transforms)?)
    }
}

pub fn run_stage8(ctx: &StageContext<'_>) -> Result<Vec<NotebookPage>, PipelineError> {
    let basic = ctx.basic_info()?;
    let transforms = ctx.transforms()?;
    let filtered_paths: Vec<String> = ctx.nb.get("filter", "filtered_paths")?;
    let bled_codes: BledCodes = ctx.nb.get("call_spots", "bled_codes")?;
    let norm: Vec<Vec<f32>> = ctx.nb.get("call_spots", "colour_norm_factor")?;
    let colour_norm_factor: Vec<f32> = norm.into_iter().flatten().collect();

    let source = TileColourSource {
        basic: &basic,
        transforms: &transforms,
        filtered_paths: &filtered_paths,
    };
    let inputs = OmpInputs {
        tiles: &basic.use_tiles,
        tile_shape: basic.tile_shape(),
        bled_codes: &bled_codes,
        colour_norm_factor: &colour_norm_factor,
        pixel_size_xy: basic.pixel_size_xy,
        pixel_size_z: basic.pixel_size_z,
    };
    let out = run_omp(&source, &inputs, &ctx.config.omp)?;
    info!(n_spots = out.gene_no.len(), "OMP complete");

    let mut page = NotebookPage::new("omp")?;
    page.set_all(&OmpPage {
        spot_tile: out.spot_tile,
        mean_spot: out.mean_spot,
        spot: out.spot,
        local_yxz: out.local_yxz,
        scores: out.scores,
        tile: out.tile,
        gene_no: out.gene_no,
        colours: out.colours,
    })?;
    Ok(vec![page])
}
