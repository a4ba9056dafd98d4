use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{PipelineError, StageContext, create_dir, path_string};
use crate::config::FilterConfig;
use crate::indexing::{self, IndexOptions};
use crate::input::tile_bin::{TileStack, write_tile_stack};
use crate::model::{BasicInfo, Image2d, Image3d};
use crate::morphology::{MorphologyError, convolve_2d, disk, hanning_diff, top_hat};
use crate::notebook::NotebookPage;
use crate::utils::stats::median;

/// Auto threshold of images that were not filtered.
pub const INVALID_AUTO_THRESH: f32 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPage {
    /// `[tile][round][channel]`.
    pub auto_thresh: Vec<Vec<Vec<f32>>>,
    pub filtered_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDebugPage {
    pub z_info: usize,
    pub r_dapi: Option<usize>,
    pub r1: Option<usize>,
    pub r2: Option<usize>,
    pub invalid_auto_thresh: f32,
    pub time_taken: f64,
}

/// Kernels shared by every image.
#[derive(Debug, Clone)]
pub struct FilterKernels {
    pub spot: Option<Image2d>,
    pub dapi: Option<Image2d>,
}

impl FilterKernels {
    pub fn from_config(config: &FilterConfig) -> Result<Self, MorphologyError> {
        let spot = match config.r1 {
            Some(r1) => Some(hanning_diff(r1, config.r2.unwrap_or(2 * r1))?),
            None => None,
        };
        Ok(Self {
            spot,
            dapi: config.r_dapi.map(disk),
        })
    }
}

fn map_planes<F>(image: &Image3d, mut f: F) -> Result<Image3d, MorphologyError>
where
    F: FnMut(&Image2d) -> Result<Image2d, MorphologyError>,
{
    let mut out = Image3d::zeros(image.ny, image.nx, image.nz);
    for z in 0..image.nz {
        let plane = Image2d {
            ny: image.ny,
            nx: image.nx,
            data: image.z_plane(z),
        };
        out.set_z_plane(z, &f(&plane)?.data);
    }
    Ok(out)
}

/// Filters one sequencing or anchor image: difference of hanning on every z
/// plane, then rounding to whole counts.
pub fn filter_spot_image(image: &Image3d, kernels: &FilterKernels) -> Result<Image3d, MorphologyError> {
    let mut out = match &kernels.spot {
        Some(kernel) => map_planes(image, |plane| Ok(convolve_2d(plane, kernel)))?,
        None => image.clone(),
    };
    for v in out.data.iter_mut() {
        *v = v.round_ties_even();
    }
    Ok(out)
}

/// Top-hat on every z plane, then shifted so the minimum is zero.
pub fn filter_dapi_image(image: &Image3d, kernels: &FilterKernels) -> Result<Image3d, MorphologyError> {
    let mut out = match &kernels.dapi {
        Some(kernel) => map_planes(image, |plane| top_hat(plane, kernel))?,
        None => image.clone(),
    };
    let min = out.data.iter().copied().fold(f32::INFINITY, f32::min);
    if min.is_finite() {
        for v in out.data.iter_mut() {
            *v -= min;
        }
    }
    Ok(out)
}

/// Median absolute intensity of plane `z` times `multiplier`.
pub fn compute_auto_thresh(image: &Image3d, multiplier: f32, z: usize) -> f32 {
    let plane: Vec<f32> = image.z_plane(z).iter().map(|v| v.abs()).collect();
    median(&plane) * multiplier
}

fn filter_indices(basic: &BasicInfo) -> Vec<[usize; 3]> {
    indexing::create(
        basic,
        IndexOptions {
            include_seq_rounds: true,
            include_seq_channels: true,
            include_anchor_round: true,
            include_anchor_channel: true,
            include_dapi_seq: true,
            include_dapi_anchor: true,
            include_bad_trc: false,
        },
    )
}

/// Filters every image in use and writes one filtered stack per tile. Images
/// not in use, and bad ones, are stored as zeros.
pub fn run_stage3(ctx: &StageContext<'_>) -> Result<Vec<NotebookPage>, PipelineError> {
    let start = Instant::now();
    let basic = ctx.basic_info()?;
    let config = &ctx.config.filter;
    let kernels = FilterKernels::from_config(config)?;
    let z_info = basic.nz / 2;
    let [ny, nx, nz] = basic.tile_shape();
    let n_rounds_total = basic.n_rounds_total();
    let indices = filter_indices(&basic);

    let out_dir = ctx.config.file_names.filtered_dir();
    create_dir(&out_dir)?;
    let mut auto_thresh =
        vec![vec![vec![INVALID_AUTO_THRESH; basic.n_channels]; n_rounds_total]; basic.n_tiles];
    let mut filtered_paths = vec![String::new(); basic.n_tiles];

    for &t in &basic.use_tiles {
        let raw = TileStack::open(&ctx.config.file_names.tile_path(t))?;
        let todo = indexing::images_for_tile(&indices, t);
        info!(tile = t, n_images = todo.len(), "filtering tile");
        let filtered: Vec<([usize; 2], Image3d, f32)> = todo
            .par_iter()
            .map(|&[r, c]| -> Result<_, PipelineError> {
                let image = raw.image(r, c)?;
                if Some(c) == basic.dapi_channel {
                    Ok(([r, c], filter_dapi_image(&image, &kernels)?, INVALID_AUTO_THRESH))
                } else {
                    let out = filter_spot_image(&image, &kernels)?;
                    let thresh = compute_auto_thresh(&out, config.auto_thresh_multiplier, z_info);
                    Ok(([r, c], out, thresh))
                }
            })
            .collect::<Result<_, _>>()?;

        let mut images = vec![vec![Image3d::zeros(ny, nx, nz); basic.n_channels]; n_rounds_total];
        for ([r, c], image, thresh) in filtered {
            debug!(tile = t, round = r, channel = c, auto_thresh = thresh, "filtered image");
            auto_thresh[t][r][c] = thresh;
            images[r][c] = image;
        }
        let path = ctx.config.file_names.filtered_tile_path(t);
        write_tile_stack(&path, &images)?;
        filtered_paths[t] = path_string(&path);
    }

    let mut page = NotebookPage::new("filter")?;
    page.set_all(&FilterPage {
        auto_thresh,
        filtered_paths,
    })?;
    let mut debug_page = NotebookPage::new("filter_debug")?;
    debug_page.set_all(&FilterDebugPage {
        z_info,
        r_dapi: config.r_dapi,
        r1: config.r1,
        r2: config.r1.map(|r1| config.r2.unwrap_or(2 * r1)),
        invalid_auto_thresh: INVALID_AUTO_THRESH,
        time_taken: start.elapsed().as_secs_f64(),
    })?;
    Ok(vec![page, debug_page])
}
