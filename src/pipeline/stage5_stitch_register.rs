use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{PipelineError, StageContext, path_string};
use crate::config::StitchConfig;
use crate::input::matrix::{read_tile_origins, read_transforms};
use crate::model::{Affine, BasicInfo, Transforms};
use crate::notebook::NotebookPage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchPage {
    pub tile_origin: Vec<Option<[f32; 3]>>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterPage {
    pub transform: Transforms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDebugPage {
    pub source_path: Option<String>,
    pub n_non_identity: usize,
}

/// Origins on a regular grid, neighbours overlapping by `expected_overlap`.
pub fn grid_origins(positions: &[[usize; 2]], tile_sz: usize, expected_overlap: f32) -> Vec<[f32; 3]> {
    let step = tile_sz as f32 * (1.0 - expected_overlap);
    positions
        .iter()
        .map(|&[y, x]| [y as f32 * step, x as f32 * step, 0.0])
        .collect()
}

/// Picks tile origins from the config, the origins file, a grid layout or,
/// for a single tile, the zero origin. Tiles not in use get `None`.
pub fn resolve_tile_origins(
    basic: &BasicInfo,
    stitch: &StitchConfig,
    origins_file: Option<&std::path::Path>,
) -> Result<(Vec<Option<[f32; 3]>>, &'static str), PipelineError> {
    let (origins, source) = if let Some(origins) = &stitch.tile_origins {
        (origins.clone(), "config")
    } else if let Some(path) = origins_file {
        (read_tile_origins(path)?, "file")
    } else if let Some(positions) = &stitch.tile_pos_yx {
        let origins = grid_origins(positions, basic.tile_sz, stitch.expected_overlap);
        (origins.into_iter().map(Some).collect(), "grid")
    } else if basic.use_tiles.len() == 1 {
        (vec![Some([0.0; 3]); basic.n_tiles], "single")
    } else {
        return Err(PipelineError::Invalid(
            "several tiles in use but no tile origins, origins file or grid positions given"
                .to_string(),
        ));
    };
    if origins.len() != basic.n_tiles {
        return Err(PipelineError::Invalid(format!(
            "{} tile origins given for {} tiles",
            origins.len(),
            basic.n_tiles
        )));
    }
    let mut out = vec![None; basic.n_tiles];
    for &t in &basic.use_tiles {
        match origins[t] {
            Some(o) if o.iter().all(|v| v.is_finite()) => out[t] = Some(o),
            _ => {
                return Err(PipelineError::Invalid(format!(
                    "tile {} is in use but has no origin",
                    t
                )));
            }
        }
    }
    Ok((out, source))
}

pub fn run_stitch(ctx: &StageContext<'_>) -> Result<Vec<NotebookPage>, PipelineError> {
    let basic = ctx.basic_info()?;
    let (tile_origin, source) = resolve_tile_origins(
        &basic,
        &ctx.config.stitch,
        ctx.config.file_names.tile_origins.as_deref(),
    )?;
    info!(source, "tile origins resolved");
    let mut page = NotebookPage::new("stitch")?;
    page.set_all(&StitchPage {
        tile_origin,
        source: source.to_string(),
    })?;
    Ok(vec![page])
}

/// Reads the registration transforms, identity where none are given.
pub fn run_register(ctx: &StageContext<'_>) -> Result<Vec<NotebookPage>, PipelineError> {
    let basic = ctx.basic_info()?;
    let n_rounds = basic.n_rounds_total();
    let path = ctx.config.file_names.transforms.as_deref();
    let transform = match path {
        Some(path) => read_transforms(path, basic.n_tiles, n_rounds, basic.n_channels)?,
        None => {
            warn!("no transforms file given, using identity registration");
            Transforms::identity(basic.n_tiles, n_rounds, basic.n_channels)
        }
    };
    let identity = Affine::identity();
    let mut n_non_identity = 0;
    for &t in &basic.use_tiles {
        for r in 0..n_rounds {
            for c in 0..basic.n_channels {
                let affine = transform.get(t, r, c);
                if affine.is_degenerate() {
                    return Err(PipelineError::Invalid(format!(
                        "transform of tile {} round {} channel {} is degenerate",
                        t, r, c
                    )));
                }
                if *affine != identity {
                    n_non_identity += 1;
                }
            }
        }
    }
    info!(n_non_identity, "registration transforms loaded");

    let mut page = NotebookPage::new("register")?;
    page.set_all(&RegisterPage { transform })?;
    let mut debug_page = NotebookPage::new("register_debug")?;
    debug_page.set_all(&RegisterDebugPage {
        source_path: path.map(path_string),
        n_non_identity,
    })?;
    Ok(vec![page, debug_page])
}
