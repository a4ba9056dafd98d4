//! Stages run in order, each adding its notebook pages.

pub mod stage1_basic_info;
pub mod stage2_extract;
pub mod stage3_filter;
pub mod stage4_find_spots;
pub mod stage5_stitch_register;
pub mod stage6_ref_spots;
pub mod stage7_call_spots;
pub mod stage8_omp;
pub mod stage9_thresholds;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::call_spots::CallSpotsError;
use crate::config::{Config, ConfigError};
use crate::input::InputError;
use crate::input::tile_bin::TileStack;
use crate::model::{BasicInfo, ShapeError, SpotColours, Transforms};
use crate::morphology::MorphologyError;
use crate::notebook::{Notebook, NotebookError, NotebookPage};
use crate::omp::OmpError;
use crate::report::{self, ReportError};
use crate::spot_colours::get_spot_colours;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Notebook(#[from] NotebookError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    CallSpots(#[from] CallSpotsError),
    #[error(transparent)]
    Omp(#[from] OmpError),
    #[error(transparent)]
    Morphology(#[from] MorphologyError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// What every stage can read.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub config: &'a Config,
    pub nb: &'a Notebook,
}

impl StageContext<'_> {
    pub fn basic_info(&self) -> Result<BasicInfo, PipelineError> {
        Ok(self.nb.page("basic_info")?.get_all()?)
    }

    pub fn transforms(&self) -> Result<Transforms, PipelineError> {
        Ok(self.nb.get("register", "transform")?)
    }

    pub fn filtered_stack(&self, tile: usize) -> Result<TileStack, PipelineError> {
        let paths: Vec<String> = self.nb.get("filter", "filtered_paths")?;
        let path = paths
            .get(tile)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PipelineError::Invalid(format!("tile {} was not filtered", tile)))?;
        Ok(TileStack::open(Path::new(path))?)
    }
}

type Stage = fn(&StageContext<'_>) -> Result<Vec<NotebookPage>, PipelineError>;

/// Stage name with the pages it adds, in run order.
const STAGES: &[(&str, &[&str], Stage)] = &[
    ("basic info", &["basic_info"], stage1_basic_info::run_stage1),
    ("extract", &["extract"], stage2_extract::run_stage2),
    ("filter", &["filter", "filter_debug"], stage3_filter::run_stage3),
    ("find spots", &["find_spots"], stage4_find_spots::run_stage4),
    ("stitch", &["stitch"], stage5_stitch_register::run_stitch),
    (
        "register",
        &["register", "register_debug"],
        stage5_stitch_register::run_register,
    ),
    ("reference spots", &["ref_spots"], stage6_ref_spots::run_stage6),
    ("call spots", &["call_spots"], stage7_call_spots::run_stage7),
    ("omp", &["omp"], stage8_omp::run_stage8),
    ("thresholds", &["thresholds"], stage9_thresholds::run_stage9),
];

/// Runs every stage whose pages are missing, then writes the reports.
pub fn run_pipeline(config_path: &Path) -> Result<Notebook, PipelineError> {
    let config = Config::load(config_path)?;
    let mut nb = Notebook::open(&config.file_names.notebook_dir, Some(config_path))?;
    for &(stage, pages, run) in STAGES {
        let mut present = Vec::new();
        for page in pages {
            if nb.has_page(page)? {
                present.push(*page);
            }
        }
        if present.len() == pages.len() {
            warn!(stage, "pages already in notebook, skipping stage");
            continue;
        }
        if !present.is_empty() {
            return Err(PipelineError::Invalid(format!(
                "stage {} is partially complete: only {:?} present",
                stage, present
            )));
        }
        info!(stage, "running stage");
        let new_pages = run(&StageContext {
            config: &config,
            nb: &nb,
        })?;
        for page in new_pages {
            nb.add_page(page)?;
        }
    }
    let out_dir = config.file_names.output_dir();
    report::write_reports(&nb, &out_dir)?;
    info!(dir = %out_dir.display(), "reports written");
    Ok(nb)
}

/// Registered colours of `yxz` in every round and channel in use,
/// `[point][round][channel]`.
pub fn gather_colours(
    basic: &BasicInfo,
    stack: &TileStack,
    tile: usize,
    yxz: &[[i32; 3]],
    transforms: &Transforms,
) -> Result<SpotColours, InputError> {
    let n_rounds = basic.n_rounds_use();
    let n_channels = basic.n_channels_use();
    let mut data = vec![0f32; yxz.len() * n_rounds * n_channels];
    for (ri, &r) in basic.use_rounds.iter().enumerate() {
        let round = get_spot_colours(
            stack,
            tile,
            r,
            &basic.use_channels,
            basic.dapi_channel,
            yxz,
            transforms,
        )?;
        for p in 0..yxz.len() {
            let dst = (p * n_rounds + ri) * n_channels;
            data[dst..dst + n_channels]
                .copy_from_slice(&round[p * n_channels..(p + 1) * n_channels]);
        }
    }
    SpotColours::from_vec(yxz.len(), n_rounds, n_channels, data)
        .map_err(|e| InputError::InvalidInput(e.to_string()))
}

pub(crate) fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn path_string(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/mod.rs"]
mod tests;
