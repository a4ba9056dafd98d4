use serde::{Deserialize, Serialize};

use super::{PipelineError, StageContext, path_string};
use crate::input::tile_bin::{TILE_VERSION, TileStack};
use crate::notebook::NotebookPage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractPage {
    pub file_type: String,
    /// Empty for tiles not in use.
    pub tile_paths: Vec<String>,
    pub tile_shape: [usize; 3],
    pub n_rounds_stored: usize,
}

/// Checks every tile stack in use against the first one.
pub fn run_stage2(ctx: &StageContext<'_>) -> Result<Vec<NotebookPage>, PipelineError> {
    let basic = ctx.basic_info()?;
    let mut tile_paths = vec![String::new(); basic.n_tiles];
    for &t in &basic.use_tiles {
        let path = ctx.config.file_names.tile_path(t);
        let stack = TileStack::open(&path)?;
        if stack.shape() != basic.tile_shape()
            || stack.n_rounds != basic.n_rounds_total()
            || stack.n_channels != basic.n_channels
        {
            return Err(PipelineError::Invalid(format!(
                "{} has shape {:?} with {} rounds and {} channels, expected {:?} with {} and {}",
                path.display(),
                stack.shape(),
                stack.n_rounds,
                stack.n_channels,
                basic.tile_shape(),
                basic.n_rounds_total(),
                basic.n_channels
            )));
        }
        tile_paths[t] = path_string(&path);
    }
    let extract = ExtractPage {
        file_type: format!("cftile-v{}", TILE_VERSION),
        tile_paths,
        tile_shape: basic.tile_shape(),
        n_rounds_stored: basic.n_rounds_total(),
    };
    let mut page = NotebookPage::new("extract")?;
    page.set_all(&extract)?;
    Ok(vec![page])
}
