use tracing::info;

use super::{PipelineError, StageContext};
use crate::config::Config;
use crate::input::tile_bin::TileStack;
use crate::model::BasicInfo;
use crate::notebook::NotebookPage;

/// Resolves use lists and the anchor, and reads the tile shape from the
/// first tile in use.
pub fn build_basic_info(config: &Config) -> Result<BasicInfo, PipelineError> {
    let b = &config.basic_info;
    let use_tiles = b
        .use_tiles
        .clone()
        .unwrap_or_else(|| (0..b.n_tiles).collect());
    let use_rounds = b
        .use_rounds
        .clone()
        .unwrap_or_else(|| (0..b.n_rounds).collect());
    let use_channels = b.use_channels.clone().unwrap_or_else(|| {
        (0..b.n_channels)
            .filter(|&c| Some(c) != b.dapi_channel)
            .collect()
    });
    let use_anchor = b.anchor_channel.is_some();
    let anchor_round = use_anchor.then_some(b.n_rounds);

    let first = use_tiles
        .first()
        .copied()
        .ok_or_else(|| PipelineError::Invalid("no tiles in use".to_string()))?;
    let stack = TileStack::open(&config.file_names.tile_path(first))?;
    let [ny, nx, nz] = stack.shape();
    if ny != nx {
        return Err(PipelineError::Invalid(format!(
            "tiles must be square in y and x, got {}x{}",
            ny, nx
        )));
    }
    let n_rounds_total = b.n_rounds + usize::from(use_anchor);
    if stack.n_rounds != n_rounds_total || stack.n_channels != b.n_channels {
        return Err(PipelineError::Invalid(format!(
            "{} stores {} rounds and {} channels, expected {} and {}",
            stack.path.display(),
            stack.n_rounds,
            stack.n_channels,
            n_rounds_total,
            b.n_channels
        )));
    }

    Ok(BasicInfo {
        n_tiles: b.n_tiles,
        n_rounds: b.n_rounds,
        n_channels: b.n_channels,
        use_tiles,
        use_rounds,
        use_channels,
        use_anchor,
        anchor_round,
        anchor_channel: b.anchor_channel,
        dapi_channel: b.dapi_channel,
        tile_sz: ny,
        nz,
        tile_centre: BasicInfo::centre_of(ny, nz),
        pixel_size_xy: b.pixel_size_xy,
        pixel_size_z: b.pixel_size_z,
        bad_trc: b.bad_trc.clone(),
    })
}

pub fn run_stage1(ctx: &StageContext<'_>) -> Result<Vec<NotebookPage>, PipelineError> {
    let basic = build_basic_info(ctx.config)?;
    info!(
        n_tiles = basic.use_tiles.len(),
        n_rounds = basic.n_rounds_use(),
        n_channels = basic.n_channels_use(),
        tile_sz = basic.tile_sz,
        nz = basic.nz,
        "basic info"
    );
    let mut page = NotebookPage::new("basic_info")?;
    page.set_all(&basic)?;
    Ok(vec![page])
}
