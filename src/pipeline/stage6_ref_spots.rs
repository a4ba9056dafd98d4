use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{PipelineError, StageContext, gather_colours};
use crate::call_spots::get_non_duplicate;
use crate::model::{BasicInfo, SpotColours, Transforms};
use crate::notebook::NotebookPage;
use crate::spot_colours::apply_transform;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefSpotsPage {
    pub local_yxz: Vec<[i32; 3]>,
    pub isolated: Vec<bool>,
    pub tile: Vec<usize>,
    pub colours: SpotColours,
}

/// Whether each anchor-frame position of `tile` lands inside the tile in
/// every round and channel in use.
pub fn in_range_all_rounds(
    basic: &BasicInfo,
    transforms: &Transforms,
    tile: usize,
    yxz: &[[i32; 3]],
) -> Vec<bool> {
    let mut keep = vec![true; yxz.len()];
    for &r in &basic.use_rounds {
        for &c in &basic.use_channels {
            let (_, inside) = apply_transform(yxz, None, transforms.get(tile, r, c), basic.tile_shape());
            for (k, ok) in keep.iter_mut().zip(inside) {
                *k &= ok;
            }
        }
    }
    keep
}

/// Anchor spots that are not duplicated on an overlapping tile, with their
/// registered colours.
pub fn run_stage6(ctx: &StageContext<'_>) -> Result<Vec<NotebookPage>, PipelineError> {
    let basic = ctx.basic_info()?;
    let (Some(anchor_round), Some(anchor_channel)) = (basic.anchor_round, basic.anchor_channel)
    else {
        return Err(PipelineError::Invalid(
            "reference spots need an anchor round and channel".to_string(),
        ));
    };
    let spot_yxz: Vec<Vec<Vec<Vec<[i32; 3]>>>> = ctx.nb.get("find_spots", "spot_yxz")?;
    let isolated_all: Vec<Vec<bool>> = ctx.nb.get("find_spots", "isolated_spots")?;
    let tile_origin: Vec<Option<[f32; 3]>> = ctx.nb.get("stitch", "tile_origin")?;
    let transforms = ctx.transforms()?;
    let origins: Vec<[f32; 3]> = tile_origin
        .iter()
        .map(|o| o.unwrap_or([f32::NAN; 3]))
        .collect();

    let mut out = RefSpotsPage {
        local_yxz: Vec::new(),
        isolated: Vec::new(),
        tile: Vec::new(),
        colours: SpotColours::new(basic.n_rounds_use(), basic.n_channels_use()),
    };
    for &t in &basic.use_tiles {
        let anchor = &spot_yxz[t][anchor_round][anchor_channel];
        let isolated = &isolated_all[t];
        let spot_tile = vec![t; anchor.len()];
        let non_duplicate =
            get_non_duplicate(&origins, &basic.use_tiles, basic.tile_centre, anchor, &spot_tile)?;
        let in_range = in_range_all_rounds(&basic, &transforms, t, anchor);
        let keep: Vec<usize> = (0..anchor.len())
            .filter(|&i| non_duplicate[i] && in_range[i])
            .collect();
        if keep.is_empty() {
            warn!(tile = t, "no reference spots kept");
            continue;
        }
        let yxz: Vec<[i32; 3]> = keep.iter().map(|&i| anchor[i]).collect();
        let stack = ctx.filtered_stack(t)?;
        let colours = gather_colours(&basic, &stack, t, &yxz, &transforms)?;
        info!(
            tile = t,
            n_anchor = anchor.len(),
            n_kept = yxz.len(),
            "gathered reference spot colours"
        );
        out.isolated
            .extend(keep.iter().map(|&i| isolated.get(i).copied().unwrap_or(false)));
        out.tile.extend(std::iter::repeat_n(t, yxz.len()));
        out.local_yxz.extend(yxz);
        out.colours.extend(&colours);
    }

    let mut page = NotebookPage::new("ref_spots")?;
    page.set_all(&out)?;
    Ok(vec![page])
}
