use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::stage3_filter::INVALID_AUTO_THRESH;
use super::{PipelineError, StageContext};
use crate::indexing::{self, IndexOptions};
use crate::notebook::NotebookPage;
use crate::omp::{detect_spots, isolated_spots, limit_spots_per_z};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindSpotsPage {
    /// `[tile][round][channel][spot]`.
    pub spot_yxz: Vec<Vec<Vec<Vec<[i32; 3]>>>>,
    /// `[tile][round][channel]`.
    pub spot_no: Vec<Vec<Vec<usize>>>,
    /// `[tile][anchor spot]`, empty without an anchor.
    pub isolated_spots: Vec<Vec<bool>>,
}

/// Detects spots on every filtered sequencing and anchor image.
pub fn run_stage4(ctx: &StageContext<'_>) -> Result<Vec<NotebookPage>, PipelineError> {
    let basic = ctx.basic_info()?;
    let config = &ctx.config.find_spots;
    let auto_thresh: Vec<Vec<Vec<f32>>> = ctx.nb.get("filter", "auto_thresh")?;
    let n_rounds_total = basic.n_rounds_total();
    let indices = indexing::create(
        &basic,
        IndexOptions {
            include_anchor_round: true,
            include_anchor_channel: true,
            include_bad_trc: false,
            ..IndexOptions::default()
        },
    );

    let anchor_images = indexing::create(
        &basic,
        IndexOptions {
            include_bad_trc: false,
            ..IndexOptions::anchor_only()
        },
    );

    let mut spot_yxz = vec![vec![vec![Vec::new(); basic.n_channels]; n_rounds_total]; basic.n_tiles];
    let mut spot_no = vec![vec![vec![0usize; basic.n_channels]; n_rounds_total]; basic.n_tiles];
    let mut isolated = vec![Vec::new(); basic.n_tiles];

    for t in indexing::project_tile(&indices) {
        let stack = ctx.filtered_stack(t)?;
        let todo = indexing::images_for_tile(&indices, t);
        let found: Vec<([usize; 2], Vec<[i32; 3]>)> = todo
            .par_iter()
            .map(|&[r, c]| -> Result<_, PipelineError> {
                let thresh = auto_thresh[t][r][c];
                if thresh == INVALID_AUTO_THRESH {
                    return Ok(([r, c], Vec::new()));
                }
                let image = stack.image(r, c)?;
                let (yxz, values) =
                    detect_spots(&image, thresh, config.radius_xy, config.radius_z)?;
                let (yxz, _) = limit_spots_per_z(&yxz, &values, config.max_spots_per_z);
                Ok(([r, c], yxz))
            })
            .collect::<Result<_, _>>()?;
        for ([r, c], yxz) in found {
            if yxz.is_empty() {
                warn!(tile = t, round = r, channel = c, "no spots found");
            }
            spot_no[t][r][c] = yxz.len();
            spot_yxz[t][r][c] = yxz;
        }
        for &[_, r, c] in anchor_images.iter().filter(|trc| trc[0] == t) {
            isolated[t] = isolated_spots(
                &spot_yxz[t][r][c],
                config.isolation_radius_xy,
                config.isolation_radius_z,
            );
        }
        info!(
            tile = t,
            n_spots = spot_no[t].iter().flatten().sum::<usize>(),
            "found spots"
        );
    }

    let mut page = NotebookPage::new("find_spots")?;
    page.set_all(&FindSpotsPage {
        spot_yxz,
        spot_no,
        isolated_spots: isolated,
    })?;
    Ok(vec![page])
}
