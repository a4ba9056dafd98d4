use serde::{Deserialize, Serialize};

/// Experiment layout shared by every stage.
///
/// Round indices below `n_rounds` are sequencing rounds; the anchor round,
/// when used, is the index `n_rounds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub n_tiles: usize,
    pub n_rounds: usize,
    pub n_channels: usize,
    pub use_tiles: Vec<usize>,
    pub use_rounds: Vec<usize>,
    pub use_channels: Vec<usize>,
    pub use_anchor: bool,
    pub anchor_round: Option<usize>,
    pub anchor_channel: Option<usize>,
    pub dapi_channel: Option<usize>,
    pub tile_sz: usize,
    pub nz: usize,
    pub tile_centre: [f32; 3],
    pub pixel_size_xy: f32,
    pub pixel_size_z: f32,
    pub bad_trc: Vec<[usize; 3]>,
}

impl BasicInfo {
    pub fn tile_shape(&self) -> [usize; 3] {
        [self.tile_sz, self.tile_sz, self.nz]
    }

    pub fn n_rounds_use(&self) -> usize {
        self.use_rounds.len()
    }

    pub fn n_channels_use(&self) -> usize {
        self.use_channels.len()
    }

    /// Rounds stored in a tile stack: sequencing rounds plus the anchor.
    pub fn n_rounds_total(&self) -> usize {
        self.n_rounds + usize::from(self.use_anchor)
    }

    pub fn is_bad_trc(&self, t: usize, r: usize, c: usize) -> bool {
        self.bad_trc.iter().any(|trc| *trc == [t, r, c])
    }

    pub fn centre_of(tile_sz: usize, nz: usize) -> [f32; 3] {
        let yx = (tile_sz as f32 - 1.0) / 2.0;
        [yx, yx, (nz as f32 - 1.0) / 2.0]
    }
}
