use serde::{Deserialize, Serialize};

use crate::model::ShapeError;

/// Per-spot intensities, `[spot][round][channel]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotColours {
    pub n_spots: usize,
    pub n_rounds: usize,
    pub n_channels: usize,
    pub data: Vec<f32>,
}

impl SpotColours {
    pub fn new(n_rounds: usize, n_channels: usize) -> Self {
        Self {
            n_spots: 0,
            n_rounds,
            n_channels,
            data: Vec::new(),
        }
    }

    pub fn from_vec(
        n_spots: usize,
        n_rounds: usize,
        n_channels: usize,
        data: Vec<f32>,
    ) -> Result<Self, ShapeError> {
        if data.len() != n_spots * n_rounds * n_channels {
            return Err(ShapeError::new(
                "spot_colours",
                vec![data.len()],
                vec![n_spots, n_rounds, n_channels],
            ));
        }
        Ok(Self {
            n_spots,
            n_rounds,
            n_channels,
            data,
        })
    }

    pub fn spot_len(&self) -> usize {
        self.n_rounds * self.n_channels
    }

    pub fn spot(&self, s: usize) -> &[f32] {
        let n = self.spot_len();
        &self.data[s * n..(s + 1) * n]
    }

    pub fn spot_mut(&mut self, s: usize) -> &mut [f32] {
        let n = self.spot_len();
        &mut self.data[s * n..(s + 1) * n]
    }

    #[inline]
    pub fn get(&self, s: usize, r: usize, c: usize) -> f32 {
        self.data[(s * self.n_rounds + r) * self.n_channels + c]
    }

    #[inline]
    pub fn set(&mut self, s: usize, r: usize, c: usize, value: f32) {
        let idx = (s * self.n_rounds + r) * self.n_channels + c;
        self.data[idx] = value;
    }

    pub fn round(&self, s: usize, r: usize) -> &[f32] {
        let start = (s * self.n_rounds + r) * self.n_channels;
        &self.data[start..start + self.n_channels]
    }

    pub fn push(&mut self, colour: &[f32]) {
        debug_assert_eq!(colour.len(), self.spot_len());
        self.data.extend_from_slice(colour);
        self.n_spots += 1;
    }

    pub fn extend(&mut self, other: &SpotColours) {
        self.data.extend_from_slice(&other.data);
        self.n_spots += other.n_spots;
    }

    pub fn select(&self, keep: &[bool]) -> SpotColours {
        let mut out = SpotColours::new(self.n_rounds, self.n_channels);
        for (s, &k) in keep.iter().enumerate().take(self.n_spots) {
            if k {
                out.push(self.spot(s));
            }
        }
        out
    }
}
