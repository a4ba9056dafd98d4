use serde::{Deserialize, Serialize};

use crate::model::ShapeError;

/// Gene names with their per-round dye index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneCodes {
    pub names: Vec<String>,
    pub codes: Vec<Vec<u8>>,
}

impl GeneCodes {
    pub fn n_genes(&self) -> usize {
        self.names.len()
    }

    pub fn n_rounds(&self) -> usize {
        self.codes.first().map_or(0, |c| c.len())
    }

    pub fn max_dye(&self) -> Option<u8> {
        self.codes.iter().flat_map(|c| c.iter().copied()).max()
    }

    pub fn code_string(&self, g: usize) -> String {
        self.codes[g]
            .iter()
            .map(|&d| char::from_digit(u32::from(d), 10).unwrap_or('?'))
            .collect()
    }
}

/// Expected intensity of dye `d` in round `r` is a multiple of
/// `bleed[r, :, d]`. Stored `[round][channel][dye]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BleedMatrix {
    pub n_rounds: usize,
    pub n_channels: usize,
    pub n_dyes: usize,
    pub data: Vec<f32>,
}

impl BleedMatrix {
    /// Repeats a `[dye][channel]` matrix for every round.
    pub fn from_dye_channel(dye_channel: &[Vec<f32>], n_rounds: usize) -> Result<Self, ShapeError> {
        let n_dyes = dye_channel.len();
        let n_channels = dye_channel.first().map_or(0, |r| r.len());
        if dye_channel.iter().any(|row| row.len() != n_channels) {
            return Err(ShapeError::new(
                "initial_bleed_matrix",
                dye_channel.iter().map(|r| r.len()).collect(),
                vec![n_dyes, n_channels],
            ));
        }
        let mut data = vec![0f32; n_rounds * n_channels * n_dyes];
        for r in 0..n_rounds {
            for c in 0..n_channels {
                for d in 0..n_dyes {
                    data[(r * n_channels + c) * n_dyes + d] = dye_channel[d][c];
                }
            }
        }
        Ok(Self {
            n_rounds,
            n_channels,
            n_dyes,
            data,
        })
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize, d: usize) -> f32 {
        self.data[(r * self.n_channels + c) * self.n_dyes + d]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, d: usize, value: f32) {
        self.data[(r * self.n_channels + c) * self.n_dyes + d] = value;
    }

    /// Channel vector of dye `d` in round `r`.
    pub fn dye_vector(&self, r: usize, d: usize) -> Vec<f32> {
        (0..self.n_channels).map(|c| self.get(r, c, d)).collect()
    }

    pub fn set_dye_vector(&mut self, r: usize, d: usize, values: &[f32]) {
        for (c, &v) in values.iter().enumerate().take(self.n_channels) {
            self.set(r, c, d, v);
        }
    }
}

/// Expected colour of each gene, `[gene][round][channel]`, unit L2 norm per gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BledCodes {
    pub n_genes: usize,
    pub n_rounds: usize,
    pub n_channels: usize,
    pub data: Vec<f32>,
}

impl BledCodes {
    pub fn code_len(&self) -> usize {
        self.n_rounds * self.n_channels
    }

    pub fn code(&self, g: usize) -> &[f32] {
        let n = self.code_len();
        &self.data[g * n..(g + 1) * n]
    }

    #[inline]
    pub fn get(&self, g: usize, r: usize, c: usize) -> f32 {
        self.data[(g * self.n_rounds + r) * self.n_channels + c]
    }

    /// Round `r` of gene `g` as a channel vector.
    pub fn round(&self, g: usize, r: usize) -> &[f32] {
        let start = (g * self.n_rounds + r) * self.n_channels;
        &self.data[start..start + self.n_channels]
    }
}
