use serde::{Deserialize, Serialize};

/// Affine transform acting on row vectors: `[y x z 1] . A` with `A` being
/// `4 x 3`. The last row is the shift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine(pub [[f32; 3]; 4]);

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    pub fn identity() -> Self {
        Self::from_shift([0.0; 3])
    }

    pub fn from_shift(shift: [f32; 3]) -> Self {
        Affine([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], shift])
    }

    #[inline]
    pub fn apply(&self, p: [f32; 3]) -> [f32; 3] {
        let m = &self.0;
        let mut out = [0f32; 3];
        for (j, o) in out.iter_mut().enumerate() {
            *o = p[0] * m[0][j] + p[1] * m[1][j] + p[2] * m[2][j] + m[3][j];
        }
        out
    }

    /// A transform whose linear part is all zero cannot map anything.
    pub fn is_degenerate(&self) -> bool {
        self.0[..3].iter().all(|row| row.iter().all(|&v| v == 0.0))
    }
}

/// One affine per (tile, round, channel), identity unless set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transforms {
    pub n_tiles: usize,
    pub n_rounds: usize,
    pub n_channels: usize,
    pub affines: Vec<Affine>,
}

impl Transforms {
    pub fn identity(n_tiles: usize, n_rounds: usize, n_channels: usize) -> Self {
        Self {
            n_tiles,
            n_rounds,
            n_channels,
            affines: vec![Affine::identity(); n_tiles * n_rounds * n_channels],
        }
    }

    #[inline]
    fn offset(&self, t: usize, r: usize, c: usize) -> usize {
        (t * self.n_rounds + r) * self.n_channels + c
    }

    pub fn get(&self, t: usize, r: usize, c: usize) -> &Affine {
        &self.affines[self.offset(t, r, c)]
    }

    pub fn set(&mut self, t: usize, r: usize, c: usize, affine: Affine) {
        let idx = self.offset(t, r, c);
        self.affines[idx] = affine;
    }

    pub fn contains(&self, t: usize, r: usize, c: usize) -> bool {
        t < self.n_tiles && r < self.n_rounds && c < self.n_channels
    }
}
