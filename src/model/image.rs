use serde::{Deserialize, Serialize};

use crate::model::ShapeError;

/// A `y x z` volume stored row-major with z fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image3d {
    pub ny: usize,
    pub nx: usize,
    pub nz: usize,
    pub data: Vec<f32>,
}

impl Image3d {
    pub fn zeros(ny: usize, nx: usize, nz: usize) -> Self {
        Self {
            ny,
            nx,
            nz,
            data: vec![0.0; ny * nx * nz],
        }
    }

    pub fn from_vec(ny: usize, nx: usize, nz: usize, data: Vec<f32>) -> Result<Self, ShapeError> {
        if data.len() != ny * nx * nz {
            return Err(ShapeError::new("image", vec![data.len()], vec![ny, nx, nz]));
        }
        Ok(Self { ny, nx, nz, data })
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.ny, self.nx, self.nz]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn index(&self, y: usize, x: usize, z: usize) -> usize {
        (y * self.nx + x) * self.nz + z
    }

    /// Inverse of [`Image3d::index`].
    #[inline]
    pub fn position(&self, index: usize) -> [usize; 3] {
        let z = index % self.nz;
        let yx = index / self.nz;
        [yx / self.nx, yx % self.nx, z]
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize, z: usize) -> f32 {
        self.data[self.index(y, x, z)]
    }

    #[inline]
    pub fn set(&mut self, y: usize, x: usize, z: usize, value: f32) {
        let idx = self.index(y, x, z);
        self.data[idx] = value;
    }

    /// Value at a signed position, `None` outside the volume.
    #[inline]
    pub fn get_checked(&self, y: i64, x: i64, z: i64) -> Option<f32> {
        if y < 0 || x < 0 || z < 0 {
            return None;
        }
        let (y, x, z) = (y as usize, x as usize, z as usize);
        if y >= self.ny || x >= self.nx || z >= self.nz {
            return None;
        }
        Some(self.get(y, x, z))
    }

    pub fn contains(&self, yxz: [i32; 3]) -> bool {
        yxz[0] >= 0
            && yxz[1] >= 0
            && yxz[2] >= 0
            && (yxz[0] as usize) < self.ny
            && (yxz[1] as usize) < self.nx
            && (yxz[2] as usize) < self.nz
    }

    /// Copy of one z plane as a `y x` row-major image.
    pub fn z_plane(&self, z: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.ny * self.nx);
        for y in 0..self.ny {
            for x in 0..self.nx {
                out.push(self.get(y, x, z));
            }
        }
        out
    }

    pub fn set_z_plane(&mut self, z: usize, plane: &[f32]) {
        for y in 0..self.ny {
            for x in 0..self.nx {
                self.set(y, x, z, plane[y * self.nx + x]);
            }
        }
    }
}

/// A row-major `y x` plane; also used for 2D filter kernels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image2d {
    pub ny: usize,
    pub nx: usize,
    pub data: Vec<f32>,
}

impl Image2d {
    pub fn zeros(ny: usize, nx: usize) -> Self {
        Self {
            ny,
            nx,
            data: vec![0.0; ny * nx],
        }
    }

    pub fn from_vec(ny: usize, nx: usize, data: Vec<f32>) -> Result<Self, ShapeError> {
        if data.len() != ny * nx {
            return Err(ShapeError::new("plane", vec![data.len()], vec![ny, nx]));
        }
        Ok(Self { ny, nx, data })
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize) -> f32 {
        self.data[y * self.nx + x]
    }

    #[inline]
    pub fn set(&mut self, y: usize, x: usize, value: f32) {
        self.data[y * self.nx + x] = value;
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.ny, self.nx]
    }
}
