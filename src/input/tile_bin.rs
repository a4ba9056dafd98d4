use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::input::InputError;
use crate::model::Image3d;

pub const TILE_MAGIC: &[u8; 8] = b"CFTILE\0\0";
pub const TILE_VERSION: u32 = 1;
const HEADER_BYTES: usize = 8 + 6 * 4;

/// Memory-mapped stack of every round and channel of one tile.
///
/// Voxels are little-endian `f32` in `[round][channel][y][x][z]` order.
#[derive(Debug)]
pub struct TileStack {
    pub path: PathBuf,
    pub n_rounds: usize,
    pub n_channels: usize,
    pub ny: usize,
    pub nx: usize,
    pub nz: usize,
    mmap: Mmap,
}

impl TileStack {
    pub fn open(path: &Path) -> Result<Self, InputError> {
        if !path.exists() {
            return Err(InputError::MissingInput(format!(
                "tile file {}",
                path.display()
            )));
        }
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let bytes = &mmap[..];
        if bytes.len() < HEADER_BYTES {
            return Err(InputError::InvalidInput(format!(
                "{} too small for a tile header",
                path.display()
            )));
        }
        if &bytes[0..8] != TILE_MAGIC {
            return Err(InputError::InvalidInput(format!(
                "{}: invalid magic; expected CFTILE",
                path.display()
            )));
        }
        let version = read_u32(bytes, 8);
        if version != TILE_VERSION {
            return Err(InputError::InvalidInput(format!(
                "{}: unsupported tile version {}",
                path.display(),
                version
            )));
        }
        let n_rounds = read_u32(bytes, 12) as usize;
        let n_channels = read_u32(bytes, 16) as usize;
        let ny = read_u32(bytes, 20) as usize;
        let nx = read_u32(bytes, 24) as usize;
        let nz = read_u32(bytes, 28) as usize;

        let n_voxels = [n_rounds, n_channels, ny, nx, nz, 4]
            .iter()
            .try_fold(1usize, |acc, &v| acc.checked_mul(v))
            .ok_or_else(|| InputError::InvalidInput("tile size overflow".to_string()))?;
        if HEADER_BYTES + n_voxels != bytes.len() {
            return Err(InputError::InvalidInput(format!(
                "{}: file length {} does not match header shape {}x{}x{}x{}x{}",
                path.display(),
                bytes.len(),
                n_rounds,
                n_channels,
                ny,
                nx,
                nz
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            n_rounds,
            n_channels,
            ny,
            nx,
            nz,
            mmap,
        })
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.ny, self.nx, self.nz]
    }

    fn image_offset(&self, r: usize, c: usize) -> usize {
        HEADER_BYTES + (r * self.n_channels + c) * self.ny * self.nx * self.nz * 4
    }

    fn check_rc(&self, r: usize, c: usize) -> Result<(), InputError> {
        if r >= self.n_rounds || c >= self.n_channels {
            return Err(InputError::InvalidInput(format!(
                "{}: round {} channel {} outside stack of {} rounds and {} channels",
                self.path.display(),
                r,
                c,
                self.n_rounds,
                self.n_channels
            )));
        }
        Ok(())
    }

    pub fn image(&self, r: usize, c: usize) -> Result<Image3d, InputError> {
        self.check_rc(r, c)?;
        let n = self.ny * self.nx * self.nz;
        let start = self.image_offset(r, c);
        let data = self.mmap[start..start + n * 4]
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Image3d::from_vec(self.ny, self.nx, self.nz, data)
            .map_err(|e| InputError::InvalidInput(e.to_string()))
    }
}

/// Writes `images[round][channel]`; every image must share one shape.
pub fn write_tile_stack(path: &Path, images: &[Vec<Image3d>]) -> Result<(), InputError> {
    let n_rounds = images.len();
    let n_channels = images.first().map_or(0, |r| r.len());
    let shape = images
        .first()
        .and_then(|r| r.first())
        .map(|im| im.shape())
        .ok_or_else(|| InputError::InvalidInput("empty tile stack".to_string()))?;
    for round in images {
        if round.len() != n_channels || round.iter().any(|im| im.shape() != shape) {
            return Err(InputError::InvalidInput(
                "tile stack images differ in shape".to_string(),
            ));
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(TILE_MAGIC)?;
    write_u32(&mut file, TILE_VERSION)?;
    write_u32(&mut file, n_rounds as u32)?;
    write_u32(&mut file, n_channels as u32)?;
    for dim in shape {
        write_u32(&mut file, dim as u32)?;
    }
    for round in images {
        for image in round {
            for &v in &image.data {
                file.write_all(&v.to_le_bytes())?;
            }
        }
    }
    file.flush()?;
    Ok(())
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<(), InputError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tile_bin.rs"]
mod tests;
