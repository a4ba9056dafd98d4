use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::input::{InputError, open_maybe_gz};
use crate::model::{Affine, Transforms};

/// `{tile: {round: {channel: 4x3 affine}}}`, keys being decimal indices.
pub type TransformFile = BTreeMap<String, BTreeMap<String, BTreeMap<String, [[f32; 3]; 4]>>>;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let reader = open_maybe_gz(path)?;
    serde_json::from_reader(reader)
        .map_err(|e| InputError::Parse(format!("{}: {}", path.display(), e)))
}

/// Initial bleed matrix, `[n_dyes][n_channels]`.
pub fn read_bleed_matrix(path: &Path) -> Result<Vec<Vec<f32>>, InputError> {
    let matrix: Vec<Vec<f32>> = read_json(path)?;
    let n_channels = matrix.first().map_or(0, |row| row.len());
    if matrix.is_empty() || n_channels == 0 {
        return Err(InputError::InvalidInput(format!(
            "{}: bleed matrix is empty",
            path.display()
        )));
    }
    if matrix.iter().any(|row| row.len() != n_channels) {
        return Err(InputError::InvalidInput(format!(
            "{}: bleed matrix rows differ in length",
            path.display()
        )));
    }
    if matrix.iter().flatten().any(|v| !v.is_finite()) {
        return Err(InputError::InvalidInput(format!(
            "{}: bleed matrix has non-finite values",
            path.display()
        )));
    }
    Ok(matrix)
}

/// Loads registration transforms; entries absent from the file stay identity.
pub fn read_transforms(
    path: &Path,
    n_tiles: usize,
    n_rounds: usize,
    n_channels: usize,
) -> Result<Transforms, InputError> {
    let file: TransformFile = read_json(path)?;
    transforms_from_map(&file, n_tiles, n_rounds, n_channels)
}

pub fn transforms_from_map(
    file: &TransformFile,
    n_tiles: usize,
    n_rounds: usize,
    n_channels: usize,
) -> Result<Transforms, InputError> {
    let mut out = Transforms::identity(n_tiles, n_rounds, n_channels);
    for (t, rounds) in file {
        let t = parse_index(t, "tile")?;
        for (r, channels) in rounds {
            let r = parse_index(r, "round")?;
            for (c, matrix) in channels {
                let c = parse_index(c, "channel")?;
                if !out.contains(t, r, c) {
                    return Err(InputError::InvalidInput(format!(
                        "transform for tile {} round {} channel {} outside {}x{}x{}",
                        t, r, c, n_tiles, n_rounds, n_channels
                    )));
                }
                let affine = Affine(*matrix);
                if affine.is_degenerate() {
                    return Err(InputError::InvalidInput(format!(
                        "transform for tile {} round {} channel {} is degenerate",
                        t, r, c
                    )));
                }
                out.set(t, r, c, affine);
            }
        }
    }
    Ok(out)
}

/// Tile origins as `[y, x, z]`, `null` for tiles that were not imaged.
pub fn read_tile_origins(path: &Path) -> Result<Vec<Option<[f32; 3]>>, InputError> {
    read_json(path)
}

fn parse_index(key: &str, what: &str) -> Result<usize, InputError> {
    key.trim()
        .parse::<usize>()
        .map_err(|_| InputError::Parse(format!("invalid {} index `{}`", what, key)))
}
