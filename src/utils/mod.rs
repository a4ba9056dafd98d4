pub mod linalg;
pub mod stats;
pub mod system;

use crate::model::ShapeError;

/// Keeps channels `use_channels` of a flat array whose last axis holds
/// `n_channels` channels. Output channel `i` is input channel
/// `use_channels[i]`.
pub fn select_channels(
    array: &[f32],
    n_channels: usize,
    use_channels: &[usize],
) -> Result<Vec<f32>, ShapeError> {
    if let Some(&c) = use_channels.iter().find(|&&c| c >= n_channels) {
        return Err(ShapeError::new("use_channels", vec![c + 1], vec![n_channels]));
    }
    if n_channels == 0 {
        return Ok(Vec::new());
    }
    if array.len() % n_channels != 0 {
        return Err(ShapeError::new(
            "array",
            vec![array.len()],
            vec![array.len() / n_channels * n_channels],
        ));
    }
    Ok(array
        .chunks_exact(n_channels)
        .flat_map(|row| use_channels.iter().map(|&c| row[c]))
        .collect())
}

#[cfg(test)]
#[path = "../../tests/src_inline/utils/mod.rs"]
mod tests;
