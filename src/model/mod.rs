pub mod affine;
pub mod basic;
pub mod codes;
pub mod image;
pub mod spots;

pub use affine::{Affine, Transforms};
pub use basic::BasicInfo;
pub use codes::{BledCodes, BleedMatrix, GeneCodes};
pub use image::{Image2d, Image3d};
pub use spots::SpotColours;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name} has shape {got:?}, expected {expected:?}")]
pub struct ShapeError {
    pub name: String,
    pub got: Vec<usize>,
    pub expected: Vec<usize>,
}

impl ShapeError {
    pub fn new(name: &str, got: Vec<usize>, expected: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            got,
            expected,
        }
    }
}
