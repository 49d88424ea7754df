use ndarray::Array2;
use num_traits::ToPrimitive;

use crate::error::{Result, SmlmError};

/// A single frame of raw camera samples.
///
/// Pixel values are stored as f32 in native units (ADU or photons),
/// row-major with shape = (height, width). Coordinates used throughout
/// the crate are `(x, y)` = `(column, row)`.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    data: Array2<f32>,
}

impl PixelBuffer {
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Build a buffer from a flat row-major sample slice of any numeric type.
    pub fn from_samples<T: ToPrimitive + Copy>(width: usize, samples: &[T]) -> Result<Self> {
        if width == 0 || samples.is_empty() || samples.len() % width != 0 {
            return Err(SmlmError::InvalidDimensions {
                width,
                height: if width == 0 { 0 } else { samples.len() / width },
            });
        }
        let height = samples.len() / width;
        let values = samples
            .iter()
            .enumerate()
            .map(|(index, s)| s.to_f32().ok_or(SmlmError::InvalidSample { index }))
            .collect::<Result<Vec<f32>>>()?;
        let data = Array2::from_shape_vec((height, width), values).map_err(|_| {
            SmlmError::InvalidDimensions { width, height }
        })?;
        Ok(Self { data })
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Sample at column `x`, row `y`. Panics when out of bounds.
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[[y, x]]
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    /// Convert raw counts to photons: `(value - offset) / gain`.
    pub fn calibrated(&self, offset: f32, gain: f32) -> PixelBuffer {
        PixelBuffer {
            data: self.data.mapv(|v| (v - offset) / gain),
        }
    }
}

/// Metadata about an opened frame stack.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub description: String,
    pub total_frames: usize,
    pub width: usize,
    pub height: usize,
    pub bit_depth: u8,
}
