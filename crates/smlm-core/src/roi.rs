use serde::{Deserialize, Serialize};

use crate::error::{Result, SmlmError};

/// Spatial predicate restricting which candidates get fitted.
pub trait Region: Send + Sync {
    fn contains(&self, x: usize, y: usize) -> bool;
}

/// A rectangle in image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl RoiRect {
    /// Check that the rectangle is non-empty and fits inside the frame.
    pub fn validated(&self, frame_width: usize, frame_height: usize) -> Result<RoiRect> {
        if self.width == 0 || self.height == 0 {
            return Err(SmlmError::InvalidRoi(
                "ROI width and height must be > 0".into(),
            ));
        }
        if self.x + self.width > frame_width || self.y + self.height > frame_height {
            return Err(SmlmError::InvalidRoi(format!(
                "ROI ({},{} {}x{}) exceeds frame dimensions ({frame_width}x{frame_height})",
                self.x, self.y, self.width, self.height
            )));
        }
        Ok(*self)
    }
}

impl Region for RoiRect {
    fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

impl std::str::FromStr for RoiRect {
    type Err = SmlmError;

    /// Parse `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<usize> = s
            .split(',')
            .map(|p| p.trim().parse::<usize>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| SmlmError::InvalidRoi(format!("{s:?}: {e}")))?;
        match parts.as_slice() {
            &[x, y, width, height] => Ok(RoiRect {
                x,
                y,
                width,
                height,
            }),
            _ => Err(SmlmError::InvalidRoi(format!(
                "expected x,y,width,height but got {s:?}"
            ))),
        }
    }
}
