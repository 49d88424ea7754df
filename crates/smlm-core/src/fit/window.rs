use ndarray::Array2;

use crate::detection::Candidate;
use crate::frame::PixelBuffer;

/// Square neighbourhood of a candidate, copied out of the frame as f64.
///
/// Positions are absolute image coordinates; pixel `(i, j)` covers
/// `[i - 0.5, i + 0.5] x [j - 0.5, j + 0.5]`.
#[derive(Clone, Debug)]
pub struct SubWindow {
    data: Array2<f64>,
    x0: usize,
    y0: usize,
    center: Candidate,
}

impl SubWindow {
    /// Copy the `(2r+1)`-wide window around `center`, clipped to the frame.
    pub fn extract(buffer: &PixelBuffer, center: Candidate, radius: usize) -> Option<Self> {
        let (w, h) = (buffer.width(), buffer.height());
        if center.x >= w || center.y >= h {
            return None;
        }
        let x0 = center.x.saturating_sub(radius);
        let y0 = center.y.saturating_sub(radius);
        let x1 = (center.x + radius).min(w - 1);
        let y1 = (center.y + radius).min(h - 1);

        let data = Array2::from_shape_fn((y1 - y0 + 1, x1 - x0 + 1), |(row, col)| {
            buffer.get(x0 + col, y0 + row) as f64
        });
        Some(Self {
            data,
            x0,
            y0,
            center,
        })
    }

    /// Wrap already-extracted data whose top-left pixel sits at `(x0, y0)`.
    pub fn from_array(data: Array2<f64>, x0: usize, y0: usize, center: Candidate) -> Self {
        Self {
            data,
            x0,
            y0,
            center,
        }
    }

    pub fn center(&self) -> Candidate {
        self.center
    }

    pub fn origin(&self) -> (usize, usize) {
        (self.x0, self.y0)
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Iterate `(x, y, value)` in absolute coordinates.
    pub fn pixels(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.data.indexed_iter().map(move |((row, col), &v)| {
            ((self.x0 + col) as f64, (self.y0 + row) as f64, v)
        })
    }

    /// Whether a fitted position falls on one of the window's pixels.
    pub fn contains_position(&self, x: f64, y: f64) -> bool {
        let x_min = self.x0 as f64 - 0.5;
        let y_min = self.y0 as f64 - 0.5;
        let x_max = (self.x0 + self.width()) as f64 - 0.5;
        let y_max = (self.y0 + self.height()) as f64 - 0.5;
        x >= x_min && x <= x_max && y >= y_min && y <= y_max
    }

    /// Mean of the outermost ring of pixels, used as a background estimate.
    pub fn perimeter_mean(&self) -> f64 {
        let (h, w) = self.data.dim();
        let mut sum = 0.0;
        let mut count = 0usize;
        for ((row, col), &v) in self.data.indexed_iter() {
            if row == 0 || col == 0 || row + 1 == h || col + 1 == w {
                sum += v;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}
