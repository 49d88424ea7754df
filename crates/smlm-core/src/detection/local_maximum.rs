//! Local-maximum candidate detection.
//!
//! A pixel becomes a candidate when it is strictly brighter than every other
//! pixel in the `(2r+1) x (2r+1)` window centred on it, and rises more than
//! the noise threshold above the window's perimeter mean. Pixels closer than
//! `r` to the frame border cannot host a full window and are never reported.

use crate::frame::PixelBuffer;

/// Integer pixel position flagged as a possible emitter centre.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub x: usize,
    pub y: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct LocalMaximumFinder {
    noise_threshold: f32,
    intensity_floor: f32,
    kernel_radius: usize,
}

impl LocalMaximumFinder {
    pub fn new(noise_threshold: f32, intensity_floor: f32, kernel_radius: usize) -> Self {
        Self {
            noise_threshold,
            intensity_floor,
            kernel_radius,
        }
    }

    pub fn kernel_radius(&self) -> usize {
        self.kernel_radius
    }

    /// Lazily scan `buffer` in row-major order.
    pub fn candidates<'a>(&self, buffer: &'a PixelBuffer) -> Candidates<'a> {
        Candidates {
            finder: *self,
            buffer,
            x: self.kernel_radius,
            y: self.kernel_radius,
        }
    }

    /// Whether `(x, y)` qualifies as a candidate.
    pub fn is_candidate(&self, buffer: &PixelBuffer, x: usize, y: usize) -> bool {
        let r = self.kernel_radius;
        let (w, h) = (buffer.width(), buffer.height());
        if x < r || y < r || x + r >= w || y + r >= h {
            return false;
        }

        let center = buffer.get(x, y);
        if center < self.intensity_floor {
            return false;
        }

        let mut perimeter_sum = 0.0_f64;
        let mut perimeter_count = 0usize;
        for row in (y - r)..=(y + r) {
            for col in (x - r)..=(x + r) {
                if row == y && col == x {
                    continue;
                }
                let v = buffer.get(col, row);
                // Ties disqualify: an equal neighbour means no unique maximum.
                if v >= center {
                    return false;
                }
                if row == y - r || row == y + r || col == x - r || col == x + r {
                    perimeter_sum += v as f64;
                    perimeter_count += 1;
                }
            }
        }

        let background = perimeter_sum / perimeter_count.max(1) as f64;
        center as f64 - background > self.noise_threshold as f64
    }
}

/// Iterator over the candidates of one frame.
pub struct Candidates<'a> {
    finder: LocalMaximumFinder,
    buffer: &'a PixelBuffer,
    x: usize,
    y: usize,
}

impl Iterator for Candidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        let r = self.finder.kernel_radius;
        let (w, h) = (self.buffer.width(), self.buffer.height());
        if w <= 2 * r || h <= 2 * r {
            return None;
        }

        while self.y + r < h {
            while self.x + r < w {
                let (x, y) = (self.x, self.y);
                self.x += 1;
                if self.finder.is_candidate(self.buffer, x, y) {
                    return Some(Candidate { x, y });
                }
            }
            self.x = r;
            self.y += 1;
        }
        None
    }
}
