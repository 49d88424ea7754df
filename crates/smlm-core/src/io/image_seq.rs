use std::path::{Path, PathBuf};

use image::{ColorType, DynamicImage};

use crate::error::{Result, SmlmError};
use crate::frame::{PixelBuffer, SourceInfo};

use super::FrameProvider;

const FRAME_EXTENSIONS: [&str; 3] = ["tif", "tiff", "png"];

/// A stack stored as one grayscale image file per frame.
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    width: usize,
    height: usize,
    bit_depth: u8,
}

impl ImageSequence {
    /// Use `paths` in the given order; dimensions and depth come from the
    /// first file.
    pub fn open(paths: Vec<PathBuf>) -> Result<Self> {
        let first = paths.first().ok_or(SmlmError::EmptySequence)?;
        let img = image::open(first)?;
        let bit_depth = match img.color() {
            ColorType::L8 => 8,
            _ => 16,
        };
        Ok(Self {
            width: img.width() as usize,
            height: img.height() as usize,
            bit_depth,
            paths,
        })
    }

    /// All TIFF/PNG files in `dir`, sorted by file name.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        paths.sort();
        Self::open(paths)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn source_info(&self, dir: &Path) -> SourceInfo {
        SourceInfo {
            description: format!("{} ({} image files)", dir.display(), self.paths.len()),
            total_frames: self.paths.len(),
            width: self.width,
            height: self.height,
            bit_depth: self.bit_depth,
        }
    }
}

impl FrameProvider for ImageSequence {
    fn frame_count(&self) -> usize {
        self.paths.len()
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn get_pixels(&mut self, index: usize) -> Result<PixelBuffer> {
        let path = self.paths.get(index).ok_or(SmlmError::FrameIndexOutOfRange {
            index,
            total: self.paths.len(),
        })?;
        let img = image::open(path)
            .map_err(|e| SmlmError::FrameAccess {
                index,
                reason: format!("{}: {e}", path.display()),
            })?;
        if img.width() as usize != self.width || img.height() as usize != self.height {
            return Err(SmlmError::FrameAccess {
                index,
                reason: format!(
                    "{} is {}x{}, expected {}x{}",
                    path.display(),
                    img.width(),
                    img.height(),
                    self.width,
                    self.height
                ),
            });
        }
        // 8- and 16-bit grayscale keep their raw counts. Color and float
        // files go through the `image` luma conversion at 16 bits.
        match img {
            DynamicImage::ImageLuma8(buf) => PixelBuffer::from_samples(self.width, buf.as_raw()),
            DynamicImage::ImageLuma16(buf) => PixelBuffer::from_samples(self.width, buf.as_raw()),
            other => PixelBuffer::from_samples(self.width, other.into_luma16().as_raw()),
        }
    }
}
