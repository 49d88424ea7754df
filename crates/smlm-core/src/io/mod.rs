pub mod image_seq;
pub mod ser;
pub mod ser_writer;

use crate::error::{Result, SmlmError};
use crate::frame::PixelBuffer;

/// Source of frame pixels for the pipeline.
///
/// Readers may keep decoder state between calls, hence `&mut self`; the
/// pipeline serializes access when it reads from several threads.
pub trait FrameProvider {
    fn frame_count(&self) -> usize;

    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Samples of frame `index` (0-based).
    fn get_pixels(&mut self, index: usize) -> Result<PixelBuffer>;
}

impl<P: FrameProvider + ?Sized> FrameProvider for Box<P> {
    fn frame_count(&self) -> usize {
        (**self).frame_count()
    }

    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }

    fn get_pixels(&mut self, index: usize) -> Result<PixelBuffer> {
        (**self).get_pixels(index)
    }
}

/// Frames already held in memory.
#[derive(Clone, Debug)]
pub struct InMemoryStack {
    frames: Vec<PixelBuffer>,
    width: usize,
    height: usize,
}

impl InMemoryStack {
    /// All frames must share the dimensions of the first one.
    pub fn new(frames: Vec<PixelBuffer>) -> Result<Self> {
        let first = frames.first().ok_or(SmlmError::EmptySequence)?;
        let (width, height) = (first.width(), first.height());
        if let Some(bad) = frames
            .iter()
            .find(|f| f.width() != width || f.height() != height)
        {
            return Err(SmlmError::InvalidDimensions {
                width: bad.width(),
                height: bad.height(),
            });
        }
        Ok(Self {
            frames,
            width,
            height,
        })
    }
}

impl FrameProvider for InMemoryStack {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn get_pixels(&mut self, index: usize) -> Result<PixelBuffer> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(SmlmError::FrameIndexOutOfRange {
                index,
                total: self.frames.len(),
            })
    }
}
