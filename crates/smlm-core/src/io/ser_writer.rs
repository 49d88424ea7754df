use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, SmlmError};

use super::ser::SerHeader;

/// Writes a monochrome SER stack frame by frame.
pub struct SerWriter {
    writer: BufWriter<File>,
    header: SerHeader,
    frames_written: u32,
}

impl SerWriter {
    /// Create `path` and write `header`. Frames must follow, exactly
    /// `header.frame_count` of them.
    pub fn create(path: &Path, header: &SerHeader) -> Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&header.to_bytes())?;
        Ok(Self {
            writer,
            header: header.clone(),
            frames_written: 0,
        })
    }

    /// Write one frame of samples, row-major, `width * height` long.
    pub fn write_frame(&mut self, samples: &[u16]) -> Result<()> {
        let expected = self.header.width as usize * self.header.height as usize;
        if samples.len() != expected {
            return Err(SmlmError::InvalidDimensions {
                width: self.header.width as usize,
                height: samples.len() / (self.header.width as usize).max(1),
            });
        }
        if self.frames_written >= self.header.frame_count {
            return Err(SmlmError::InvalidSer(format!(
                "header declares {} frames",
                self.header.frame_count
            )));
        }
        for &s in samples {
            if self.header.bytes_per_pixel_plane() == 1 {
                self.writer.write_all(&[s.min(255) as u8])?;
            } else if self.header.little_endian {
                self.writer.write_all(&s.to_le_bytes())?;
            } else {
                self.writer.write_all(&s.to_be_bytes())?;
            }
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the file. Fails when fewer frames were written than the
    /// header declares.
    pub fn finalize(mut self) -> Result<()> {
        self.writer.flush()?;
        if self.frames_written != self.header.frame_count {
            return Err(SmlmError::InvalidSer(format!(
                "wrote {} of {} frames",
                self.frames_written, self.header.frame_count
            )));
        }
        Ok(())
    }
}
