use std::fs::File;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;

use crate::error::{Result, SmlmError};
use crate::frame::{PixelBuffer, SourceInfo};

use super::FrameProvider;

pub const SER_HEADER_SIZE: usize = 178;
pub const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";

/// SER color id for monochrome data.
pub const SER_COLOR_MONO: i32 = 0;

/// SER file header (178 bytes).
#[derive(Clone, Debug)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
    pub observer: String,
    pub instrument: String,
    pub telescope: String,
    pub date_time: u64,
    pub date_time_utc: u64,
}

impl SerHeader {
    /// Header for a little-endian monochrome stack.
    pub fn mono(width: u32, height: u32, pixel_depth: u32, frame_count: u32) -> Self {
        Self {
            color_id: SER_COLOR_MONO,
            little_endian: true,
            width,
            height,
            pixel_depth,
            frame_count,
            observer: String::new(),
            instrument: String::new(),
            telescope: String::new(),
            date_time: 0,
            date_time_utc: 0,
        }
    }

    /// Bytes per pixel plane (1 for 8-bit, 2 for 9-16 bit).
    pub fn bytes_per_pixel_plane(&self) -> usize {
        if self.pixel_depth <= 8 { 1 } else { 2 }
    }

    /// Number of planes per pixel (1 for mono/bayer, 3 for RGB/BGR).
    pub fn planes_per_pixel(&self) -> usize {
        match self.color_id {
            100 | 101 => 3,
            _ => 1,
        }
    }

    /// Total bytes per frame, `None` on overflow.
    pub fn frame_byte_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bytes_per_pixel_plane() * self.planes_per_pixel())
    }

    /// Decode the fixed 178-byte header. All integers are little-endian
    /// regardless of the sample byte order.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < SER_HEADER_SIZE {
            return Err(SmlmError::InvalidSer("File too small for SER header".into()));
        }
        if &buf[..SER_MAGIC.len()] != SER_MAGIC {
            return Err(SmlmError::InvalidSer("Missing LUCAM-RECORDER magic".into()));
        }
        let int = |off: usize| LittleEndian::read_i32(&buf[off..off + 4]);

        let width = int(OFF_WIDTH);
        let height = int(OFF_HEIGHT);
        let pixel_depth = int(OFF_DEPTH);
        let frame_count = int(OFF_FRAMES);
        if width <= 0 || height <= 0 {
            return Err(SmlmError::InvalidDimensions {
                width: width.max(0) as usize,
                height: height.max(0) as usize,
            });
        }
        if frame_count < 0 {
            return Err(SmlmError::InvalidSer(format!("Negative frame count {frame_count}")));
        }
        if !(1..=16).contains(&pixel_depth) {
            return Err(SmlmError::InvalidSer(format!("Unsupported pixel depth {pixel_depth}")));
        }

        Ok(Self {
            color_id: int(OFF_COLOR),
            // Most writers store 0 for little-endian samples; only 1 flips it.
            little_endian: int(OFF_ENDIAN) != 1,
            width: width as u32,
            height: height as u32,
            pixel_depth: pixel_depth as u32,
            frame_count: frame_count as u32,
            observer: text_field(&buf[OFF_OBSERVER..OFF_OBSERVER + TEXT_LEN]),
            instrument: text_field(&buf[OFF_INSTRUMENT..OFF_INSTRUMENT + TEXT_LEN]),
            telescope: text_field(&buf[OFF_TELESCOPE..OFF_TELESCOPE + TEXT_LEN]),
            date_time: LittleEndian::read_u64(&buf[OFF_DATE..OFF_DATE + 8]),
            date_time_utc: LittleEndian::read_u64(&buf[OFF_DATE_UTC..OFF_DATE_UTC + 8]),
        })
    }

    /// Encode the header in the layout [`SerHeader::from_bytes`] reads.
    pub fn to_bytes(&self) -> [u8; SER_HEADER_SIZE] {
        let mut buf = [0u8; SER_HEADER_SIZE];
        buf[..SER_MAGIC.len()].copy_from_slice(SER_MAGIC);
        let endian_flag = if self.little_endian { 0 } else { 1 };
        for (off, value) in [
            (OFF_COLOR, self.color_id),
            (OFF_ENDIAN, endian_flag),
            (OFF_WIDTH, self.width as i32),
            (OFF_HEIGHT, self.height as i32),
            (OFF_DEPTH, self.pixel_depth as i32),
            (OFF_FRAMES, self.frame_count as i32),
        ] {
            LittleEndian::write_i32(&mut buf[off..off + 4], value);
        }
        for (off, text) in [
            (OFF_OBSERVER, &self.observer),
            (OFF_INSTRUMENT, &self.instrument),
            (OFF_TELESCOPE, &self.telescope),
        ] {
            let bytes = text.as_bytes();
            let n = bytes.len().min(TEXT_LEN);
            buf[off..off + n].copy_from_slice(&bytes[..n]);
        }
        LittleEndian::write_u64(&mut buf[OFF_DATE..OFF_DATE + 8], self.date_time);
        LittleEndian::write_u64(&mut buf[OFF_DATE_UTC..OFF_DATE_UTC + 8], self.date_time_utc);
        buf
    }
}

// Header field offsets. The LuID field at 14 is ignored.
const OFF_COLOR: usize = 18;
const OFF_ENDIAN: usize = 22;
const OFF_WIDTH: usize = 26;
const OFF_HEIGHT: usize = 30;
const OFF_DEPTH: usize = 34;
const OFF_FRAMES: usize = 38;
const OFF_OBSERVER: usize = 42;
const OFF_INSTRUMENT: usize = 82;
const OFF_TELESCOPE: usize = 122;
const OFF_DATE: usize = 162;
const OFF_DATE_UTC: usize = 170;
const TEXT_LEN: usize = 40;

fn text_field(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

/// Memory-mapped SER stack reader yielding raw camera counts.
pub struct SerReader {
    mmap: Mmap,
    frame_bytes: usize,
    pub header: SerHeader,
}

impl SerReader {
    /// Open a SER file and parse its header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and the file is not modified
        // while the reader is alive.
        let mmap = unsafe { Mmap::map(&file)? };

        let header = SerHeader::from_bytes(&mmap)?;
        let frame_bytes = header
            .frame_byte_size()
            .ok_or_else(|| SmlmError::InvalidSer("Frame size overflow".into()))?;

        let expected = (header.frame_count as usize)
            .checked_mul(frame_bytes)
            .and_then(|n| n.checked_add(SER_HEADER_SIZE))
            .ok_or_else(|| SmlmError::InvalidSer("Stack size overflow".into()))?;
        if mmap.len() < expected {
            return Err(SmlmError::InvalidSer(format!(
                "File truncated: expected at least {} bytes, got {}",
                expected,
                mmap.len()
            )));
        }

        Ok(Self {
            mmap,
            frame_bytes,
            header,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    /// Get the raw bytes for a single frame (zero-copy from mmap).
    pub fn frame_raw(&self, index: usize) -> Result<&[u8]> {
        let count = self.frame_count();
        if index >= count {
            return Err(SmlmError::FrameIndexOutOfRange {
                index,
                total: count,
            });
        }
        let offset = SER_HEADER_SIZE + index * self.frame_bytes;
        Ok(&self.mmap[offset..offset + self.frame_bytes])
    }

    /// Decode one frame to raw counts. RGB/BGR stacks yield their green plane.
    pub fn read_pixels(&self, index: usize) -> Result<PixelBuffer> {
        let raw = self.frame_raw(index)?;
        let w = self.header.width as usize;
        let h = self.header.height as usize;
        let bps = self.header.bytes_per_pixel_plane();
        let planes = self.header.planes_per_pixel();
        let plane = if planes == 1 { 0 } else { 1 };

        let samples: Vec<u16> = (0..w * h)
            .map(|i| {
                let idx = (i * planes + plane) * bps;
                if bps == 1 {
                    raw[idx] as u16
                } else {
                    let pair = [raw[idx], raw[idx + 1]];
                    if self.header.little_endian {
                        u16::from_le_bytes(pair)
                    } else {
                        u16::from_be_bytes(pair)
                    }
                }
            })
            .collect();

        PixelBuffer::from_samples(w, &samples)
    }

    /// Build SourceInfo from the header.
    pub fn source_info(&self, path: &Path) -> SourceInfo {
        let mut description = path.display().to_string();
        for (label, value) in [
            ("observer", &self.header.observer),
            ("telescope", &self.header.telescope),
            ("instrument", &self.header.instrument),
        ] {
            if !value.is_empty() {
                description.push_str(&format!(", {label}: {value}"));
            }
        }
        SourceInfo {
            description,
            total_frames: self.frame_count(),
            width: self.header.width as usize,
            height: self.header.height as usize,
            bit_depth: self.header.pixel_depth as u8,
        }
    }
}

impl FrameProvider for SerReader {
    fn frame_count(&self) -> usize {
        SerReader::frame_count(self)
    }

    fn width(&self) -> usize {
        self.header.width as usize
    }

    fn height(&self) -> usize {
        self.header.height as usize
    }

    fn get_pixels(&mut self, index: usize) -> Result<PixelBuffer> {
        self.read_pixels(index)
    }
}
