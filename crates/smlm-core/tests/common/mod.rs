#![allow(dead_code)]

use ndarray::Array2;
use rand::prelude::*;
use smlm_core::frame::PixelBuffer;
use smlm_core::io::ser::SER_HEADER_SIZE;
use smlm_core::pipeline::AnalysisConfig;

/// Resolution that gives a PSF sigma of exactly 1.5 px at 100 nm pixels.
pub const RESOLUTION_FOR_SIGMA_1_5: f64 = 1.5 * 2.355 * 100.0;

/// A single emitter rendered at pixel centres.
#[derive(Clone, Copy, Debug)]
pub struct Spot {
    pub x: f64,
    pub y: f64,
    pub amplitude: f64,
}

pub fn spot(x: f64, y: f64, amplitude: f64) -> Spot {
    Spot { x, y, amplitude }
}

/// Flat `background` plus Gaussian spots of width `sigma`, no noise.
pub fn render_spots(
    width: usize,
    height: usize,
    spots: &[Spot],
    sigma: f64,
    background: f64,
) -> PixelBuffer {
    let data = Array2::from_shape_fn((height, width), |(row, col)| {
        let mut v = background;
        for s in spots {
            let dx = col as f64 - s.x;
            let dy = row as f64 - s.y;
            v += s.amplitude * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
        }
        v as f32
    });
    PixelBuffer::new(data)
}

/// `background` plus uniform noise in `[-amplitude, amplitude)`.
pub fn noise_frame(width: usize, height: usize, background: f64, amplitude: f64, seed: u64) -> PixelBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = Array2::from_shape_fn((height, width), |_| {
        (background + rng.random_range(-amplitude..amplitude)) as f32
    });
    PixelBuffer::new(data)
}

/// 100 nm pixels, sigma 1.5 px (kernel radius 4), noise threshold 100.
pub fn test_config() -> AnalysisConfig {
    AnalysisConfig {
        pixel_size_nm: 100.0,
        resolution_fwhm_nm: RESOLUTION_FOR_SIGMA_1_5,
        noise_threshold: 100.0,
        ..AnalysisConfig::default()
    }
}

/// The standard 16x16 test frame: one emitter at (8, 8), amplitude 1000,
/// sigma 1.5, background 100.
pub fn single_spot_frame() -> PixelBuffer {
    render_spots(16, 16, &[spot(8.0, 8.0, 1000.0)], 1.5, 100.0)
}

/// Build a SER file header for mono frames.
pub fn build_ser_header(width: u32, height: u32, bit_depth: u32, num_frames: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SER_HEADER_SIZE);

    // Magic (14 bytes)
    buf.extend_from_slice(b"LUCAM-RECORDER");
    // LuID, ColorID = MONO, LittleEndian = 0
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(num_frames as i32).to_le_bytes());
    // Observer, Instrument
    buf.extend_from_slice(&[0u8; 40]);
    buf.extend_from_slice(&[0u8; 40]);
    // Telescope
    let mut telescope = [0u8; 40];
    telescope[..5].copy_from_slice(b"TIRF1");
    buf.extend_from_slice(&telescope);
    // DateTime, DateTimeUTC
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());

    assert_eq!(buf.len(), SER_HEADER_SIZE);
    buf
}

/// A complete 16-bit mono SER file.
pub fn build_ser_u16(width: u32, height: u32, frames: &[Vec<u16>]) -> Vec<u8> {
    let mut buf = build_ser_header(width, height, 16, frames.len());
    for frame in frames {
        for v in frame {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }
    buf
}

/// Write a SER buffer to a temporary file and return the temp file handle.
///
/// The file stays alive as long as the returned `NamedTempFile` is not dropped.
pub fn write_test_ser(data: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut f = tempfile::NamedTempFile::new().expect("create temp file");
    f.write_all(data).expect("write SER data");
    f.flush().expect("flush");
    f
}

/// Frame samples as u16, for writing to SER or PNG.
pub fn to_u16(buffer: &PixelBuffer) -> Vec<u16> {
    buffer
        .data()
        .iter()
        .map(|&v| v.round().clamp(0.0, u16::MAX as f32) as u16)
        .collect()
}
