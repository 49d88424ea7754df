use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use smlm_core::frame::SourceInfo;
use smlm_core::io::ser::SerReader;

use super::open_source;

#[derive(Args)]
pub struct InfoArgs {
    /// Input SER file or image directory
    pub file: PathBuf,
}

/// Source metadata plus the raw data size in bytes, when the format fixes it.
fn inspect(path: &Path) -> Result<(SourceInfo, Option<usize>)> {
    if path.is_dir() {
        let (_, info) = open_source(path)?;
        return Ok((info, None));
    }
    let reader =
        SerReader::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let data_bytes = reader
        .header
        .frame_byte_size()
        .map(|frame_bytes| frame_bytes * reader.frame_count());
    Ok((reader.source_info(path), data_bytes))
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let (info, data_bytes) = inspect(&args.file)?;

    println!("Source:      {}", info.description);
    println!("Frames:      {}", info.total_frames);
    println!("Dimensions:  {}x{}", info.width, info.height);
    println!("Bit depth:   {}", info.bit_depth);
    if let Some(bytes) = data_bytes {
        println!("Data size:   {:.1} MB", bytes as f64 / (1024.0 * 1024.0));
    }

    Ok(())
}
