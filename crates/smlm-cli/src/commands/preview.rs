use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use clap::Args;
use smlm_core::pipeline::{FrameResult, LivePreviewController, PreviewSink};
use smlm_core::roi::Region;

use super::{open_source, AnalysisArgs};

#[derive(Args)]
pub struct PreviewArgs {
    /// Input SER file or image directory
    pub file: PathBuf,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    /// Frame number to preview (1-based); repeat to switch frames
    #[arg(long = "frame", default_value = "1")]
    pub frames: Vec<usize>,
}

/// Prints the marker positions a viewer would draw.
struct PrintSink;

impl PreviewSink for PrintSink {
    fn render(&self, frame_index: usize, result: &FrameResult) {
        println!(
            "Frame {}: {} particle(s){}",
            frame_index + 1,
            result.len(),
            if result.interrupted { " (interrupted)" } else { "" }
        );
        for (x, y) in result.overlay_points() {
            println!("  ({x}, {y})");
        }
    }
}

pub fn run(args: &PreviewArgs) -> Result<()> {
    let config = args.analysis.to_config()?;
    let (provider, info) = open_source(&args.file)?;
    let region = args
        .analysis
        .region(info.width, info.height)?
        .map(|r| Arc::new(r) as Arc<dyn Region>);

    let mut indices = Vec::with_capacity(args.frames.len());
    for &n in &args.frames {
        if n == 0 || n > info.total_frames {
            bail!("Frame {n} out of range 1..={}", info.total_frames);
        }
        indices.push(n - 1);
    }
    let Some((&first, rest)) = indices.split_first() else {
        return Ok(());
    };

    let controller = LivePreviewController::new(Arc::new(Mutex::new(provider)), Arc::new(PrintSink));
    controller.update_parameters(&config, first, region)?;
    for &index in rest {
        controller.set_frame(index)?;
    }
    controller.wait();
    controller.dispose();

    Ok(())
}
