use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use smlm_core::pipeline::{analyze_stack, AnalysisStage, ProgressReporter};
use smlm_core::roi::Region;
use tracing::info;

use super::{open_source, AnalysisArgs};
use crate::output::{print_params, print_summary, write_csv};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Input SER file or image directory
    pub file: PathBuf,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    /// Output CSV file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Drives an indicatif bar from pipeline progress.
struct BarReporter {
    bar: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: AnalysisStage, total_items: Option<usize>) {
        self.bar.set_message(stage.to_string());
        self.bar.set_length(total_items.unwrap_or(1) as u64);
        self.bar.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        if let Some(len) = self.bar.length() {
            self.bar.set_position(len);
        }
    }
}

pub fn run(args: &AnalyzeArgs) -> Result<()> {
    let config = args.analysis.to_config()?;
    let params = config.validate()?;
    let (mut provider, info) = open_source(&args.file)?;
    let region = args.analysis.region(info.width, info.height)?;

    print_params(&params, &info.description);

    let bar = ProgressBar::new(info.total_frames as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg:22} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let reporter = BarReporter { bar };

    let output = analyze_stack(
        &mut provider,
        &params,
        region.as_ref().map(|r| r as &dyn Region),
        &reporter,
    )?;
    reporter.bar.finish_with_message("Done");

    print_summary(&output);

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            write_csv(&output.dataset, &mut out)?;
            out.flush()?;
            info!(path = %path.display(), rows = output.dataset.n_rows(), "Wrote localization table");
            eprintln!("\nResults saved to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            write_csv(&output.dataset, &mut out)?;
        }
    }

    Ok(())
}
