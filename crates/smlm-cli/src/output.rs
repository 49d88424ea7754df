use std::io::Write;

use console::Style;
use smlm_core::pipeline::{AnalysisParams, BatchOutput, Dataset};

/// Write the dataset as CSV: one header line, then one line per localization.
pub fn write_csv(dataset: &Dataset, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "{}", dataset.headers().join(","))?;
    for i in 0..dataset.n_rows() {
        let Some(row) = dataset.row(i) else { break };
        let line: Vec<String> = row.iter().map(|v| format!("{v}")).collect();
        writeln!(out, "{}", line.join(","))?;
    }
    Ok(())
}

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    warning: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            warning: Style::new().yellow(),
        }
    }
}

pub fn print_params(params: &AnalysisParams, source: &str) {
    let s = Styles::new();
    let config = params.config();

    eprintln!();
    eprintln!("  {}", s.title.apply_to("SMLM Analysis"));
    eprintln!("  {:<14}{}", s.label.apply_to("Source"), source);
    eprintln!(
        "  {:<14}{}",
        s.label.apply_to("Pixel size"),
        s.value.apply_to(format!("{} nm", config.pixel_size_nm))
    );
    eprintln!(
        "  {:<14}{}",
        s.label.apply_to("Resolution"),
        s.value.apply_to(format!("{} nm FWHM", config.resolution_fwhm_nm))
    );
    eprintln!(
        "  {:<14}{}",
        s.label.apply_to("PSF sigma"),
        s.value.apply_to(format!("{:.3} px", params.sigma_px()))
    );
    eprintln!(
        "  {:<14}{}",
        s.label.apply_to("Kernel"),
        s.value.apply_to(format!("{} px", params.kernel_radius()))
    );
    eprintln!(
        "  {:<14}{}",
        s.label.apply_to("Noise"),
        s.value.apply_to(config.noise_threshold)
    );
    eprintln!(
        "  {:<14}{}",
        s.label.apply_to("Fitter"),
        s.value.apply_to(params.fitter_kind())
    );
    eprintln!();
}

pub fn print_summary(output: &BatchOutput) {
    let s = Styles::new();

    eprintln!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(output.frames.len())
    );
    eprintln!(
        "  {:<14}{}",
        s.label.apply_to("Particles"),
        s.value.apply_to(output.total_localizations())
    );
    let rejected: usize = output.frames.iter().map(|f| f.rejected).sum();
    if rejected > 0 {
        eprintln!(
            "  {:<14}{}",
            s.label.apply_to("Rejected"),
            s.value.apply_to(rejected)
        );
    }
    for failure in &output.failures {
        eprintln!("  {}", s.warning.apply_to(format!("Skipped {failure}")));
    }
}
