pub mod analyze;
pub mod config;
pub mod info;
pub mod preview;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use smlm_core::fit::FitterKind;
use smlm_core::frame::SourceInfo;
use smlm_core::io::image_seq::ImageSequence;
use smlm_core::io::ser::SerReader;
use smlm_core::io::FrameProvider;
use smlm_core::pipeline::{AnalysisConfig, Calibration};
use smlm_core::roi::RoiRect;

#[derive(Clone, Copy, ValueEnum)]
pub enum FitterArg {
    None,
    LeastSquares,
    Simplex,
    ConjugateGradient,
    Newton,
    MultiPeak,
}

impl From<FitterArg> for FitterKind {
    fn from(arg: FitterArg) -> Self {
        match arg {
            FitterArg::None => FitterKind::NoFit,
            FitterArg::LeastSquares => FitterKind::LeastSquares,
            FitterArg::Simplex => FitterKind::Simplex,
            FitterArg::ConjugateGradient => FitterKind::ConjugateGradient,
            FitterArg::Newton => FitterKind::Newton,
            FitterArg::MultiPeak => FitterKind::MultiPeak,
        }
    }
}

/// Analysis parameters shared by `analyze` and `preview`. Flags override
/// values from `--config`.
#[derive(Args)]
pub struct AnalysisArgs {
    /// Analysis config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Camera pixel size in nm
    #[arg(long)]
    pub pixel_size: Option<f64>,

    /// Optical resolution (PSF FWHM) in nm
    #[arg(long)]
    pub resolution: Option<f64>,

    /// Minimum peak height above local background
    #[arg(long)]
    pub noise: Option<f64>,

    /// Ignore candidates dimmer than this
    #[arg(long)]
    pub floor: Option<f64>,

    /// Fitting method
    #[arg(long, value_enum)]
    pub fitter: Option<FitterArg>,

    /// Fit overlapping emitters (overrides --fitter)
    #[arg(long)]
    pub multi_peak: bool,

    /// Detection kernel half-width, instead of deriving it from the resolution
    #[arg(long)]
    pub kernel_radius: Option<usize>,

    /// Camera offset in counts (requires --gain)
    #[arg(long, requires = "gain")]
    pub offset: Option<f32>,

    /// Camera gain in counts per photon
    #[arg(long)]
    pub gain: Option<f32>,

    /// Only fit candidates inside x,y,width,height
    #[arg(long)]
    pub roi: Option<RoiRect>,
}

impl AnalysisArgs {
    pub fn to_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                toml::from_str(&contents).context("Invalid analysis config")?
            }
            None => AnalysisConfig::default(),
        };

        if let Some(v) = self.pixel_size {
            config.pixel_size_nm = v;
        }
        if let Some(v) = self.resolution {
            config.resolution_fwhm_nm = v;
        }
        if let Some(v) = self.noise {
            config.noise_threshold = v;
        }
        if let Some(v) = self.floor {
            config.intensity_floor = v;
        }
        if let Some(f) = self.fitter {
            config.fitter = f.into();
        }
        if self.multi_peak {
            config.multi_peak = true;
        }
        if self.kernel_radius.is_some() {
            config.fixed_kernel_radius = self.kernel_radius;
        }
        if let Some(gain) = self.gain {
            config.calibration = Some(Calibration {
                offset: self.offset.unwrap_or(0.0),
                gain,
            });
        }
        Ok(config)
    }

    /// The ROI checked against the frame size.
    pub fn region(&self, width: usize, height: usize) -> Result<Option<RoiRect>> {
        self.roi
            .map(|r| r.validated(width, height))
            .transpose()
            .map_err(Into::into)
    }
}

/// Open a SER file, or a directory of TIFF/PNG frames.
pub fn open_source(path: &Path) -> Result<(Box<dyn FrameProvider + Send>, SourceInfo)> {
    if path.is_dir() {
        let seq = ImageSequence::from_dir(path)
            .with_context(|| format!("Failed to open image sequence {}", path.display()))?;
        let info = seq.source_info(path);
        Ok((Box::new(seq), info))
    } else {
        let reader = SerReader::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let info = reader.source_info(path);
        Ok((Box::new(reader), info))
    }
}
