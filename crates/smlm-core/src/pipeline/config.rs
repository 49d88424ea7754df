use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_NOISE_THRESHOLD, DEFAULT_PIXEL_SIZE_NM, DEFAULT_RESOLUTION_NM, FWHM_PER_SIGMA,
    KERNEL_SIGMA_FACTOR, MAX_KERNEL_RADIUS, MIN_KERNEL_RADIUS,
};
use crate::detection::LocalMaximumFinder;
use crate::error::{Result, SmlmError};
use crate::fit::{create_fitter, Fitter, FitterKind, FitterSettings};

/// User-facing analysis parameters. Validate with [`AnalysisConfig::validate`]
/// before handing them to the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Physical size of one camera pixel in nanometres.
    #[serde(default = "default_pixel_size")]
    pub pixel_size_nm: f64,
    /// Optical resolution (PSF FWHM) in nanometres.
    #[serde(default = "default_resolution")]
    pub resolution_fwhm_nm: f64,
    /// Minimum peak height above the local background.
    #[serde(default = "default_noise_threshold")]
    pub noise_threshold: f64,
    /// Candidates dimmer than this are ignored.
    #[serde(default)]
    pub intensity_floor: f64,
    #[serde(default)]
    pub fitter: FitterKind,
    /// High emitter density: forces the multi-peak fitter.
    #[serde(default)]
    pub multi_peak: bool,
    /// Optional camera offset/gain conversion applied before detection.
    #[serde(default)]
    pub calibration: Option<Calibration>,
    /// Use this kernel half-width instead of deriving it from the resolution.
    #[serde(default)]
    pub fixed_kernel_radius: Option<usize>,
}

fn default_pixel_size() -> f64 {
    DEFAULT_PIXEL_SIZE_NM
}
fn default_resolution() -> f64 {
    DEFAULT_RESOLUTION_NM
}
fn default_noise_threshold() -> f64 {
    DEFAULT_NOISE_THRESHOLD
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pixel_size_nm: DEFAULT_PIXEL_SIZE_NM,
            resolution_fwhm_nm: DEFAULT_RESOLUTION_NM,
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
            intensity_floor: 0.0,
            fitter: FitterKind::default(),
            multi_peak: false,
            calibration: None,
            fixed_kernel_radius: None,
        }
    }
}

/// Camera conversion from raw counts to photons: `(raw - offset) / gain`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub offset: f32,
    pub gain: f32,
}

impl AnalysisConfig {
    /// Check every parameter and derive the PSF sigma and kernel size.
    pub fn validate(&self) -> Result<AnalysisParams> {
        if !(self.pixel_size_nm.is_finite() && self.pixel_size_nm > 0.0) {
            return Err(SmlmError::InvalidConfig(format!(
                "pixel size must be > 0 nm, got {}",
                self.pixel_size_nm
            )));
        }
        if !(self.resolution_fwhm_nm.is_finite() && self.resolution_fwhm_nm > 0.0) {
            return Err(SmlmError::InvalidConfig(format!(
                "resolution must be > 0 nm, got {}",
                self.resolution_fwhm_nm
            )));
        }
        if !(self.noise_threshold.is_finite() && self.noise_threshold > 0.0) {
            return Err(SmlmError::InvalidConfig(format!(
                "noise threshold must be > 0, got {}",
                self.noise_threshold
            )));
        }
        if !self.intensity_floor.is_finite() {
            return Err(SmlmError::InvalidConfig(
                "intensity floor must be finite".into(),
            ));
        }
        if let Some(cal) = &self.calibration {
            if !(cal.gain.is_finite() && cal.gain > 0.0) || !cal.offset.is_finite() {
                return Err(SmlmError::InvalidConfig(format!(
                    "calibration needs a finite offset and gain > 0, got offset {} gain {}",
                    cal.offset, cal.gain
                )));
            }
        }

        let sigma_px = self.resolution_fwhm_nm / FWHM_PER_SIGMA / self.pixel_size_nm;
        let kernel = match self.fixed_kernel_radius {
            Some(r) => r as f64,
            None => (sigma_px * KERNEL_SIGMA_FACTOR).round(),
        };
        if kernel < MIN_KERNEL_RADIUS as f64 || kernel > MAX_KERNEL_RADIUS as f64 {
            return Err(SmlmError::InvalidConfig(format!(
                "kernel size {kernel} outside [{MIN_KERNEL_RADIUS}, {MAX_KERNEL_RADIUS}] \
                 (sigma {sigma_px:.3} px)"
            )));
        }

        Ok(AnalysisParams {
            config: self.clone(),
            sigma_px,
            kernel_radius: kernel as usize,
        })
    }
}

/// A validated configuration with its derived quantities. Only obtainable
/// through [`AnalysisConfig::validate`].
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisParams {
    config: AnalysisConfig,
    sigma_px: f64,
    kernel_radius: usize,
}

impl AnalysisParams {
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Expected PSF sigma in pixels.
    pub fn sigma_px(&self) -> f64 {
        self.sigma_px
    }

    /// Detection kernel half-width; the window side is `2r + 1`.
    pub fn kernel_radius(&self) -> usize {
        self.kernel_radius
    }

    pub fn pixel_size_nm(&self) -> f64 {
        self.config.pixel_size_nm
    }

    /// The fitter actually used, after the multi-peak override.
    pub fn fitter_kind(&self) -> FitterKind {
        if self.config.multi_peak {
            FitterKind::MultiPeak
        } else {
            self.config.fitter
        }
    }

    pub fn finder(&self) -> LocalMaximumFinder {
        LocalMaximumFinder::new(
            self.config.noise_threshold as f32,
            self.config.intensity_floor as f32,
            self.kernel_radius,
        )
    }

    pub fn create_fitter(&self) -> Box<dyn Fitter> {
        create_fitter(
            self.fitter_kind(),
            FitterSettings {
                sigma: self.sigma_px,
                noise_threshold: self.config.noise_threshold,
            },
        )
    }
}

/// Pixel size in nanometres from an image calibration.
///
/// Only square pixels in `nm` or micrometres are trusted; anything else
/// falls back to [`DEFAULT_PIXEL_SIZE_NM`].
pub fn resolve_pixel_size(unit: &str, pixel_width: f64, pixel_height: f64) -> f64 {
    let size = if pixel_width == pixel_height {
        match unit.to_ascii_lowercase().as_str() {
            "nm" => pixel_width,
            "micro" | "micron" | "um" | "µm" => pixel_width * 1000.0,
            _ => -1.0,
        }
    } else {
        -1.0
    };
    if size > 0.0 {
        size
    } else {
        DEFAULT_PIXEL_SIZE_NM
    }
}
