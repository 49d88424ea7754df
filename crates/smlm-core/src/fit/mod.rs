//! Sub-pixel PSF fitting strategies.
//!
//! Every fitter consumes a [`SubWindow`] around a candidate and produces a
//! parameter vector laid out as [`psf::HEADERS`]. Results are raw optimizer
//! output: sign normalization and bounds checks happen in the frame
//! processor so that all strategies share one validation policy.

pub mod conjugate_gradient;
pub mod dao;
pub mod least_squares;
pub mod linalg;
pub mod newton;
pub mod nofit;
pub mod objective;
pub mod psf;
pub mod simplex;
pub mod window;

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

pub use conjugate_gradient::ConjugateGradientFitter;
pub use dao::DaoFitter;
pub use least_squares::LeastSquaresFitter;
pub use newton::NewtonFitter;
pub use nofit::NoFit;
pub use simplex::SimplexFitter;
pub use window::SubWindow;

/// Refines a candidate window into PSF parameters.
pub trait Fitter: Send {
    /// Names of the fields in each returned parameter vector.
    fn headers(&self) -> &'static [&'static str] {
        &psf::HEADERS
    }

    /// Fit `window`, optionally starting from `initial`. `None` means no match.
    fn fit(&mut self, window: &SubWindow, initial: Option<&[f64]>) -> Option<Vec<f64>>;

    /// Whether further results from the last [`Fitter::fit`] call are queued.
    fn has_pending(&self) -> bool {
        false
    }

    /// Pop the next queued result of the last [`Fitter::fit`] call.
    fn next_result(&mut self) -> Option<Vec<f64>> {
        None
    }
}

/// Fitting strategy selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitterKind {
    /// Background-subtracted centroid, no optimization.
    NoFit,
    /// Levenberg-Marquardt least squares.
    LeastSquares,
    /// Nelder-Mead simplex on the Poisson likelihood.
    #[default]
    Simplex,
    /// Polak-Ribiere conjugate gradient on the least-squares cost.
    ConjugateGradient,
    /// Damped Newton-Raphson on the Poisson likelihood.
    Newton,
    /// DAO-style iterative multi-emitter fitting.
    MultiPeak,
}

impl std::fmt::Display for FitterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFit => write!(f, "No Fit"),
            Self::LeastSquares => write!(f, "Least Squares"),
            Self::Simplex => write!(f, "Simplex (Poisson)"),
            Self::ConjugateGradient => write!(f, "Conjugate Gradient"),
            Self::Newton => write!(f, "Newton"),
            Self::MultiPeak => write!(f, "Multi-Peak"),
        }
    }
}

/// Construction inputs shared by all fitters.
#[derive(Clone, Copy, Debug)]
pub struct FitterSettings {
    /// Expected PSF sigma in pixels, used for the initial guess.
    pub sigma: f64,
    /// Residual height that triggers an extra emitter in multi-peak mode.
    pub noise_threshold: f64,
}

/// Instantiate a fresh fitter. Fitters carry per-call state, so each worker
/// needs its own instance.
pub fn create_fitter(kind: FitterKind, settings: FitterSettings) -> Box<dyn Fitter> {
    match kind {
        FitterKind::NoFit => Box::new(NoFit::new(settings.sigma)),
        FitterKind::LeastSquares => Box::new(LeastSquaresFitter::new(settings.sigma)),
        FitterKind::Simplex => Box::new(SimplexFitter::new(settings.sigma)),
        FitterKind::ConjugateGradient => Box::new(ConjugateGradientFitter::new(settings.sigma)),
        FitterKind::Newton => Box::new(NewtonFitter::new(settings.sigma)),
        FitterKind::MultiPeak => {
            Box::new(DaoFitter::new(settings.sigma, settings.noise_threshold))
        }
    }
}

/// One accepted localization in pixel coordinates, laid out per the
/// producing fitter's headers.
#[derive(Clone, Debug, PartialEq)]
pub struct FitResult {
    pub params: Vec<f64>,
}

impl FitResult {
    pub fn x(&self) -> f64 {
        self.params[psf::X]
    }

    pub fn y(&self) -> f64 {
        self.params[psf::Y]
    }

    pub fn sigma(&self) -> f64 {
        self.params[psf::SIGMA]
    }

    pub fn intensity(&self) -> f64 {
        self.params[psf::INTENSITY]
    }

    pub fn background(&self) -> f64 {
        self.params[psf::BACKGROUND]
    }
}

/// Starting point for a single-emitter fit: candidate position, expected
/// sigma, perimeter background and background-subtracted window sum.
pub fn initial_guess(window: &SubWindow, sigma: f64) -> Vec<f64> {
    let background = window.perimeter_mean();
    let intensity: f64 = window.data().iter().map(|&v| v - background).sum();
    let center = window.center();
    vec![
        center.x as f64,
        center.y as f64,
        sigma,
        intensity.max(1.0),
        background,
    ]
}

/// Resolve the caller's guess, falling back to [`initial_guess`].
pub(crate) fn starting_point(window: &SubWindow, initial: Option<&[f64]>, sigma: f64) -> Vec<f64> {
    match initial {
        Some(p) if p.len() == psf::SINGLE_PEAK_PARAMS => p.to_vec(),
        _ => initial_guess(window, sigma),
    }
}

/// Characteristic scale of each single-peak parameter, used for simplex
/// steps and for conditioning gradient methods.
pub(crate) fn parameter_scales(params: &[f64]) -> Vec<f64> {
    vec![
        0.5,
        0.5,
        (0.3 * params[psf::SIGMA].abs()).max(0.1),
        (0.2 * params[psf::INTENSITY].abs()).max(1.0),
        (0.2 * params[psf::BACKGROUND].abs()).max(1.0),
    ]
}

/// Total photons of a Gaussian of peak height `amplitude`.
pub(crate) fn intensity_from_amplitude(amplitude: f64, sigma: f64) -> f64 {
    2.0 * PI * sigma * sigma * amplitude
}
