use std::borrow::Cow;

use tracing::debug;

use crate::fit::{psf, FitResult, Fitter, SubWindow};
use crate::frame::PixelBuffer;
use crate::roi::Region;

use super::cancel::CancellationToken;
use super::config::AnalysisParams;

/// Localizations found in one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameResult {
    /// 0-based index of the source frame.
    pub frame_index: usize,
    pub localizations: Vec<FitResult>,
    /// Fits dropped by validation.
    pub rejected: usize,
    /// Processing stopped early on a cancellation request.
    pub interrupted: bool,
}

impl FrameResult {
    pub fn empty(frame_index: usize) -> Self {
        Self {
            frame_index,
            ..Self::default()
        }
    }

    /// 1-based frame number, as written to datasets.
    pub fn frame_number(&self) -> usize {
        self.frame_index + 1
    }

    pub fn len(&self) -> usize {
        self.localizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.localizations.is_empty()
    }

    /// Fitted positions rounded to the nearest pixel, for point overlays.
    pub fn overlay_points(&self) -> Vec<(i64, i64)> {
        self.localizations
            .iter()
            .map(|loc| ((loc.x() + 0.5).floor() as i64, (loc.y() + 0.5).floor() as i64))
            .collect()
    }
}

/// Why a fitter's output was not accepted.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    /// The fitted centre left the window the fitter was given.
    OutOfWindow { x: f64, y: f64 },
    NegativeIntensity(f64),
    NonFinite,
    /// Parameter vector shorter than the shared header.
    Malformed { len: usize },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfWindow { x, y } => write!(f, "position ({x:.2}, {y:.2}) outside window"),
            Self::NegativeIntensity(i) => write!(f, "negative intensity {i:.2}"),
            Self::NonFinite => write!(f, "non-finite parameters"),
            Self::Malformed { len } => write!(f, "expected at least {} parameters, got {len}", psf::HEADERS.len()),
        }
    }
}

/// Apply the shared acceptance rules to raw fitter output.
///
/// Sigma is folded to its magnitude; negative intensity, non-finite values
/// and positions outside `window` reject the fit.
pub fn validate_fit(mut params: Vec<f64>, window: &SubWindow) -> Result<FitResult, Rejection> {
    if params.len() < psf::HEADERS.len() {
        return Err(Rejection::Malformed { len: params.len() });
    }
    if params.iter().any(|v| !v.is_finite()) {
        return Err(Rejection::NonFinite);
    }
    params[psf::SIGMA] = params[psf::SIGMA].abs();

    let intensity = params[psf::INTENSITY];
    if intensity < 0.0 {
        return Err(Rejection::NegativeIntensity(intensity));
    }
    let (x, y) = (params[psf::X], params[psf::Y]);
    if !window.contains_position(x, y) {
        return Err(Rejection::OutOfWindow { x, y });
    }
    Ok(FitResult { params })
}

/// Turns one frame into one [`FrameResult`]: calibrate, detect, fit, validate.
pub struct FrameProcessor<'a> {
    params: &'a AnalysisParams,
    region: Option<&'a dyn Region>,
}

impl<'a> FrameProcessor<'a> {
    pub fn new(params: &'a AnalysisParams, region: Option<&'a dyn Region>) -> Self {
        Self { params, region }
    }

    /// Column names of the localizations this processor produces.
    pub fn headers(&self) -> &'static [&'static str] {
        self.params.create_fitter().headers()
    }

    /// Analyze `pixels`. `cancel` is polled before every fit attempt; when it
    /// is set the localizations found so far are returned, flagged as
    /// interrupted.
    pub fn process(
        &self,
        frame_index: usize,
        pixels: &PixelBuffer,
        cancel: &CancellationToken,
    ) -> FrameResult {
        let mut fitter = self.params.create_fitter();
        self.process_with(frame_index, pixels, fitter.as_mut(), cancel)
    }

    /// [`FrameProcessor::process`] with a caller-supplied fitter in place of
    /// the configured one.
    pub fn process_with(
        &self,
        frame_index: usize,
        pixels: &PixelBuffer,
        fitter: &mut dyn Fitter,
        cancel: &CancellationToken,
    ) -> FrameResult {
        let buffer = match &self.params.config().calibration {
            Some(cal) => Cow::Owned(pixels.calibrated(cal.offset, cal.gain)),
            None => Cow::Borrowed(pixels),
        };

        let finder = self.params.finder();
        let mut result = FrameResult::empty(frame_index);

        for candidate in finder.candidates(&buffer) {
            if cancel.is_cancelled() {
                debug!(
                    frame = frame_index + 1,
                    found = result.len(),
                    "Frame analysis interrupted"
                );
                result.interrupted = true;
                break;
            }
            if let Some(region) = self.region {
                if !region.contains(candidate.x, candidate.y) {
                    continue;
                }
            }
            let Some(window) = SubWindow::extract(&buffer, candidate, finder.kernel_radius())
            else {
                continue;
            };

            let mut accept = |params: Vec<f64>| match validate_fit(params, &window) {
                Ok(fit) => result.localizations.push(fit),
                Err(reason) => {
                    result.rejected += 1;
                    debug!(
                        frame = frame_index + 1,
                        x = candidate.x,
                        y = candidate.y,
                        %reason,
                        "Rejected fit"
                    );
                }
            };

            if let Some(params) = fitter.fit(&window, None) {
                accept(params);
            }
            while fitter.has_pending() {
                if let Some(params) = fitter.next_result() {
                    accept(params);
                }
            }
        }

        result
    }
}
