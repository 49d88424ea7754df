//! Pixel-integrated symmetric Gaussian PSF.
//!
//! The expected count of pixel `(i, j)` for an emitter at `(x, y)` is
//! `I * Ex(i) * Ey(j) + B`, where `Ex(i)` is the fraction of a unit Gaussian
//! of width `sigma` falling inside `[i - 0.5, i + 0.5]`.

use std::f64::consts::SQRT_2;

/// Column names shared by every fitter.
pub const HEADERS: [&str; 5] = ["x", "y", "sigma", "intensity", "background"];

pub const X: usize = 0;
pub const Y: usize = 1;
pub const SIGMA: usize = 2;
pub const INTENSITY: usize = 3;
pub const BACKGROUND: usize = 4;

/// Parameters per emitter in a single-peak model.
pub const SINGLE_PEAK_PARAMS: usize = HEADERS.len();

/// Extra parameters (x, y, intensity) per additional emitter in a multi-peak model.
pub const EXTRA_PEAK_PARAMS: usize = 3;

const MIN_SIGMA: f64 = 1e-3;

/// Error function, rational Chebyshev approximation (|error| < 1.2e-7).
pub fn erf(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let erfc = t * poly.exp();
    if x >= 0.0 {
        1.0 - erfc
    } else {
        erfc - 1.0
    }
}

/// Fraction of a unit Gaussian centred at `center` that falls on `pixel`.
pub fn pixel_fraction(pixel: f64, center: f64, sigma: f64) -> f64 {
    let s = sigma.abs().max(MIN_SIGMA) * SQRT_2;
    0.5 * (erf((pixel + 0.5 - center) / s) - erf((pixel - 0.5 - center) / s))
}

/// A parametric image model evaluated at absolute pixel coordinates.
pub trait PsfModel: Sync {
    fn param_count(&self) -> usize;

    fn evaluate(&self, px: f64, py: f64, params: &[f64]) -> f64;
}

/// One emitter: `[x, y, sigma, intensity, background]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntegratedGaussian;

impl PsfModel for IntegratedGaussian {
    fn param_count(&self) -> usize {
        SINGLE_PEAK_PARAMS
    }

    fn evaluate(&self, px: f64, py: f64, params: &[f64]) -> f64 {
        let sigma = params[SIGMA];
        params[INTENSITY] * pixel_fraction(px, params[X], sigma) * pixel_fraction(py, params[Y], sigma)
            + params[BACKGROUND]
    }
}

/// `peaks` emitters sharing sigma and background.
///
/// Layout: the first emitter uses the single-peak layout, each further
/// emitter appends `[x, y, intensity]`.
#[derive(Clone, Copy, Debug)]
pub struct MultiGaussian {
    pub peaks: usize,
}

impl MultiGaussian {
    /// Extract emitter `k` in single-peak layout.
    pub fn peak_params(params: &[f64], k: usize) -> Vec<f64> {
        let sigma = params[SIGMA];
        let background = params[BACKGROUND];
        if k == 0 {
            return params[..SINGLE_PEAK_PARAMS].to_vec();
        }
        let base = SINGLE_PEAK_PARAMS + (k - 1) * EXTRA_PEAK_PARAMS;
        vec![
            params[base],
            params[base + 1],
            sigma,
            params[base + 2],
            background,
        ]
    }
}

impl PsfModel for MultiGaussian {
    fn param_count(&self) -> usize {
        SINGLE_PEAK_PARAMS + self.peaks.saturating_sub(1) * EXTRA_PEAK_PARAMS
    }

    fn evaluate(&self, px: f64, py: f64, params: &[f64]) -> f64 {
        let sigma = params[SIGMA];
        let mut value = IntegratedGaussian.evaluate(px, py, params);
        for k in 1..self.peaks {
            let base = SINGLE_PEAK_PARAMS + (k - 1) * EXTRA_PEAK_PARAMS;
            value += params[base + 2]
                * pixel_fraction(px, params[base], sigma)
                * pixel_fraction(py, params[base + 1], sigma);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erf_reference_values() {
        assert!(erf(0.0).abs() < 1e-7);
        assert!((erf(0.5) - 0.520_499_877_8).abs() < 1e-6);
        assert!((erf(1.0) - 0.842_700_792_9).abs() < 1e-6);
        assert!((erf(-1.0) + 0.842_700_792_9).abs() < 1e-6);
        assert!((erf(3.0) - 0.999_977_909_5).abs() < 1e-6);
    }

    #[test]
    fn test_pixel_fractions_sum_to_one() {
        let total: f64 = (-20..=20)
            .map(|i| pixel_fraction(i as f64, 0.3, 1.7))
            .sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_sigma_matches_positive() {
        let a = pixel_fraction(2.0, 1.0, 1.5);
        let b = pixel_fraction(2.0, 1.0, -1.5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_multi_gaussian_single_peak_matches_integrated() {
        let params = [4.0, 5.0, 1.2, 800.0, 10.0];
        let single = IntegratedGaussian.evaluate(4.0, 6.0, &params);
        let multi = MultiGaussian { peaks: 1 }.evaluate(4.0, 6.0, &params);
        assert_eq!(single, multi);
    }
}
