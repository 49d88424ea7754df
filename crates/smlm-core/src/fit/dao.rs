//! DAO-style multi-emitter fitting.
//!
//! A single emitter is fitted first. While the residual image still holds a
//! pixel rising more than the noise threshold above the model, another
//! emitter is seeded there and all emitters are refitted jointly with a
//! shared width and background. Emitters beyond the first are queued and
//! handed out through [`Fitter::next_result`].

use std::collections::VecDeque;

use crate::consts::MAX_PEAKS_PER_WINDOW;

use super::least_squares::{levenberg_marquardt, LmConfig};
use super::objective::{NoiseModel, Objective};
use super::psf::{self, MultiGaussian, PsfModel};
use super::{intensity_from_amplitude, starting_point, Fitter, SubWindow};

#[derive(Clone, Debug)]
pub struct DaoFitter {
    sigma: f64,
    noise_threshold: f64,
    max_peaks: usize,
    config: LmConfig,
    pending: VecDeque<Vec<f64>>,
}

impl DaoFitter {
    pub fn new(sigma: f64, noise_threshold: f64) -> Self {
        Self {
            sigma,
            noise_threshold,
            max_peaks: MAX_PEAKS_PER_WINDOW,
            config: LmConfig::default(),
            pending: VecDeque::new(),
        }
    }

    pub fn with_max_peaks(mut self, max_peaks: usize) -> Self {
        self.max_peaks = max_peaks.max(1);
        self
    }
}

/// Largest positive residual `(x, y, height)` of `params` over the window.
fn strongest_residual(window: &SubWindow, model: &MultiGaussian, params: &[f64]) -> Option<(f64, f64, f64)> {
    window
        .pixels()
        .map(|(x, y, d)| (x, y, d - model.evaluate(x, y, params)))
        .max_by(|a, b| a.2.total_cmp(&b.2))
}

impl Fitter for DaoFitter {
    fn fit(&mut self, window: &SubWindow, initial: Option<&[f64]>) -> Option<Vec<f64>> {
        self.pending.clear();

        let mut peaks = 1;
        let mut model = MultiGaussian { peaks };
        let start = starting_point(window, initial, self.sigma);
        let first = {
            let objective = Objective::new(&model, window, NoiseModel::Gaussian);
            levenberg_marquardt(&objective, start, &self.config)
        };
        if !first.value.is_finite() {
            return None;
        }
        let mut params = first.params;
        let mut chi2 = first.value;

        while peaks < self.max_peaks {
            let Some((rx, ry, height)) = strongest_residual(window, &model, &params) else {
                break;
            };
            if height <= self.noise_threshold {
                break;
            }

            let grown = MultiGaussian { peaks: peaks + 1 };
            let mut seed = params.clone();
            let sigma = params[psf::SIGMA].abs();
            seed.extend_from_slice(&[rx, ry, intensity_from_amplitude(height, sigma)]);

            let refit = {
                let objective = Objective::new(&grown, window, NoiseModel::Gaussian);
                levenberg_marquardt(&objective, seed, &self.config)
            };
            if !refit.value.is_finite() || refit.value >= chi2 {
                break;
            }
            params = refit.params;
            chi2 = refit.value;
            peaks += 1;
            model = grown;
        }

        for k in 1..peaks {
            self.pending.push_back(MultiGaussian::peak_params(&params, k));
        }
        Some(MultiGaussian::peak_params(&params, 0))
    }

    fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn next_result(&mut self) -> Option<Vec<f64>> {
        self.pending.pop_front()
    }
}
