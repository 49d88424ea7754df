use ndarray::Array2;

use crate::consts::{DERIVATIVE_STEP, EPSILON};

use super::psf::PsfModel;
use super::window::SubWindow;

/// Noise model deciding which cost the optimizer minimizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseModel {
    /// Sum of squared residuals.
    Gaussian,
    /// Poisson negative log-likelihood, `sum(m - d ln m)`.
    Poisson,
}

/// Result of minimizing an objective.
#[derive(Clone, Debug)]
pub struct Optimum {
    pub params: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// A PSF model bound to the pixels of one window.
pub struct Objective<'a> {
    model: &'a dyn PsfModel,
    window: &'a SubWindow,
    noise: NoiseModel,
}

impl<'a> Objective<'a> {
    pub fn new(model: &'a dyn PsfModel, window: &'a SubWindow, noise: NoiseModel) -> Self {
        Self {
            model,
            window,
            noise,
        }
    }

    pub fn param_count(&self) -> usize {
        self.model.param_count()
    }

    pub fn window(&self) -> &SubWindow {
        self.window
    }

    /// Cost at `params`; non-finite costs map to +inf so optimizers back off.
    pub fn value(&self, params: &[f64]) -> f64 {
        let total: f64 = match self.noise {
            NoiseModel::Gaussian => self
                .window
                .pixels()
                .map(|(x, y, d)| {
                    let r = d - self.model.evaluate(x, y, params);
                    r * r
                })
                .sum(),
            NoiseModel::Poisson => self
                .window
                .pixels()
                .map(|(x, y, d)| {
                    let m = self.model.evaluate(x, y, params).max(EPSILON);
                    m - d.max(0.0) * m.ln()
                })
                .sum(),
        };
        if total.is_finite() {
            total
        } else {
            f64::INFINITY
        }
    }

    /// Data minus model, in window iteration order.
    pub fn residuals_into(&self, params: &[f64], out: &mut Vec<f64>) {
        out.clear();
        out.extend(
            self.window
                .pixels()
                .map(|(x, y, d)| d - self.model.evaluate(x, y, params)),
        );
    }

    /// Central-difference gradient of [`Self::value`].
    pub fn gradient(&self, params: &[f64]) -> Vec<f64> {
        let mut probe = params.to_vec();
        (0..params.len())
            .map(|j| {
                let h = step_size(params[j]);
                probe[j] = params[j] + h;
                let up = self.value(&probe);
                probe[j] = params[j] - h;
                let down = self.value(&probe);
                probe[j] = params[j];
                (up - down) / (2.0 * h)
            })
            .collect()
    }

    /// Symmetrized finite-difference Hessian of [`Self::value`].
    pub fn hessian(&self, params: &[f64]) -> Array2<f64> {
        let n = params.len();
        let mut hess = Array2::<f64>::zeros((n, n));
        let mut probe = params.to_vec();
        for j in 0..n {
            let h = step_size(params[j]);
            probe[j] = params[j] + h;
            let g_up = self.gradient(&probe);
            probe[j] = params[j] - h;
            let g_down = self.gradient(&probe);
            probe[j] = params[j];
            for i in 0..n {
                hess[[i, j]] = (g_up[i] - g_down[i]) / (2.0 * h);
            }
        }
        let transposed = hess.t().to_owned();
        (hess + transposed) * 0.5
    }
}

/// Finite-difference step scaled to the parameter magnitude.
pub fn step_size(p: f64) -> f64 {
    DERIVATIVE_STEP * p.abs().max(1.0)
}
