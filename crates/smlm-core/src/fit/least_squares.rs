//! Levenberg-Marquardt least-squares fitting.

use ndarray::{Array1, Array2};

use super::linalg::solve;
use super::objective::{step_size, NoiseModel, Objective, Optimum};
use super::psf::IntegratedGaussian;
use super::{starting_point, Fitter, SubWindow};

/// Configuration for Levenberg-Marquardt optimization.
#[derive(Clone, Debug)]
pub struct LmConfig {
    pub max_iterations: usize,
    /// Stop once every relative parameter change falls below this.
    pub convergence_threshold: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_threshold: 1e-7,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

/// Minimize the squared residuals of `objective` starting at `initial`.
///
/// The Jacobian is taken by central differences of the model, so any
/// [`super::psf::PsfModel`] can be fitted.
pub fn levenberg_marquardt(objective: &Objective, initial: Vec<f64>, config: &LmConfig) -> Optimum {
    let n = initial.len();
    let mut params = initial;
    let mut lambda = config.initial_lambda;
    let mut prev_chi2 = objective.value(&params);
    let mut converged = false;
    let mut iterations = 0;

    let mut residuals = Vec::new();
    let mut up = Vec::new();
    let mut down = Vec::new();
    let pixels = objective.window().len();

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        objective.residuals_into(&params, &mut residuals);
        let mut jacobian = Array2::<f64>::zeros((pixels, n));
        let mut probe = params.clone();
        for j in 0..n {
            let h = step_size(params[j]);
            probe[j] = params[j] + h;
            objective.residuals_into(&probe, &mut up);
            probe[j] = params[j] - h;
            objective.residuals_into(&probe, &mut down);
            probe[j] = params[j];
            for i in 0..pixels {
                // Residual is data - model, so d(model) = -d(residual).
                jacobian[[i, j]] = (down[i] - up[i]) / (2.0 * h);
            }
        }

        let r = Array1::from(residuals.clone());
        let jt = jacobian.t();
        let mut hessian = jt.dot(&jacobian);
        let gradient = jt.dot(&r).to_vec();

        for i in 0..n {
            hessian[[i, i]] *= 1.0 + lambda;
        }

        let Some(delta) = solve(&hessian, &gradient) else {
            break;
        };

        let candidate: Vec<f64> = params.iter().zip(&delta).map(|(p, d)| p + d).collect();
        let new_chi2 = objective.value(&candidate);

        if new_chi2 < prev_chi2 {
            let max_rel = params
                .iter()
                .zip(&delta)
                .map(|(p, d)| d.abs() / p.abs().max(1.0))
                .fold(0.0_f64, f64::max);
            params = candidate;
            prev_chi2 = new_chi2;
            lambda *= config.lambda_down;
            if max_rel < config.convergence_threshold {
                converged = true;
                break;
            }
        } else {
            lambda *= config.lambda_up;
            if lambda > 1e10 {
                break;
            }
        }
    }

    Optimum {
        params,
        value: prev_chi2,
        iterations,
        converged,
    }
}

/// Single-emitter least-squares fitter.
#[derive(Clone, Debug)]
pub struct LeastSquaresFitter {
    sigma: f64,
    config: LmConfig,
}

impl LeastSquaresFitter {
    pub fn new(sigma: f64) -> Self {
        Self {
            sigma,
            config: LmConfig::default(),
        }
    }
}

impl Fitter for LeastSquaresFitter {
    fn fit(&mut self, window: &SubWindow, initial: Option<&[f64]>) -> Option<Vec<f64>> {
        let start = starting_point(window, initial, self.sigma);
        let objective = Objective::new(&IntegratedGaussian, window, NoiseModel::Gaussian);
        let optimum = levenberg_marquardt(&objective, start, &self.config);
        optimum.value.is_finite().then_some(optimum.params)
    }
}
