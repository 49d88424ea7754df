//! Damped Newton-Raphson on the Poisson likelihood.

use super::linalg::solve;
use super::objective::{NoiseModel, Objective, Optimum};
use super::psf::IntegratedGaussian;
use super::{starting_point, Fitter, SubWindow};

#[derive(Clone, Debug)]
pub struct NewtonConfig {
    pub max_iterations: usize,
    pub convergence_threshold: f64,
    pub initial_damping: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_threshold: 1e-7,
            initial_damping: 1e-3,
        }
    }
}

/// Newton iterations with Marquardt-style diagonal damping: the damping
/// shrinks after a successful step and grows after a failed one.
pub fn damped_newton(objective: &Objective, initial: Vec<f64>, config: &NewtonConfig) -> Optimum {
    let n = initial.len();
    let mut params = initial;
    let mut value = objective.value(&params);
    let mut damping = config.initial_damping;
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        let gradient = objective.gradient(&params);
        let mut hessian = objective.hessian(&params);
        for i in 0..n {
            let d = hessian[[i, i]].abs().max(1e-9);
            hessian[[i, i]] += damping * d;
        }
        let rhs: Vec<f64> = gradient.iter().map(|g| -g).collect();

        let step = solve(&hessian, &rhs);
        let improved = step.and_then(|delta| {
            let trial: Vec<f64> = params.iter().zip(&delta).map(|(p, d)| p + d).collect();
            let trial_value = objective.value(&trial);
            (trial_value < value).then_some((trial, trial_value, delta))
        });

        match improved {
            Some((trial, trial_value, delta)) => {
                let max_rel = params
                    .iter()
                    .zip(&delta)
                    .map(|(p, d)| d.abs() / p.abs().max(1.0))
                    .fold(0.0_f64, f64::max);
                params = trial;
                value = trial_value;
                damping = (damping * 0.1).max(1e-12);
                if max_rel < config.convergence_threshold {
                    converged = true;
                    break;
                }
            }
            None => {
                damping *= 10.0;
                if damping > 1e10 {
                    break;
                }
            }
        }
    }

    Optimum {
        params,
        value,
        iterations,
        converged,
    }
}

/// Maximum-likelihood single-emitter fitter using second-order steps.
#[derive(Clone, Debug)]
pub struct NewtonFitter {
    sigma: f64,
    config: NewtonConfig,
}

impl NewtonFitter {
    pub fn new(sigma: f64) -> Self {
        Self {
            sigma,
            config: NewtonConfig::default(),
        }
    }
}

impl Fitter for NewtonFitter {
    fn fit(&mut self, window: &SubWindow, initial: Option<&[f64]>) -> Option<Vec<f64>> {
        let start = starting_point(window, initial, self.sigma);
        let objective = Objective::new(&IntegratedGaussian, window, NoiseModel::Poisson);
        let optimum = damped_newton(&objective, start, &self.config);
        optimum.value.is_finite().then_some(optimum.params)
    }
}
