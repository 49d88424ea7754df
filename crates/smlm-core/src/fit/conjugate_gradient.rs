//! Polak-Ribiere nonlinear conjugate gradient.
//!
//! Parameters are rescaled by [`super::parameter_scales`] before
//! optimization so position, width, intensity and background move on
//! comparable step lengths.

use crate::consts::EPSILON;

use super::objective::{NoiseModel, Objective, Optimum};
use super::psf::IntegratedGaussian;
use super::{parameter_scales, starting_point, Fitter, SubWindow};

const ARMIJO: f64 = 1e-4;

#[derive(Clone, Debug)]
pub struct CgConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub max_backtracks: usize,
}

impl Default for CgConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-12,
            max_backtracks: 40,
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Minimize `objective` from `initial` using `scales` as the unit step of
/// each parameter.
pub fn conjugate_gradient(
    objective: &Objective,
    initial: &[f64],
    scales: &[f64],
    config: &CgConfig,
) -> Optimum {
    let n = initial.len();
    let to_params =
        |u: &[f64]| -> Vec<f64> { u.iter().zip(scales).map(|(u, s)| u * s).collect() };
    let value_at = |u: &[f64]| objective.value(&to_params(u));
    let gradient_at = |u: &[f64]| -> Vec<f64> {
        objective
            .gradient(&to_params(u))
            .iter()
            .zip(scales)
            .map(|(g, s)| g * s)
            .collect()
    };

    let mut u: Vec<f64> = initial.iter().zip(scales).map(|(p, s)| p / s).collect();
    let mut f = value_at(&u);
    let mut g = gradient_at(&u);
    let mut d: Vec<f64> = g.iter().map(|x| -x).collect();
    let mut step_len = 1.0_f64;
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        let mut slope = dot(&g, &d);
        if slope >= 0.0 {
            d = g.iter().map(|x| -x).collect();
            slope = -dot(&g, &g);
        }
        let d_norm = dot(&d, &d).sqrt();
        if d_norm < EPSILON || !f.is_finite() {
            converged = d_norm < EPSILON;
            break;
        }

        let mut alpha = (2.0 * step_len) / d_norm;
        let mut accepted = None;
        for _ in 0..config.max_backtracks {
            let trial: Vec<f64> = u.iter().zip(&d).map(|(u, d)| u + alpha * d).collect();
            let f_trial = value_at(&trial);
            if f_trial <= f + ARMIJO * alpha * slope {
                accepted = Some((trial, f_trial));
                break;
            }
            alpha *= 0.5;
        }
        let Some((u_new, f_new)) = accepted else {
            converged = true;
            break;
        };

        step_len = alpha * d_norm;
        let g_new = gradient_at(&u_new);
        let g_sq = dot(&g, &g).max(EPSILON);
        let beta = if (iter + 1) % n == 0 {
            0.0
        } else {
            let diff: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
            (dot(&g_new, &diff) / g_sq).max(0.0)
        };
        d = g_new
            .iter()
            .zip(&d)
            .map(|(g, d)| -g + beta * d)
            .collect();

        let change = (f - f_new).abs();
        u = u_new;
        g = g_new;
        let previous = f;
        f = f_new;
        if change <= config.tolerance * (previous.abs() + f.abs()) + EPSILON {
            converged = true;
            break;
        }
    }

    Optimum {
        params: to_params(&u),
        value: f,
        iterations,
        converged,
    }
}

/// Single-emitter least-squares fitter driven by conjugate gradients.
#[derive(Clone, Debug)]
pub struct ConjugateGradientFitter {
    sigma: f64,
    config: CgConfig,
}

impl ConjugateGradientFitter {
    pub fn new(sigma: f64) -> Self {
        Self {
            sigma,
            config: CgConfig::default(),
        }
    }
}

impl Fitter for ConjugateGradientFitter {
    fn fit(&mut self, window: &SubWindow, initial: Option<&[f64]>) -> Option<Vec<f64>> {
        let start = starting_point(window, initial, self.sigma);
        let scales = parameter_scales(&start);
        let objective = Objective::new(&IntegratedGaussian, window, NoiseModel::Gaussian);
        let optimum = conjugate_gradient(&objective, &start, &scales, &self.config);
        optimum.value.is_finite().then_some(optimum.params)
    }
}
