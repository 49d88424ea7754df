//! Nelder-Mead downhill simplex on the Poisson likelihood.

use crate::consts::EPSILON;

use super::objective::{NoiseModel, Objective, Optimum};
use super::psf::IntegratedGaussian;
use super::{parameter_scales, starting_point, Fitter, SubWindow};

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

#[derive(Clone, Debug)]
pub struct SimplexConfig {
    pub max_evaluations: usize,
    /// Relative spread of vertex values at which a run stops.
    pub tolerance: f64,
    /// Fresh simplices built around the best point after the first run.
    pub restarts: usize,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            max_evaluations: 5000,
            tolerance: 1e-10,
            restarts: 2,
        }
    }
}

/// Minimize `f` from `initial`, with the first simplex spanning `steps`.
pub fn nelder_mead<F>(f: F, initial: &[f64], steps: &[f64], config: &SimplexConfig) -> Optimum
where
    F: Fn(&[f64]) -> f64,
{
    let mut best = simplex_run(&f, initial, steps, config);
    for _ in 0..config.restarts {
        let run = simplex_run(&f, &best.params, steps, config);
        let improved = run.value < best.value;
        let iterations = best.iterations + run.iterations;
        if run.value <= best.value {
            best = run;
        }
        best.iterations = iterations;
        if !improved {
            break;
        }
    }
    best
}

fn simplex_run<F>(f: &F, start: &[f64], steps: &[f64], config: &SimplexConfig) -> Optimum
where
    F: Fn(&[f64]) -> f64,
{
    let n = start.len();
    let mut vertices: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    vertices.push((start.to_vec(), f(start)));
    for j in 0..n {
        let mut v = start.to_vec();
        v[j] += steps[j];
        let value = f(&v);
        vertices.push((v, value));
    }

    let mut evaluations = n + 1;
    let mut iterations = 0;
    let mut converged = false;

    while evaluations < config.max_evaluations {
        iterations += 1;
        vertices.sort_by(|a, b| a.1.total_cmp(&b.1));

        let f_best = vertices[0].1;
        let f_worst = vertices[n].1;
        if (f_worst - f_best).abs() <= config.tolerance * (f_best.abs() + f_worst.abs()) + EPSILON {
            converged = true;
            break;
        }

        let mut centroid = vec![0.0; n];
        for (v, _) in &vertices[..n] {
            for (c, x) in centroid.iter_mut().zip(v) {
                *c += x / n as f64;
            }
        }
        let along = |from: &[f64], coeff: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, x)| c + coeff * (x - c))
                .collect()
        };

        let reflected = along(&vertices[n].0, -REFLECTION);
        let f_reflected = f(&reflected);
        evaluations += 1;

        if f_reflected < f_best {
            let expanded = along(&reflected, EXPANSION);
            let f_expanded = f(&expanded);
            evaluations += 1;
            vertices[n] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }

        if f_reflected < vertices[n - 1].1 {
            vertices[n] = (reflected, f_reflected);
            continue;
        }

        let (contracted, bound) = if f_reflected < f_worst {
            (along(&reflected, CONTRACTION), f_reflected)
        } else {
            (along(&vertices[n].0, CONTRACTION), f_worst)
        };
        let f_contracted = f(&contracted);
        evaluations += 1;
        if f_contracted < bound {
            vertices[n] = (contracted, f_contracted);
            continue;
        }

        let best = vertices[0].0.clone();
        for (v, value) in vertices.iter_mut().skip(1) {
            for (x, b) in v.iter_mut().zip(&best) {
                *x = b + SHRINK * (*x - b);
            }
            *value = f(v);
        }
        evaluations += n;
    }

    vertices.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (params, value) = vertices.swap_remove(0);
    Optimum {
        params,
        value,
        iterations,
        converged,
    }
}

/// Maximum-likelihood single-emitter fitter.
#[derive(Clone, Debug)]
pub struct SimplexFitter {
    sigma: f64,
    config: SimplexConfig,
}

impl SimplexFitter {
    pub fn new(sigma: f64) -> Self {
        Self {
            sigma,
            config: SimplexConfig::default(),
        }
    }
}

impl Fitter for SimplexFitter {
    fn fit(&mut self, window: &SubWindow, initial: Option<&[f64]>) -> Option<Vec<f64>> {
        let start = starting_point(window, initial, self.sigma);
        let steps = parameter_scales(&start);
        let objective = Objective::new(&IntegratedGaussian, window, NoiseModel::Poisson);
        let optimum = nelder_mead(|p| objective.value(p), &start, &steps, &self.config);
        optimum.value.is_finite().then_some(optimum.params)
    }
}
