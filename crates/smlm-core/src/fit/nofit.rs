use super::{psf, starting_point, Fitter, SubWindow};

/// Reports the background-subtracted centroid of the window without running
/// an optimizer. Shape parameters come from the initial guess.
#[derive(Clone, Debug)]
pub struct NoFit {
    sigma: f64,
}

impl NoFit {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }
}

impl Fitter for NoFit {
    fn fit(&mut self, window: &SubWindow, initial: Option<&[f64]>) -> Option<Vec<f64>> {
        let mut params = starting_point(window, initial, self.sigma);
        let background = params[psf::BACKGROUND];

        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_w = 0.0;
        for (x, y, v) in window.pixels() {
            let weight = (v - background).max(0.0);
            sum_x += x * weight;
            sum_y += y * weight;
            sum_w += weight;
        }
        if sum_w > 0.0 {
            params[psf::X] = sum_x / sum_w;
            params[psf::Y] = sum_y / sum_w;
        }
        Some(params)
    }
}
