/// Ratio between the FWHM of a Gaussian and its standard deviation.
pub const FWHM_PER_SIGMA: f64 = 2.355;

/// Detection kernel half-width in units of the PSF sigma.
pub const KERNEL_SIGMA_FACTOR: f64 = 2.5;

/// Smallest supported detection kernel half-width (pixels).
pub const MIN_KERNEL_RADIUS: usize = 1;

/// Largest supported detection kernel half-width (pixels).
pub const MAX_KERNEL_RADIUS: usize = 15;

/// Pixel size used when the image carries no usable calibration.
pub const DEFAULT_PIXEL_SIZE_NM: f64 = 160.0;

/// Default optical resolution (FWHM) in nanometres.
pub const DEFAULT_RESOLUTION_NM: f64 = 300.0;

/// Default minimum peak height above the local background.
pub const DEFAULT_NOISE_THRESHOLD: f64 = 100.0;

/// Maximum number of emitters the multi-peak fitter models in one window.
pub const MAX_PEAKS_PER_WINDOW: usize = 5;

/// Minimum frame count to use frame-level Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Relative step used for finite-difference derivatives of fit objectives.
pub const DERIVATIVE_STEP: f64 = 1e-4;

/// Small epsilon to avoid division by zero and log of zero.
pub const EPSILON: f64 = 1e-10;
