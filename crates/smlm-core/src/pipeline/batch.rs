use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::{Result, SmlmError};
use crate::io::FrameProvider;
use crate::roi::Region;

use super::cancel::CancellationToken;
use super::config::AnalysisParams;
use super::dataset::Dataset;
use super::processor::{FrameProcessor, FrameResult};
use super::types::{AnalysisStage, ProgressReporter};

/// A frame whose pixels could not be obtained.
#[derive(Debug)]
pub struct FrameFailure {
    pub frame_index: usize,
    pub error: SmlmError,
}

impl FrameFailure {
    pub fn frame_number(&self) -> usize {
        self.frame_index + 1
    }
}

impl std::fmt::Display for FrameFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame {}: {}", self.frame_number(), self.error)
    }
}

/// Everything a full-stack pass produces.
#[derive(Debug)]
pub struct BatchOutput {
    pub dataset: Dataset,
    /// One entry per frame, in frame order. Failed frames are empty.
    pub frames: Vec<FrameResult>,
    pub failures: Vec<FrameFailure>,
}

impl BatchOutput {
    pub fn total_localizations(&self) -> usize {
        self.dataset.n_rows()
    }
}

/// Analyze every frame of `provider` and aggregate the results.
///
/// Frames are processed in parallel. Reads from `provider` are serialized
/// behind a mutex since stack readers commonly share decoder state. Each
/// frame writes only its own pre-allocated slot, so the dataset's row order
/// follows frame order no matter how the work was scheduled. A frame that
/// cannot be read is recorded as a failure and left empty; the rest of the
/// stack is still analyzed.
pub fn analyze_stack<P>(
    provider: &mut P,
    params: &AnalysisParams,
    region: Option<&dyn Region>,
    reporter: &dyn ProgressReporter,
) -> Result<BatchOutput>
where
    P: FrameProvider + Send + ?Sized,
{
    let total = provider.frame_count();
    if total == 0 {
        return Err(SmlmError::EmptySequence);
    }
    info!(
        total_frames = total,
        fitter = %params.fitter_kind(),
        kernel_radius = params.kernel_radius(),
        "Analyzing stack"
    );

    let provider = Mutex::new(provider);
    let processor = FrameProcessor::new(params, region);
    let never_cancelled = CancellationToken::new();
    let done = AtomicUsize::new(0);

    reporter.begin_stage(AnalysisStage::Localizing, Some(total));
    let mut slots: Vec<Result<FrameResult>> =
        (0..total).map(|i| Ok(FrameResult::empty(i))).collect();

    let fill = |(index, slot): (usize, &mut Result<FrameResult>)| {
        *slot = read_frame(&provider, index)
            .map(|pixels| processor.process(index, &pixels, &never_cancelled));
        if let Ok(result) = slot {
            debug!(
                frame = index + 1,
                particles = result.len(),
                "Processed frame"
            );
        }
        reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
    };
    if total >= PARALLEL_FRAME_THRESHOLD {
        slots.par_iter_mut().enumerate().for_each(fill);
    } else {
        slots.iter_mut().enumerate().for_each(fill);
    }
    reporter.finish_stage();

    reporter.begin_stage(AnalysisStage::Aggregating, None);
    let mut frames = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Ok(result) => frames.push(result),
            Err(error) => {
                warn!(frame = index + 1, %error, "Frame analysis failed");
                failures.push(FrameFailure {
                    frame_index: index,
                    error,
                });
                frames.push(FrameResult::empty(index));
            }
        }
    }

    let dataset = Dataset::from_frames(processor.headers(), &frames, params.pixel_size_nm());
    reporter.finish_stage();

    info!(
        frames = total,
        localizations = dataset.n_rows(),
        failures = failures.len(),
        "Stack analysis complete"
    );

    Ok(BatchOutput {
        dataset,
        frames,
        failures,
    })
}

fn read_frame<P>(provider: &Mutex<&mut P>, index: usize) -> Result<crate::frame::PixelBuffer>
where
    P: FrameProvider + ?Sized,
{
    let mut guard = provider.lock().map_err(|_| SmlmError::FrameAccess {
        index,
        reason: "frame provider lock poisoned".into(),
    })?;
    guard.get_pixels(index)
}
