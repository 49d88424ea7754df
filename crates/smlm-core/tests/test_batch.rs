mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use approx::assert_abs_diff_eq;
use smlm_core::error::{Result, SmlmError};
use smlm_core::frame::PixelBuffer;
use smlm_core::io::{FrameProvider, InMemoryStack};
use smlm_core::pipeline::{analyze_stack, AnalysisStage, NoOpReporter, ProgressReporter};
use smlm_core::roi::{Region, RoiRect};

use common::{noise_frame, render_spots, spot, test_config};

/// Frame `i` holds `i % 3 + 1` well separated emitters.
fn synthetic_stack(n: usize) -> Vec<PixelBuffer> {
    let positions = [(8.0, 8.0), (24.0, 8.0), (8.0, 24.0)];
    (0..n)
        .map(|i| {
            let spots: Vec<_> = positions[..i % 3 + 1]
                .iter()
                .map(|&(x, y)| spot(x + 0.07 * i as f64, y, 1000.0))
                .collect();
            render_spots(32, 32, &spots, 1.5, 100.0)
        })
        .collect()
}

/// Fails on one frame index.
struct FlakyProvider {
    inner: InMemoryStack,
    broken: usize,
}

impl FrameProvider for FlakyProvider {
    fn frame_count(&self) -> usize {
        self.inner.frame_count()
    }
    fn width(&self) -> usize {
        self.inner.width()
    }
    fn height(&self) -> usize {
        self.inner.height()
    }
    fn get_pixels(&mut self, index: usize) -> Result<PixelBuffer> {
        if index == self.broken {
            return Err(SmlmError::FrameAccess {
                index,
                reason: "corrupt frame".into(),
            });
        }
        self.inner.get_pixels(index)
    }
}

struct EmptyProvider;

impl FrameProvider for EmptyProvider {
    fn frame_count(&self) -> usize {
        0
    }
    fn width(&self) -> usize {
        32
    }
    fn height(&self) -> usize {
        32
    }
    fn get_pixels(&mut self, index: usize) -> Result<PixelBuffer> {
        Err(SmlmError::FrameIndexOutOfRange { index, total: 0 })
    }
}

#[derive(Default)]
struct RecordingReporter {
    stages: Mutex<Vec<(AnalysisStage, Option<usize>)>>,
    max_done: AtomicUsize,
}

impl ProgressReporter for RecordingReporter {
    fn begin_stage(&self, stage: AnalysisStage, total_items: Option<usize>) {
        self.stages.lock().unwrap().push((stage, total_items));
    }
    fn advance(&self, items_done: usize) {
        self.max_done.fetch_max(items_done, Ordering::Relaxed);
    }
}

#[test]
fn test_stack_rows_follow_frame_order() {
    let mut stack = InMemoryStack::new(synthetic_stack(9)).unwrap();
    let params = test_config().validate().unwrap();
    let output = analyze_stack(&mut stack, &params, None, &NoOpReporter).unwrap();

    assert_eq!(output.frames.len(), 9);
    assert!(output.failures.is_empty());
    for (i, frame) in output.frames.iter().enumerate() {
        assert_eq!(frame.frame_index, i);
        assert_eq!(frame.len(), i % 3 + 1, "frame {i}");
    }
    assert_eq!(output.total_localizations(), 18);

    let frame_col = output.dataset.column("frame").unwrap().to_vec();
    assert_eq!(frame_col[0], 1.0);
    assert_eq!(*frame_col.last().unwrap(), 9.0);
    assert!(frame_col.windows(2).all(|w| w[0] <= w[1]));

    // First emitter of frame 1, converted to nm at 100 nm/px.
    let x = output.dataset.column("x").unwrap();
    assert_abs_diff_eq!(x[0], 800.0, epsilon = 20.0);
}

#[test]
fn test_stack_is_deterministic() {
    let params = test_config().validate().unwrap();
    let frames = synthetic_stack(12);
    let mut a = InMemoryStack::new(frames.clone()).unwrap();
    let mut b = InMemoryStack::new(frames).unwrap();
    let first = analyze_stack(&mut a, &params, None, &NoOpReporter).unwrap();
    let second = analyze_stack(&mut b, &params, None, &NoOpReporter).unwrap();
    assert_eq!(first.dataset, second.dataset);
}

#[test]
fn test_unreadable_frame_is_skipped() {
    let mut provider = FlakyProvider {
        inner: InMemoryStack::new(synthetic_stack(3)).unwrap(),
        broken: 1,
    };
    let params = test_config().validate().unwrap();
    let output = analyze_stack(&mut provider, &params, None, &NoOpReporter).unwrap();

    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].frame_number(), 2);
    assert!(matches!(
        output.failures[0].error,
        SmlmError::FrameAccess { index: 1, .. }
    ));
    assert_eq!(output.frames.len(), 3);
    assert!(output.frames[1].is_empty());

    let frame_col = output.dataset.column("frame").unwrap().to_vec();
    assert_eq!(frame_col, vec![1.0, 3.0, 3.0, 3.0]);
}

#[test]
fn test_empty_stack_errors() {
    let params = test_config().validate().unwrap();
    let result = analyze_stack(&mut EmptyProvider, &params, None, &NoOpReporter);
    assert!(matches!(result, Err(SmlmError::EmptySequence)));
}

#[test]
fn test_noise_stack_yields_empty_dataset() {
    let frames = (0..5).map(|i| noise_frame(32, 32, 100.0, 20.0, i)).collect();
    let mut stack = InMemoryStack::new(frames).unwrap();
    let params = test_config().validate().unwrap();
    let output = analyze_stack(&mut stack, &params, None, &NoOpReporter).unwrap();
    assert!(output.dataset.is_empty());
    assert_eq!(output.dataset.n_columns(), 6);
    assert_eq!(output.frames.len(), 5);
}

#[test]
fn test_region_applies_to_every_frame() {
    let mut stack = InMemoryStack::new(synthetic_stack(6)).unwrap();
    let params = test_config().validate().unwrap();
    let roi = RoiRect {
        x: 0,
        y: 0,
        width: 16,
        height: 16,
    };
    let output = analyze_stack(&mut stack, &params, Some(&roi as &dyn Region), &NoOpReporter).unwrap();
    assert!(output.frames.iter().all(|f| f.len() == 1));
}

#[test]
fn test_progress_reported() {
    let mut stack = InMemoryStack::new(synthetic_stack(5)).unwrap();
    let params = test_config().validate().unwrap();
    let reporter = RecordingReporter::default();
    analyze_stack(&mut stack, &params, None, &reporter).unwrap();

    let stages = reporter.stages.lock().unwrap().clone();
    assert_eq!(
        stages,
        vec![
            (AnalysisStage::Localizing, Some(5)),
            (AnalysisStage::Aggregating, None)
        ]
    );
    assert_eq!(reporter.max_done.load(Ordering::Relaxed), 5);
}

#[test]
fn test_in_memory_stack_bounds() {
    let mut stack = InMemoryStack::new(synthetic_stack(2)).unwrap();
    assert_eq!(stack.frame_count(), 2);
    assert!(matches!(
        stack.get_pixels(2),
        Err(SmlmError::FrameIndexOutOfRange { index: 2, total: 2 })
    ));
    assert!(matches!(
        InMemoryStack::new(Vec::new()),
        Err(SmlmError::EmptySequence)
    ));
    let mixed = vec![noise_frame(8, 8, 0.0, 1.0, 1), noise_frame(9, 8, 0.0, 1.0, 2)];
    assert!(InMemoryStack::new(mixed).is_err());
}
