mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use smlm_core::error::{Result, SmlmError};
use smlm_core::frame::PixelBuffer;
use smlm_core::io::{FrameProvider, InMemoryStack};
use smlm_core::pipeline::{AnalysisConfig, FrameResult, LivePreviewController, PreviewSink};
use smlm_core::roi::{Region, RoiRect};

use common::{render_spots, spot, test_config};

/// Frame `i` holds `i + 1` emitters along the top row.
fn frames(n: usize) -> Vec<PixelBuffer> {
    (0..n)
        .map(|i| {
            let spots: Vec<_> = (0..=i).map(|k| spot(8.0 + 12.0 * k as f64, 8.0, 1000.0)).collect();
            render_spots(48, 16, &spots, 1.5, 100.0)
        })
        .collect()
}

#[derive(Default)]
struct RecordingSink {
    renders: Mutex<Vec<(usize, usize)>>,
    clears: AtomicUsize,
    events: Mutex<Vec<&'static str>>,
}

impl PreviewSink for RecordingSink {
    fn render(&self, frame_index: usize, result: &FrameResult) {
        self.renders.lock().unwrap().push((frame_index, result.len()));
        self.events.lock().unwrap().push("render");
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push("clear");
    }
}

/// Blocks every read until the gate opens.
struct GatedProvider {
    inner: InMemoryStack,
    gate: Arc<(Mutex<bool>, Condvar)>,
    reads: Arc<AtomicUsize>,
}

impl FrameProvider for GatedProvider {
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
        self.reads.fetch_add(1, Ordering::SeqCst);
        let (lock, cvar) = &*self.gate;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
        self.inner.get_pixels(index)
    }
}

fn wait_for(reads: &AtomicUsize, n: usize) {
    let start = Instant::now();
    while reads.load(Ordering::SeqCst) < n {
        assert!(start.elapsed() < Duration::from_secs(10), "worker never started");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn controller(n: usize) -> (LivePreviewController, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let stack = InMemoryStack::new(frames(n)).unwrap();
    let controller = LivePreviewController::new(Arc::new(Mutex::new(stack)), sink.clone());
    (controller, sink)
}

#[test]
fn test_preview_renders_requested_frame() {
    let (controller, sink) = controller(3);
    let generation = controller.update_parameters(&test_config(), 1, None).unwrap();
    assert_eq!(generation, 1);
    controller.wait();
    assert_eq!(*sink.renders.lock().unwrap(), vec![(1, 2)]);
}

#[test]
fn test_only_latest_request_renders() {
    let gate = Arc::new((Mutex::new(false), Condvar::new()));
    let reads = Arc::new(AtomicUsize::new(0));
    let provider = GatedProvider {
        inner: InMemoryStack::new(frames(3)).unwrap(),
        gate: gate.clone(),
        reads: reads.clone(),
    };
    let sink = Arc::new(RecordingSink::default());
    let controller = LivePreviewController::new(Arc::new(Mutex::new(provider)), sink.clone());

    controller.update_parameters(&test_config(), 0, None).unwrap();
    wait_for(&reads, 1);
    assert_eq!(controller.set_frame(1).unwrap(), Some(2));
    assert_eq!(controller.set_frame(2).unwrap(), Some(3));
    assert_eq!(controller.current_generation(), 3);

    {
        let (lock, cvar) = &*gate;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }
    controller.wait();

    assert_eq!(*sink.renders.lock().unwrap(), vec![(2, 3)]);
}

#[test]
fn test_set_frame_without_parameters() {
    let (controller, sink) = controller(2);
    assert_eq!(controller.set_frame(1).unwrap(), None);
    assert_eq!(controller.current_generation(), 0);
    controller.wait();
    assert!(sink.renders.lock().unwrap().is_empty());
}

#[test]
fn test_invalid_parameters_clear_output() {
    let (controller, sink) = controller(2);
    let config = AnalysisConfig {
        noise_threshold: -5.0,
        ..test_config()
    };
    let result = controller.update_parameters(&config, 0, None);
    assert!(matches!(result, Err(SmlmError::InvalidConfig(_))));
    assert_eq!(sink.clears.load(Ordering::SeqCst), 1);
    assert_eq!(controller.current_generation(), 1);
    controller.wait();
    assert!(sink.renders.lock().unwrap().is_empty());
}

#[test]
fn test_invalid_parameters_cancel_running_preview() {
    let gate = Arc::new((Mutex::new(false), Condvar::new()));
    let reads = Arc::new(AtomicUsize::new(0));
    let provider = GatedProvider {
        inner: InMemoryStack::new(frames(2)).unwrap(),
        gate: gate.clone(),
        reads: reads.clone(),
    };
    let sink = Arc::new(RecordingSink::default());
    let controller = LivePreviewController::new(Arc::new(Mutex::new(provider)), sink.clone());

    controller.update_parameters(&test_config(), 1, None).unwrap();
    wait_for(&reads, 1);
    let config = AnalysisConfig {
        noise_threshold: -5.0,
        ..test_config()
    };
    assert!(controller.update_parameters(&config, 1, None).is_err());
    assert_eq!(controller.current_generation(), 2);

    {
        let (lock, cvar) = &*gate;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }
    controller.wait();

    assert!(sink.renders.lock().unwrap().is_empty());
    assert_eq!(sink.events.lock().unwrap().last(), Some(&"clear"));
}

#[test]
fn test_region_limits_preview() {
    let (controller, sink) = controller(3);
    let roi: Arc<dyn Region> = Arc::new(RoiRect {
        x: 0,
        y: 0,
        width: 24,
        height: 16,
    });
    controller.update_parameters(&test_config(), 2, Some(roi)).unwrap();
    controller.wait();
    assert_eq!(*sink.renders.lock().unwrap(), vec![(2, 2)]);
}

#[test]
fn test_missing_frame_renders_nothing() {
    let (controller, sink) = controller(1);
    controller.update_parameters(&test_config(), 5, None).unwrap();
    controller.wait();
    assert!(sink.renders.lock().unwrap().is_empty());
}

#[test]
fn test_dispose_stops_previews() {
    let (controller, sink) = controller(2);
    controller.update_parameters(&test_config(), 0, None).unwrap();
    controller.dispose();
    assert!(sink.clears.load(Ordering::SeqCst) >= 1);
    assert!(matches!(
        controller.set_frame(1),
        Err(SmlmError::PreviewClosed)
    ));
    assert!(matches!(
        controller.update_parameters(&test_config(), 0, None),
        Err(SmlmError::PreviewClosed)
    ));
}
