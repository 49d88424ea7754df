//! Single-flight interactive preview.
//!
//! Every trigger starts a fresh worker thread for the requested frame and
//! cancels the one before it without waiting for it. A worker publishes to
//! the [`PreviewSink`] only if it is still the newest task when it finishes;
//! the generation check and the render happen under the same lock, so a
//! superseded task can never overwrite a newer result.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::error::{Result, SmlmError};
use crate::io::FrameProvider;
use crate::roi::Region;

use super::cancel::CancellationToken;
use super::config::{AnalysisConfig, AnalysisParams};
use super::processor::{FrameProcessor, FrameResult};

/// Receives preview output, e.g. to draw point markers over the image.
pub trait PreviewSink: Send + Sync {
    fn render(&self, frame_index: usize, result: &FrameResult);

    /// Remove any previously rendered output.
    fn clear(&self) {}
}

/// Everything a preview task needs, captured when it is triggered.
#[derive(Clone)]
pub struct PreviewRequest {
    pub frame_index: usize,
    pub params: AnalysisParams,
    pub region: Option<Arc<dyn Region>>,
}

pub type SharedProvider = Arc<Mutex<dyn FrameProvider + Send>>;

#[derive(Default)]
struct ControllerState {
    generation: u64,
    active: Option<CancellationToken>,
    last_request: Option<PreviewRequest>,
    disposed: bool,
}

pub struct LivePreviewController {
    provider: SharedProvider,
    sink: Arc<dyn PreviewSink>,
    state: Arc<Mutex<ControllerState>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LivePreviewController {
    pub fn new(provider: SharedProvider, sink: Arc<dyn PreviewSink>) -> Self {
        Self {
            provider,
            sink,
            state: Arc::new(Mutex::new(ControllerState::default())),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Validate `config` and preview `frame_index` with it.
    ///
    /// Invalid parameters clear the sink and start nothing.
    pub fn update_parameters(
        &self,
        config: &AnalysisConfig,
        frame_index: usize,
        region: Option<Arc<dyn Region>>,
    ) -> Result<u64> {
        let params = match config.validate() {
            Ok(p) => p,
            Err(e) => {
                {
                    let mut state = lock(&self.state);
                    if let Some(active) = state.active.take() {
                        active.cancel();
                    }
                    state.generation += 1;
                }
                self.sink.clear();
                return Err(e);
            }
        };
        self.trigger(PreviewRequest {
            frame_index,
            params,
            region,
        })
    }

    /// Re-run the last request on another frame. Returns `None` if no
    /// parameters have been supplied yet.
    pub fn set_frame(&self, frame_index: usize) -> Result<Option<u64>> {
        let last = lock(&self.state).last_request.clone();
        match last {
            Some(mut request) => {
                request.frame_index = frame_index;
                self.trigger(request).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Cancel the in-flight task, if any, and start a new one.
    ///
    /// Returns the generation number of the new task.
    pub fn trigger(&self, request: PreviewRequest) -> Result<u64> {
        let token = CancellationToken::new();
        let generation = {
            let mut state = lock(&self.state);
            if state.disposed {
                return Err(SmlmError::PreviewClosed);
            }
            if let Some(previous) = state.active.take() {
                previous.cancel();
            }
            state.generation += 1;
            state.active = Some(token.clone());
            state.last_request = Some(request.clone());
            state.generation
        };
        debug!(generation, frame = request.frame_index + 1, "Starting preview");

        let task = PreviewTask {
            provider: Arc::clone(&self.provider),
            sink: Arc::clone(&self.sink),
            state: Arc::clone(&self.state),
            generation,
            token,
            request,
        };
        let handle = std::thread::Builder::new()
            .name(format!("smlm-preview-{generation}"))
            .spawn(move || task.run())?;

        let mut workers = lock(&self.workers);
        workers.retain(|h| !h.is_finished());
        workers.push(handle);
        Ok(generation)
    }

    /// Generation of the most recently started task (0 before any trigger).
    pub fn current_generation(&self) -> u64 {
        lock(&self.state).generation
    }

    /// Block until every spawned task, superseded ones included, has exited.
    pub fn wait(&self) {
        let handles: Vec<JoinHandle<()>> = lock(&self.workers).drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("Preview worker panicked");
            }
        }
    }

    /// Stop previewing: cancel the active task, clear the sink and refuse
    /// further triggers.
    pub fn dispose(&self) {
        {
            let mut state = lock(&self.state);
            state.disposed = true;
            if let Some(active) = state.active.take() {
                active.cancel();
            }
        }
        self.wait();
        self.sink.clear();
    }
}

impl Drop for LivePreviewController {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.disposed = true;
        if let Some(active) = state.active.take() {
            active.cancel();
        }
    }
}

struct PreviewTask {
    provider: SharedProvider,
    sink: Arc<dyn PreviewSink>,
    state: Arc<Mutex<ControllerState>>,
    generation: u64,
    token: CancellationToken,
    request: PreviewRequest,
}

impl PreviewTask {
    fn run(self) {
        let frame_index = self.request.frame_index;
        let pixels = {
            let mut provider = lock(&self.provider);
            provider.get_pixels(frame_index)
        };
        let pixels = match pixels {
            Ok(p) => p,
            Err(error) => {
                warn!(frame = frame_index + 1, %error, "Preview frame unavailable");
                return;
            }
        };
        if self.token.is_cancelled() {
            return;
        }

        let processor = FrameProcessor::new(&self.request.params, self.request.region.as_deref());
        let result = processor.process(frame_index, &pixels, &self.token);

        let state = lock(&self.state);
        if state.disposed || state.generation != self.generation || self.token.is_cancelled() {
            debug!(generation = self.generation, "Discarding superseded preview");
            return;
        }
        self.sink.render(frame_index, &result);
    }
}
