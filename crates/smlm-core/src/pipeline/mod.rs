pub mod batch;
mod cancel;
pub mod config;
pub mod dataset;
pub mod preview;
pub mod processor;
mod types;

pub use batch::{analyze_stack, BatchOutput, FrameFailure};
pub use cancel::CancellationToken;
pub use config::{AnalysisConfig, AnalysisParams, Calibration};
pub use dataset::Dataset;
pub use preview::{LivePreviewController, PreviewRequest, PreviewSink};
pub use processor::{FrameProcessor, FrameResult, Rejection};
pub use types::{AnalysisStage, NoOpReporter, ProgressReporter};
