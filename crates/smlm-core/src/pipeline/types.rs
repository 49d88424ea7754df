/// Analysis stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisStage {
    Localizing,
    Aggregating,
}

impl std::fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Localizing => write!(f, "Localizing particles"),
            Self::Aggregating => write!(f, "Building dataset"),
        }
    }
}

/// Thread-safe progress reporting for batch analysis.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (e.g., frame count), if known.
    fn begin_stage(&self, _stage: AnalysisStage, _total_items: Option<usize>) {}

    /// Total number of work items completed so far in the current stage.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// Reporter that ignores all progress.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
