//! Per-job stage events.
//!
//! Every upload walks the same fixed sequence:
//!
//! ```text
//! Received → Validated → Described → Generated → Fetched → Rendered → Responded
//!     └──────────┴───────────┴───────────┴──────────┴──────────┴──▶ Failed
//! ```
//!
//! Inject an [`Arc<dyn StageObserver>`] via
//! [`crate::process::ColoringPipeline::with_observer`] to receive each
//! transition as it happens. The pipeline logs the same events through
//! `tracing` regardless of whether an observer is installed.
//!
//! # Example
//!
//! ```rust
//! use coloring_page::{JobId, Stage, StageObserver};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl StageObserver for Counter {
//!     fn on_stage(&self, _id: &JobId, _stage: Stage) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::error::ColoringError;
use crate::job::JobId;
use std::fmt;
use std::sync::Arc;

/// A state in a job's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Identifier assigned, nothing checked yet.
    Received,
    /// Type and size accepted, original persisted.
    Validated,
    /// Vision call returned a description.
    Described,
    /// Generation call returned an image URL.
    Generated,
    /// Generated image downloaded and persisted.
    Fetched,
    /// PDF written.
    Rendered,
    /// Success record handed back to the caller.
    Responded,
    /// Terminal failure.
    Failed,
}

impl Stage {
    /// The stage that follows this one on the success path.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Received => Some(Stage::Validated),
            Stage::Validated => Some(Stage::Described),
            Stage::Described => Some(Stage::Generated),
            Stage::Generated => Some(Stage::Fetched),
            Stage::Fetched => Some(Stage::Rendered),
            Stage::Rendered => Some(Stage::Responded),
            Stage::Responded | Stage::Failed => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Described => "described",
            Stage::Generated => "generated",
            Stage::Fetched => "fetched",
            Stage::Rendered => "rendered",
            Stage::Responded => "responded",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives stage transitions for every job a pipeline runs.
///
/// Jobs run concurrently, so implementations must be `Send + Sync` and
/// protect any shared mutable state themselves. All methods default to
/// no-ops.
pub trait StageObserver: Send + Sync {
    /// Called each time a job reaches `stage` on the success path.
    fn on_stage(&self, id: &JobId, stage: Stage) {
        let _ = (id, stage);
    }

    /// Called once when a job fails.
    ///
    /// `reached` is the last stage the job completed; the failure happened
    /// while trying to reach `reached.next()`.
    fn on_failure(&self, id: &JobId, reached: Stage, error: &ColoringError) {
        let _ = (id, reached, error);
    }
}

/// Observer used when none is configured.
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

/// Convenience alias for the type held by the pipeline.
pub type SharedObserver = Arc<dyn StageObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        stages: Mutex<Vec<Stage>>,
        failed_after: Mutex<Option<Stage>>,
    }

    impl StageObserver for Recording {
        fn on_stage(&self, _id: &JobId, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_failure(&self, _id: &JobId, reached: Stage, _error: &ColoringError) {
            *self.failed_after.lock().unwrap() = Some(reached);
        }
    }

    #[test]
    fn success_path_is_linear() {
        let mut stage = Stage::Received;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(
            seen,
            vec![
                Stage::Received,
                Stage::Validated,
                Stage::Described,
                Stage::Generated,
                Stage::Fetched,
                Stage::Rendered,
                Stage::Responded,
            ]
        );
        assert_eq!(Stage::Failed.next(), None);
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let id = JobId::new();
        let obs: SharedObserver = Arc::new(NoopObserver);
        obs.on_stage(&id, Stage::Received);
        obs.on_failure(&id, Stage::Validated, &ColoringError::EmptyGeneration);
    }

    #[test]
    fn recording_observer_receives_events() {
        let id = JobId::new();
        let rec = Recording::default();
        rec.on_stage(&id, Stage::Received);
        rec.on_stage(&id, Stage::Validated);
        rec.on_failure(&id, Stage::Validated, &ColoringError::EmptyDescription);

        assert_eq!(*rec.stages.lock().unwrap(), vec![Stage::Received, Stage::Validated]);
        assert_eq!(*rec.failed_after.lock().unwrap(), Some(Stage::Validated));
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(Stage::Described.to_string(), "described");
    }
}
