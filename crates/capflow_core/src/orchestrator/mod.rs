//! Pipeline orchestration.
//!
//! Each media unit moves through a fixed state machine:
//!
//! ```text
//! Pending -> Selecting -> Transcribing -> Filtering -> Translating
//!         -> {Completed, PartiallyCompleted, Failed, Skipped}
//! ```
//!
//! Stages inside a run never overlap; different runs are independent and
//! may execute concurrently through the [`QueueProcessor`].

mod errors;
mod queue_processor;
mod run;
mod types;

pub use errors::{FailureReason, StageError};
pub use queue_processor::{QueueLogCallback, QueueProcessor};
pub use run::Orchestrator;
pub use types::{
    OutcomeCounts, PipelineRun, ProgressCallback, RunOutcome, RunReport, RunStage, SkipReason,
};
