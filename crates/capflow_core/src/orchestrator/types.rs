//! Core types for pipeline runs.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;

use super::errors::FailureReason;
use crate::engine::EngineSelection;
use crate::filter::FilterReport;
use crate::models::{Engine, MediaRequest, MediaUnit, RejectReason};
use crate::subtitles::CaptionEntry;

/// Progress callback type for reporting run progress.
///
/// Arguments: (unit_id, stage, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, RunStage, u32, &str) + Send + Sync>;

/// Stages of one run, terminal states included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunStage {
    Pending,
    Selecting,
    Transcribing,
    Filtering,
    Translating,
    Completed,
    PartiallyCompleted,
    Failed,
    Skipped,
}

impl RunStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStage::Completed | RunStage::PartiallyCompleted | RunStage::Failed | RunStage::Skipped
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunStage::Pending => "Pending",
            RunStage::Selecting => "Selecting",
            RunStage::Transcribing => "Transcribing",
            RunStage::Filtering => "Filtering",
            RunStage::Translating => "Translating",
            RunStage::Completed => "Completed",
            RunStage::PartiallyCompleted => "PartiallyCompleted",
            RunStage::Failed => "Failed",
            RunStage::Skipped => "Skipped",
        }
    }

    /// Whether the state machine allows `self -> next`.
    ///
    /// `Failed` is reachable from every non-terminal stage (probe errors
    /// and cancellation).
    pub fn can_transition_to(&self, next: RunStage) -> bool {
        use RunStage::*;
        match (*self, next) {
            (s, Failed) => !s.is_terminal(),
            (Pending, Selecting)
            | (Selecting, Transcribing)
            | (Transcribing, Filtering)
            | (Filtering, Translating)
            | (Filtering, Skipped)
            | (Translating, Completed)
            | (Translating, PartiallyCompleted)
            | (Translating, Skipped) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a run ended in `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The filter dropped every segment.
    NothingToTranslate,
    /// Every batch was permanently blocked by the translation service.
    AllBlocked,
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Completed,
    PartiallyCompleted,
    Failed(FailureReason),
    Skipped(SkipReason),
}

impl RunOutcome {
    pub fn stage(&self) -> RunStage {
        match self {
            RunOutcome::Completed => RunStage::Completed,
            RunOutcome::PartiallyCompleted => RunStage::PartiallyCompleted,
            RunOutcome::Failed(_) => RunStage::Failed,
            RunOutcome::Skipped(_) => RunStage::Skipped,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            RunOutcome::Failed(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Whether captions were produced.
    pub fn has_output(&self) -> bool {
        matches!(self, RunOutcome::Completed | RunOutcome::PartiallyCompleted)
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Failed(reason) => write!(f, "Failed({})", reason),
            RunOutcome::Skipped(reason) => write!(f, "Skipped({:?})", reason),
            other => f.write_str(other.stage().name()),
        }
    }
}

/// Segment counts per translation outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub permanently_blocked: usize,
    pub retries_exhausted: usize,
    pub cancelled: usize,
}

impl OutcomeCounts {
    pub fn from_captions(captions: &[CaptionEntry]) -> Self {
        let mut counts = Self::default();
        for caption in captions {
            match caption.reject_reason() {
                None => counts.succeeded += 1,
                Some(RejectReason::PermanentlyBlocked) => counts.permanently_blocked += 1,
                Some(RejectReason::RetriesExhausted) => counts.retries_exhausted += 1,
                Some(RejectReason::Cancelled) => counts.cancelled += 1,
            }
        }
        counts
    }

    pub fn untranslated(&self) -> usize {
        self.permanently_blocked + self.retries_exhausted + self.cancelled
    }
}

/// Mutable state of one run. Owned by the orchestrator while it runs.
pub struct PipelineRun {
    pub unit_id: String,
    pub source: PathBuf,
    pub stage: RunStage,
    pub history: Vec<RunStage>,
    pub unit: Option<MediaUnit>,
    pub selection: Option<EngineSelection>,
    pub engine_used: Option<Engine>,
    pub fallback_used: bool,
    pub filter: Option<FilterReport>,
    pub captions: Vec<CaptionEntry>,
    pub batch_count: usize,
    pub message: Option<String>,
    started: Instant,
}

impl PipelineRun {
    pub fn new(request: &MediaRequest) -> Self {
        Self {
            unit_id: request.id.clone(),
            source: request.source.clone(),
            stage: RunStage::Pending,
            history: vec![RunStage::Pending],
            unit: None,
            selection: None,
            engine_used: None,
            fallback_used: false,
            filter: None,
            captions: Vec::new(),
            batch_count: 0,
            message: None,
            started: Instant::now(),
        }
    }

    /// Move to `next`, recording it in the history.
    pub fn advance(&mut self, next: RunStage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "invalid transition {} -> {}",
            self.stage,
            next
        );
        self.stage = next;
        self.history.push(next);
    }

    pub fn entered(&self, stage: RunStage) -> bool {
        self.history.contains(&stage)
    }

    /// Close the run with its terminal outcome.
    pub fn finish(mut self, outcome: RunOutcome) -> RunReport {
        self.advance(outcome.stage());
        let counts = OutcomeCounts::from_captions(&self.captions);
        RunReport {
            unit_id: self.unit_id,
            source: self.source,
            duration_secs: self.unit.as_ref().map(|u| u.duration_secs()),
            target_language: self.unit.as_ref().map(|u| u.target_language().to_string()),
            outcome,
            stage_history: self.history,
            selection: self.selection,
            engine_used: self.engine_used,
            fallback_used: self.fallback_used,
            capability_degraded: self.selection.map(|s| s.degraded).unwrap_or(false),
            filter: self.filter,
            captions: self.captions,
            counts,
            batch_count: self.batch_count,
            message: self.message,
            output_path: None,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

/// Final report of one run, handed to callers and reporting sinks.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub unit_id: String,
    pub source: PathBuf,
    pub duration_secs: Option<f64>,
    pub target_language: Option<String>,
    pub outcome: RunOutcome,
    pub stage_history: Vec<RunStage>,
    pub selection: Option<EngineSelection>,
    pub engine_used: Option<Engine>,
    pub fallback_used: bool,
    pub capability_degraded: bool,
    pub filter: Option<FilterReport>,
    /// Retained segments in time order with their translations.
    pub captions: Vec<CaptionEntry>,
    pub counts: OutcomeCounts,
    pub batch_count: usize,
    /// Detail for failed or skipped runs.
    pub message: Option<String>,
    /// Caption file written for this run, if any.
    pub output_path: Option<PathBuf>,
    pub elapsed_secs: f64,
}

impl RunReport {
    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.outcome.failure_reason()
    }

    pub fn entered(&self, stage: RunStage) -> bool {
        self.stage_history.contains(&stage)
    }

    /// Pretty JSON for reporting sinks.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
