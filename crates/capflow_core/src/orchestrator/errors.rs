//! Error types for pipeline runs.
//!
//! Stage errors never escape a run: they are mapped to a machine-readable
//! [`FailureReason`] and reported as the run's terminal state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::ProbeError;
use crate::models::Engine;
use crate::transcribe::TranscriptionError;

/// Why a run ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// Media duration could not be measured.
    ProbeError,
    /// Transcription failed, including the fast-engine fallback.
    TranscriptionUnavailable,
    /// Translation infrastructure failed for every batch.
    RetriesExhausted,
    /// The run was cancelled.
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::ProbeError => write!(f, "ProbeError"),
            FailureReason::TranscriptionUnavailable => write!(f, "TranscriptionUnavailable"),
            FailureReason::RetriesExhausted => write!(f, "RetriesExhausted"),
            FailureReason::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Error from a single pipeline stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Duration probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("Transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("{engine} engine timed out after {secs}s")]
    TranscriptionTimeout { engine: Engine, secs: u64 },

    #[error("Cancelled during {0}")]
    Cancelled(String),
}

impl StageError {
    pub fn cancelled(stage: impl Into<String>) -> Self {
        Self::Cancelled(stage.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StageError::Cancelled(_))
    }

    /// Terminal failure reason for this error.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            StageError::Probe(_) => FailureReason::ProbeError,
            StageError::Transcription(_) | StageError::TranscriptionTimeout { .. } => {
                FailureReason::TranscriptionUnavailable
            }
            StageError::Cancelled(_) => FailureReason::Cancelled,
        }
    }
}
