//! Transcription collaborator interface.

mod command;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Engine, TranscriptSegment};

pub use command::{parse_segments_json, CommandTranscriber, EngineCommand, INPUT_PLACEHOLDER};

/// Whole-engine transcription failure.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("{0} engine is not available")]
    Unavailable(Engine),

    #[error("Failed to start {engine} engine: {message}")]
    Spawn { engine: Engine, message: String },

    #[error("{engine} engine failed with exit code {exit_code}: {message}")]
    CommandFailed {
        engine: Engine,
        exit_code: i32,
        message: String,
    },

    #[error("Invalid engine output: {0}")]
    InvalidOutput(String),

    #[error("Audio preparation failed: {0}")]
    Audio(String),
}

impl TranscriptionError {
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }
}

/// Speech-to-text collaborator.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Capability probe. Must not fail.
    async fn is_available(&self, engine: Engine) -> bool;

    /// Transcribe the whole source with one engine.
    async fn transcribe(
        &self,
        source: &Path,
        engine: Engine,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError>;
}
