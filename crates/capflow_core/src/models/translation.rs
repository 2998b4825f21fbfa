//! Translation requests and collaborator outcomes.

use serde::{Deserialize, Serialize};

/// One batch of segment texts submitted for translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Index of the batch within the run.
    pub batch_id: usize,
    /// Segment texts, in segment order.
    pub texts: Vec<String>,
    /// Target language.
    pub target_language: String,
    /// Attempts made so far. Only ever increases.
    pub attempt_count: u32,
    /// Reason of the most recent failed attempt.
    pub last_failure: Option<String>,
}

impl TranslationRequest {
    pub fn new(batch_id: usize, texts: Vec<String>, target_language: impl Into<String>) -> Self {
        Self {
            batch_id,
            texts,
            target_language: target_language.into(),
            attempt_count: 0,
            last_failure: None,
        }
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Result of one translation attempt.
///
/// Permanent and transient failures are kept distinct: the retry policy
/// depends on the difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TranslationOutcome {
    /// Translated texts, one per input text.
    Success(Vec<String>),
    /// The service will never accept this content.
    PermanentReject(String),
    /// Retry-worthy failure (timeout, rate limit, infrastructure).
    TransientFailure(String),
}

impl TranslationOutcome {
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::PermanentReject(reason.into())
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::TransientFailure(reason.into())
    }
}
