//! Caption output: the final (segment, translation, status) tuples and SRT.

mod srt;
mod wrap;

use std::path::PathBuf;

use serde::Serialize;

use crate::models::{RejectReason, TranscriptSegment};

pub use srt::{format_srt_time, write_srt, write_srt_file, SrtOptions};
pub use wrap::{wrap_caption, MAX_LINES, MAX_LINE_CHARS};

/// Errors from writing caption files.
#[derive(Debug, thiserror::Error)]
pub enum SubtitleError {
    /// Failed to write subtitle file.
    #[error("Failed to write file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Translation status of one caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptionStatus {
    Translated,
    Untranslated(RejectReason),
}

/// One retained segment with its translation, as handed to writers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionEntry {
    pub segment: TranscriptSegment,
    /// `None` when the segment's batch was rejected.
    pub translation: Option<String>,
    pub status: CaptionStatus,
    /// Kept but flagged for manual review (reading speed).
    pub needs_review: bool,
}

impl CaptionEntry {
    pub fn translated(segment: TranscriptSegment, text: impl Into<String>) -> Self {
        Self {
            segment,
            translation: Some(text.into()),
            status: CaptionStatus::Translated,
            needs_review: false,
        }
    }

    pub fn untranslated(segment: TranscriptSegment, reason: RejectReason) -> Self {
        Self {
            segment,
            translation: None,
            status: CaptionStatus::Untranslated(reason),
            needs_review: false,
        }
    }

    pub fn with_review(mut self, needs_review: bool) -> Self {
        self.needs_review = needs_review;
        self
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self.status {
            CaptionStatus::Translated => None,
            CaptionStatus::Untranslated(reason) => Some(reason),
        }
    }

    /// Text to display: the translation, or the source text.
    pub fn display_text(&self) -> &str {
        self.translation.as_deref().unwrap_or(&self.segment.text)
    }
}
