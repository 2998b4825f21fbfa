//! Transcript segments and filter verdicts.

use serde::{Deserialize, Serialize};

use super::enums::FilterOutcome;

/// One timed segment produced by a transcription engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Recognized source-language text.
    pub text: String,
    /// Probability that the segment contains no speech, in [0, 1].
    #[serde(alias = "no_speech_prob")]
    pub no_speech_probability: f64,
    /// Average token log probability, always <= 0.
    #[serde(alias = "avg_logprob")]
    pub average_log_probability: f64,
}

impl TranscriptSegment {
    /// Create a segment with neutral confidence values.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            no_speech_probability: 0.0,
            average_log_probability: 0.0,
        }
    }

    /// Set confidence values (builder pattern).
    pub fn with_confidence(mut self, no_speech_probability: f64, average_log_probability: f64) -> Self {
        self.no_speech_probability = no_speech_probability;
        self.average_log_probability = average_log_probability;
        self
    }

    /// Duration in seconds (never negative).
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Reading speed in characters per second.
    ///
    /// Zero-duration segments read at infinite speed.
    pub fn chars_per_second(&self) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return f64::INFINITY;
        }
        self.text.trim().chars().count() as f64 / duration
    }
}

/// Filter decision for a single segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterVerdict {
    /// Index of the segment within the run's segment list.
    pub segment_index: usize,
    /// Decision.
    pub outcome: FilterOutcome,
    /// Human-readable reason (e.g. the metric that triggered the decision).
    pub reason: String,
}

impl FilterVerdict {
    pub fn new(segment_index: usize, outcome: FilterOutcome, reason: impl Into<String>) -> Self {
        Self {
            segment_index,
            outcome,
            reason: reason.into(),
        }
    }

    /// Whether the segment survives filtering.
    pub fn is_retained(&self) -> bool {
        self.outcome.is_retained()
    }

    /// Whether the segment is kept but needs manual review.
    pub fn needs_review(&self) -> bool {
        self.outcome == FilterOutcome::FlaggedFastReading
    }
}

/// Sort segments by start time and remove overlaps.
///
/// An overlapping segment trims the end of its predecessor to its own
/// start. NaN timestamps sort last.
pub fn normalize_segments(mut segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    for i in 1..segments.len() {
        let next_start = segments[i].start;
        let prev = &mut segments[i - 1];
        if prev.end > next_start {
            tracing::debug!(
                "Trimming overlapping segment end {:.3}s -> {:.3}s",
                prev.end,
                next_start
            );
            prev.end = next_start.max(prev.start);
        }
    }

    segments
}
