//! Core enums used throughout the pipeline.

use serde::{Deserialize, Serialize};

/// Speech recognition engine variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Low-latency engine, accumulates timing drift on long media.
    Fast,
    /// High-accuracy engine with drift-resistant alignment, expensive.
    Accurate,
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Fast => write!(f, "fast"),
            Engine::Accurate => write!(f, "accurate"),
        }
    }
}

/// Caller hint about spare processing time for a media unit.
///
/// Only consulted when the duration falls between the short and long
/// thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBudget {
    /// No spare time; prefer the fast engine.
    #[default]
    Tight,
    /// Spare time available; the accurate engine may be used.
    Spare,
}

/// Outcome of the confidence filter for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOutcome {
    /// Segment retained.
    Kept,
    /// Dropped: the engine reported a high no-speech probability.
    DroppedSilence,
    /// Dropped: average log probability below the limit.
    DroppedLowConfidence,
    /// Dropped: known hallucination phrase or repetition pattern.
    DroppedHallucination,
    /// Retained, but reading speed exceeds the CPS limit.
    FlaggedFastReading,
}

impl FilterOutcome {
    /// Whether the segment survives filtering.
    pub fn is_retained(&self) -> bool {
        matches!(self, FilterOutcome::Kept | FilterOutcome::FlaggedFastReading)
    }

    /// Short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            FilterOutcome::Kept => "kept",
            FilterOutcome::DroppedSilence => "dropped_silence",
            FilterOutcome::DroppedLowConfidence => "dropped_low_confidence",
            FilterOutcome::DroppedHallucination => "dropped_hallucination",
            FilterOutcome::FlaggedFastReading => "flagged_fast_reading",
        }
    }
}

impl std::fmt::Display for FilterOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a translation request ended without a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// The translation service will never accept this content.
    PermanentlyBlocked,
    /// Every allowed attempt failed transiently.
    RetriesExhausted,
    /// The run was cancelled before the request could succeed.
    Cancelled,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::PermanentlyBlocked => write!(f, "PermanentlyBlocked"),
            RejectReason::RetriesExhausted => write!(f, "RetriesExhausted"),
            RejectReason::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flagged_segments_are_retained() {
        assert!(FilterOutcome::Kept.is_retained());
        assert!(FilterOutcome::FlaggedFastReading.is_retained());
        assert!(!FilterOutcome::DroppedSilence.is_retained());
        assert!(!FilterOutcome::DroppedHallucination.is_retained());
    }

    #[test]
    fn engine_serializes_lowercase() {
        let json = serde_json::to_string(&Engine::Accurate).unwrap();
        assert_eq!(json, "\"accurate\"");
    }
}
