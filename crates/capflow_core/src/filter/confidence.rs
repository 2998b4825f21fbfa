//! Per-segment confidence filter.

use serde::Serialize;

use super::hallucination::{is_word_loop, PhraseMatcher};
use super::repetition::collapse_consecutive_repeats;
use crate::config::FilterSettings;
use crate::models::{FilterOutcome, FilterVerdict, TranscriptSegment};

/// Decides keep/drop for transcript segments.
///
/// Checks run in a fixed order and the first match wins:
/// 1. no-speech probability above the limit → silence
/// 2. known phrase or word loop → hallucination
/// 3. average log probability below the limit → low confidence
/// 4. otherwise kept, flagged when reading speed exceeds the CPS limit
#[derive(Debug, Clone)]
pub struct ConfidenceFilter {
    settings: FilterSettings,
    phrases: PhraseMatcher,
}

impl ConfidenceFilter {
    pub fn new(settings: FilterSettings) -> Self {
        let phrases = PhraseMatcher::new(&settings.hallucination_phrases);
        Self { settings, phrases }
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// Evaluate a single segment. Pure and total.
    pub fn evaluate(&self, segment_index: usize, segment: &TranscriptSegment) -> FilterVerdict {
        let s = &self.settings;

        if segment.no_speech_probability > s.no_speech_limit {
            return FilterVerdict::new(
                segment_index,
                FilterOutcome::DroppedSilence,
                format!(
                    "no_speech_probability {:.2} > {:.2}",
                    segment.no_speech_probability, s.no_speech_limit
                ),
            );
        }

        if let Some(phrase) = self.phrases.find_match(&segment.text) {
            return FilterVerdict::new(
                segment_index,
                FilterOutcome::DroppedHallucination,
                format!("known phrase '{}'", phrase),
            );
        }

        if s.detect_repetition && is_word_loop(&segment.text) {
            return FilterVerdict::new(
                segment_index,
                FilterOutcome::DroppedHallucination,
                "repeated words within segment",
            );
        }

        if segment.average_log_probability < s.log_prob_limit {
            return FilterVerdict::new(
                segment_index,
                FilterOutcome::DroppedLowConfidence,
                format!(
                    "average_log_probability {:.2} < {:.2}",
                    segment.average_log_probability, s.log_prob_limit
                ),
            );
        }

        let cps = segment.chars_per_second();
        if cps > s.cps_limit {
            return FilterVerdict::new(
                segment_index,
                FilterOutcome::FlaggedFastReading,
                format!("{:.1} chars/s > {:.1}", cps, s.cps_limit),
            );
        }

        FilterVerdict::new(segment_index, FilterOutcome::Kept, "")
    }

    /// Evaluate every segment, then collapse consecutive repeats.
    ///
    /// The report holds exactly one verdict per input segment, in order.
    pub fn filter_segments(&self, segments: &[TranscriptSegment]) -> FilterReport {
        let mut verdicts: Vec<FilterVerdict> = segments
            .iter()
            .enumerate()
            .map(|(i, seg)| self.evaluate(i, seg))
            .collect();

        let repeats = collapse_consecutive_repeats(
            segments,
            &mut verdicts,
            self.settings.max_consecutive_repeats,
        );
        if repeats > 0 {
            tracing::debug!("[Filter] Collapsed {} repeated captions", repeats);
        }

        FilterReport::new(verdicts)
    }
}

/// Number of verdicts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterCounts {
    pub kept: usize,
    pub flagged_fast_reading: usize,
    pub dropped_silence: usize,
    pub dropped_low_confidence: usize,
    pub dropped_hallucination: usize,
}

impl FilterCounts {
    /// Segments that survive filtering.
    pub fn retained(&self) -> usize {
        self.kept + self.flagged_fast_reading
    }

    /// Segments removed by filtering.
    pub fn dropped(&self) -> usize {
        self.dropped_silence + self.dropped_low_confidence + self.dropped_hallucination
    }
}

/// Verdicts for one run's segments.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterReport {
    pub verdicts: Vec<FilterVerdict>,
    pub counts: FilterCounts,
}

impl FilterReport {
    pub fn new(verdicts: Vec<FilterVerdict>) -> Self {
        let mut counts = FilterCounts::default();
        for verdict in &verdicts {
            match verdict.outcome {
                FilterOutcome::Kept => counts.kept += 1,
                FilterOutcome::FlaggedFastReading => counts.flagged_fast_reading += 1,
                FilterOutcome::DroppedSilence => counts.dropped_silence += 1,
                FilterOutcome::DroppedLowConfidence => counts.dropped_low_confidence += 1,
                FilterOutcome::DroppedHallucination => counts.dropped_hallucination += 1,
            }
        }
        Self { verdicts, counts }
    }

    /// Indices of retained segments, in order.
    pub fn retained_indices(&self) -> Vec<usize> {
        self.verdicts
            .iter()
            .filter(|v| v.is_retained())
            .map(|v| v.segment_index)
            .collect()
    }

    pub fn all_dropped(&self) -> bool {
        self.counts.retained() == 0
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        let c = &self.counts;
        format!(
            "{} kept ({} flagged fast), {} dropped: {} silence, {} low confidence, {} hallucination",
            c.retained(),
            c.flagged_fast_reading,
            c.dropped(),
            c.dropped_silence,
            c.dropped_low_confidence,
            c.dropped_hallucination
        )
    }
}
