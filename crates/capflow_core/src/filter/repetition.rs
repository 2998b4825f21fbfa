//! Consecutive repetition pass.
//!
//! Engines stuck in a loop emit the same caption over and over across
//! neighbouring segments. Runs longer than the allowed repeat count keep
//! only their first segment.

use super::hallucination::normalize_text;
use crate::models::{FilterOutcome, FilterVerdict, TranscriptSegment};

/// Whether two normalized captions count as the same line.
fn same_caption(first: &str, other: &str) -> bool {
    if first == other {
        return true;
    }
    first.chars().count() > 3
        && !other.is_empty()
        && (first.contains(other) || other.contains(first))
}

/// Re-label repeated retained segments as hallucinations.
///
/// Only retained verdicts take part. A run of more than `max_repeats`
/// matching captions keeps its first segment; `max_repeats == 0` disables
/// the pass. Returns the number of segments dropped.
pub fn collapse_consecutive_repeats(
    segments: &[TranscriptSegment],
    verdicts: &mut [FilterVerdict],
    max_repeats: usize,
) -> usize {
    if max_repeats == 0 {
        return 0;
    }

    let retained: Vec<usize> = verdicts
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_retained())
        .map(|(pos, _)| pos)
        .collect();

    let normalized: Vec<String> = retained
        .iter()
        .map(|&pos| normalize_text(&segments[verdicts[pos].segment_index].text))
        .collect();

    let mut dropped = 0;
    let mut i = 0;
    while i < retained.len() {
        let mut j = i + 1;
        while j < retained.len() && same_caption(&normalized[i], &normalized[j]) {
            j += 1;
        }

        let run = j - i;
        if run > max_repeats {
            for &pos in &retained[i + 1..j] {
                let verdict = &mut verdicts[pos];
                verdict.outcome = FilterOutcome::DroppedHallucination;
                verdict.reason = format!("repeated caption ({} in a row)", run);
                dropped += 1;
            }
        }

        i = j;
    }

    dropped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kept(segments: &[TranscriptSegment]) -> Vec<FilterVerdict> {
        (0..segments.len())
            .map(|i| FilterVerdict::new(i, FilterOutcome::Kept, "ok"))
            .collect()
    }

    fn seg(i: usize, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(i as f64, i as f64 + 1.0, text)
    }

    #[test]
    fn long_runs_keep_first_segment() {
        let segments = vec![
            seg(0, "Hello there."),
            seg(1, "I'm sorry."),
            seg(2, "I'm sorry"),
            seg(3, "i'm SORRY!"),
            seg(4, "Goodbye."),
        ];
        let mut verdicts = kept(&segments);

        let dropped = collapse_consecutive_repeats(&segments, &mut verdicts, 2);

        assert_eq!(dropped, 2);
        assert_eq!(verdicts[1].outcome, FilterOutcome::Kept);
        assert_eq!(verdicts[2].outcome, FilterOutcome::DroppedHallucination);
        assert_eq!(verdicts[3].outcome, FilterOutcome::DroppedHallucination);
        assert_eq!(verdicts[4].outcome, FilterOutcome::Kept);
    }

    #[test]
    fn short_runs_are_left_alone() {
        let segments = vec![seg(0, "No."), seg(1, "No.")];
        let mut verdicts = kept(&segments);

        assert_eq!(collapse_consecutive_repeats(&segments, &mut verdicts, 2), 0);
        assert!(verdicts.iter().all(|v| v.outcome == FilterOutcome::Kept));
    }

    #[test]
    fn dropped_segments_do_not_break_or_join_runs() {
        let segments = vec![
            seg(0, "Come here"),
            seg(1, "noise"),
            seg(2, "Come here"),
            seg(3, "Come here now"),
        ];
        let mut verdicts = kept(&segments);
        verdicts[1].outcome = FilterOutcome::DroppedSilence;

        let dropped = collapse_consecutive_repeats(&segments, &mut verdicts, 2);

        assert_eq!(dropped, 2);
        assert_eq!(verdicts[0].outcome, FilterOutcome::Kept);
        assert_eq!(verdicts[1].outcome, FilterOutcome::DroppedSilence);
        assert_eq!(verdicts[3].outcome, FilterOutcome::DroppedHallucination);
    }

    #[test]
    fn zero_disables_the_pass() {
        let segments = vec![seg(0, "Yes"), seg(1, "Yes"), seg(2, "Yes")];
        let mut verdicts = kept(&segments);
        assert_eq!(collapse_consecutive_repeats(&segments, &mut verdicts, 0), 0);
    }
}
