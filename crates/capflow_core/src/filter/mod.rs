//! Segment confidence filtering.
//!
//! Suppresses captions produced over silence or noise before they reach
//! translation:
//! - [`ConfidenceFilter`] gives exactly one verdict per segment
//! - [`hallucination`] holds the phrase and word-loop detectors
//! - [`repetition`] collapses runs of identical consecutive captions

mod confidence;
pub mod hallucination;
pub mod repetition;

pub use confidence::{ConfidenceFilter, FilterCounts, FilterReport};
