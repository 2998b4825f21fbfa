//! Data models for the captioning pipeline.
//!
//! This module contains the core data structures shared by every stage:
//! - Enums for engines, time budgets, filter outcomes and rejection reasons
//! - Media units (intake requests and probed units)
//! - Transcript segments and filter verdicts
//! - Translation requests and outcomes

mod enums;
mod media;
mod segment;
mod translation;

pub use enums::{Engine, FilterOutcome, RejectReason, TimeBudget};
pub use media::{MediaRequest, MediaUnit};
pub use segment::{normalize_segments, FilterVerdict, TranscriptSegment};
pub use translation::{TranslationOutcome, TranslationRequest};
