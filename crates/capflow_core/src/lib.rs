//! capflow core - captioning pipeline controller
//!
//! Turns a media file into translated, time-aligned captions by driving
//! external speech-to-text and translation collaborators. The crate owns the
//! orchestration around them: engine choice, confidence filtering, batched
//! translation with retry/backoff, and the per-unit state machine.

pub mod config;
pub mod engine;
pub mod filter;
pub mod logging;
pub mod media;
pub mod models;
pub mod orchestrator;
pub mod subtitles;
pub mod transcribe;
pub mod translate;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
