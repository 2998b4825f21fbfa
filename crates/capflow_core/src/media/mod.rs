//! Media collaborators: duration probing and speech audio extraction.

mod audio;
mod probe;

pub use audio::{extract_filtered_audio, extraction_args, AudioError, SAMPLE_RATE, SPEECH_FILTER_CHAIN};
pub use probe::{parse_duration, DurationProbe, FfprobeDurationProbe, ProbeError};
