//! Speech-focused audio extraction using ffmpeg.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;

/// Denoise, normalize and band-limit to the speech range.
pub const SPEECH_FILTER_CHAIN: &str =
    "afftdn=nr=20:nf=-30,dynaudnorm=f=75:g=31:p=0.95:m=10,highpass=f=200,lowpass=f=3000";

/// Sample rate expected by the recognizers.
pub const SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Failed to run ffmpeg: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("ffmpeg failed with exit code {exit_code}: {message}")]
    CommandFailed { exit_code: i32, message: String },
}

/// Arguments for extracting filtered 16 kHz mono WAV.
pub fn extraction_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vn".to_string(),
        "-af".to_string(),
        SPEECH_FILTER_CHAIN.to_string(),
        "-ar".to_string(),
        SAMPLE_RATE.to_string(),
        "-ac".to_string(),
        "1".to_string(),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Extract the audio track of `input` into `output` with the speech filter.
pub async fn extract_filtered_audio(input: &Path, output: &Path) -> Result<(), AudioError> {
    if !input.exists() {
        return Err(AudioError::InputNotFound(input.to_path_buf()));
    }

    tracing::debug!(
        "Extracting speech audio: {} -> {}",
        input.display(),
        output.display()
    );

    let result = Command::new("ffmpeg")
        .args(extraction_args(input, output))
        .kill_on_drop(true)
        .output()
        .await?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let message = stderr.lines().last().unwrap_or("").trim().to_string();
        return Err(AudioError::CommandFailed {
            exit_code: result.status.code().unwrap_or(-1),
            message,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_request_mono_16k_with_filter() {
        let args = extraction_args(Path::new("in.mkv"), Path::new("out.wav"));
        let joined = args.join(" ");
        assert!(joined.contains("-ar 16000 -ac 1"));
        assert!(joined.contains(SPEECH_FILTER_CHAIN));
        assert_eq!(args.last().map(String::as_str), Some("out.wav"));
        assert_eq!(args[4], "in.mkv");
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let err = extract_filtered_audio(Path::new("/nope/in.mkv"), Path::new("/tmp/out.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, AudioError::InputNotFound(_)));
    }
}
