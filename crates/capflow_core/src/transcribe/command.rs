//! Transcriber that shells out to per-engine commands.
//!
//! Each engine is an external program that prints JSON segments on stdout:
//! `{"segments": [{"start", "end", "text", "no_speech_prob", "avg_logprob"}]}`
//! (a bare array is accepted too).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tempfile::TempPath;
use tokio::process::Command;

use super::{Transcriber, TranscriptionError};
use crate::config::PathSettings;
use crate::media::extract_filtered_audio;
use crate::models::{Engine, TranscriptSegment};

/// Replaced with the audio path in command arguments.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Program plus argument template for one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Arguments used for the availability probe.
    pub probe_args: Vec<String>,
}

impl EngineCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            probe_args: vec!["--help".to_string()],
        }
    }

    pub fn with_probe_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.probe_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments with the placeholder substituted.
    ///
    /// The input is appended when no argument mentions the placeholder.
    pub fn render_args(&self, input: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let mut rendered: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(INPUT_PLACEHOLDER, &input))
            .collect();
        if !self.args.iter().any(|a| a.contains(INPUT_PLACEHOLDER)) {
            rendered.push(input.into_owned());
        }
        rendered
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SegmentsPayload {
    Wrapped { segments: Vec<RawSegment> },
    Bare(Vec<RawSegment>),
}

/// Engine segment; confidence fields may be missing.
#[derive(Deserialize)]
struct RawSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default, alias = "no_speech_probability")]
    no_speech_prob: f64,
    #[serde(default, alias = "average_log_probability")]
    avg_logprob: f64,
}

/// Parse engine stdout into segments.
pub fn parse_segments_json(stdout: &str) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
    let segments = match serde_json::from_str::<SegmentsPayload>(stdout.trim()) {
        Ok(SegmentsPayload::Wrapped { segments }) | Ok(SegmentsPayload::Bare(segments)) => segments,
        Err(e) => return Err(TranscriptionError::invalid_output(e.to_string())),
    };

    Ok(segments
        .into_iter()
        .map(|r| {
            TranscriptSegment::new(r.start, r.end, r.text)
                .with_confidence(r.no_speech_prob, r.avg_logprob)
        })
        .collect())
}

/// [`Transcriber`] running one external command per engine.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    fast: Option<EngineCommand>,
    accurate: Option<EngineCommand>,
    /// When set, audio is filtered into this directory before dispatch.
    prefilter_dir: Option<PathBuf>,
    probe_timeout: Duration,
}

impl Default for CommandTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTranscriber {
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self {
            fast: None,
            accurate: None,
            prefilter_dir: None,
            probe_timeout: Self::DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_engine(mut self, engine: Engine, command: EngineCommand) -> Self {
        match engine {
            Engine::Fast => self.fast = Some(command),
            Engine::Accurate => self.accurate = Some(command),
        }
        self
    }

    /// Run the speech filter into `dir` before each transcription.
    pub fn with_prefilter(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prefilter_dir = Some(dir.into());
        self
    }

    /// Run the speech filter into the configured audio temp directory.
    pub fn with_configured_prefilter(self, paths: &PathSettings) -> Self {
        self.with_prefilter(paths.audio_temp_dir())
    }

    /// Limit how long an availability check may run.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn prefilter_dir(&self) -> Option<&Path> {
        self.prefilter_dir.as_deref()
    }

    pub fn command(&self, engine: Engine) -> Option<&EngineCommand> {
        match engine {
            Engine::Fast => self.fast.as_ref(),
            Engine::Accurate => self.accurate.as_ref(),
        }
    }

    /// Filtered audio for `source`, or `None` without a prefilter.
    ///
    /// The returned file is removed when dropped.
    async fn prepare_audio(&self, source: &Path) -> Result<Option<TempPath>, TranscriptionError> {
        let Some(dir) = &self.prefilter_dir else {
            return Ok(None);
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| TranscriptionError::Audio(format!("{}: {}", dir.display(), e)))?;
        let output = reserve_audio_file(dir, source)
            .map_err(|e| TranscriptionError::Audio(format!("{}: {}", dir.display(), e)))?;

        extract_filtered_audio(source, &output)
            .await
            .map_err(|e| TranscriptionError::Audio(e.to_string()))?;
        Ok(Some(output))
    }
}

/// Create a uniquely named `<stem>-XXXXXX.wav` in `dir`.
fn reserve_audio_file(dir: &Path, source: &Path) -> std::io::Result<TempPath> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    tempfile::Builder::new()
        .prefix(&format!("{}-", stem))
        .suffix(".wav")
        .tempfile_in(dir)
        .map(|file| file.into_temp_path())
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn is_available(&self, engine: Engine) -> bool {
        let Some(cmd) = self.command(engine) else {
            return false;
        };
        let probe = Command::new(&cmd.program)
            .args(&cmd.probe_args)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(output)) => output.status.success(),
            Ok(Err(_)) => false,
            Err(_) => {
                tracing::warn!(
                    "[Transcribe] {} availability check timed out after {}s",
                    cmd.program,
                    self.probe_timeout.as_secs()
                );
                false
            }
        }
    }

    async fn transcribe(
        &self,
        source: &Path,
        engine: Engine,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        let cmd = self
            .command(engine)
            .ok_or(TranscriptionError::Unavailable(engine))?;

        let filtered = self.prepare_audio(source).await?;
        let audio: &Path = filtered.as_deref().unwrap_or(source);
        let args = cmd.render_args(audio);
        tracing::debug!("[Transcribe] {} {}", cmd.program, args.join(" "));

        let output = Command::new(&cmd.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TranscriptionError::Spawn {
                engine,
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscriptionError::CommandFailed {
                engine,
                exit_code: output.status.code().unwrap_or(-1),
                message: stderr.lines().last().unwrap_or("").trim().to_string(),
            });
        }

        parse_segments_json(&String::from_utf8_lossy(&output.stdout))
    }
}
