//! Media duration probing using ffprobe.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Errors from the duration probe. Always fatal to the run.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("Invalid duration '{0}'")]
    InvalidDuration(String),
}

impl ProbeError {
    pub fn probe_failed(message: impl Into<String>) -> Self {
        Self::ProbeFailed(message.into())
    }
}

/// Media duration collaborator.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Duration of the media in seconds.
    async fn duration(&self, source: &Path) -> Result<f64, ProbeError>;
}

/// Probe backed by `ffprobe -show_entries format=duration`.
#[derive(Debug, Clone)]
pub struct FfprobeDurationProbe {
    program: String,
    timeout: Duration,
}

impl FfprobeDurationProbe {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self {
            program: "ffprobe".to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Use a different ffprobe binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check whether the ffprobe binary runs.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl Default for FfprobeDurationProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn duration(&self, source: &Path) -> Result<f64, ProbeError> {
        if !source.exists() {
            return Err(ProbeError::FileNotFound(source.to_path_buf()));
        }

        tracing::debug!("Probing duration: {}", source.display());

        let run = Command::new(&self.program)
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(source)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| ProbeError::Timeout {
                tool: self.program.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| ProbeError::probe_failed(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::CommandFailed {
                tool: self.program.clone(),
                exit_code: output.status.code().unwrap_or(-1),
                message: stderr.trim().to_string(),
            });
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse ffprobe's bare duration output.
pub fn parse_duration(stdout: &str) -> Result<f64, ProbeError> {
    let text = stdout.trim();
    let first = text.lines().next().unwrap_or("").trim();
    match first.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(ProbeError::InvalidDuration(first.to_string())),
    }
}
