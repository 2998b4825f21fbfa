//! Queue processor for running many media requests.
//!
//! Runs are independent: each gets its own `RunLogger` and shares only the
//! orchestrator's read-only configuration and translation quota.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::run::Orchestrator;
use super::types::RunReport;
use crate::logging::{sanitize_filename, LogConfig, RunLogger, UiLogCallback};
use crate::models::MediaRequest;
use crate::subtitles::{write_srt_file, SrtOptions, SubtitleError};

/// Callback for log lines of every run.
///
/// Arguments: (unit_id, line)
pub type QueueLogCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Processor for running media requests through the orchestrator.
///
/// # Example
///
/// ```ignore
/// // Log and caption directories default to `settings.paths`.
/// let processor = QueueProcessor::new(Arc::new(orchestrator))
///     .with_output_dir("/srv/captions");
/// let reports = processor.process_all(requests, &CancellationToken::new()).await;
/// ```
pub struct QueueProcessor {
    orchestrator: Arc<Orchestrator>,
    max_workers: usize,
    log_config: LogConfig,
    /// Directory for per-run log files; no files when `None`.
    log_dir: Option<PathBuf>,
    /// Directory for caption files; nothing written when `None`.
    output_dir: Option<PathBuf>,
    srt_options: SrtOptions,
    log_callback: Option<QueueLogCallback>,
}

impl QueueProcessor {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let settings = orchestrator.settings();
        Self {
            max_workers: settings.pipeline.max_workers.max(1),
            log_config: LogConfig::from_settings(&settings.logging),
            log_dir: Some(settings.paths.logs_dir()),
            output_dir: Some(settings.paths.output_dir()),
            orchestrator,
            srt_options: SrtOptions::default(),
            log_callback: None,
        }
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Keep run logs in memory and the UI callback only.
    pub fn without_log_files(mut self) -> Self {
        self.log_dir = None;
        self
    }

    /// Report captions without writing SRT files.
    pub fn without_caption_files(mut self) -> Self {
        self.output_dir = None;
        self
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn with_srt_options(mut self, options: SrtOptions) -> Self {
        self.srt_options = options;
        self
    }

    pub fn with_log_callback(mut self, callback: QueueLogCallback) -> Self {
        self.log_callback = Some(callback);
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    fn ui_callback(&self, unit_id: &str) -> Option<UiLogCallback> {
        self.log_callback.as_ref().map(|cb| {
            let cb = Arc::clone(cb);
            let unit_id = unit_id.to_string();
            Box::new(move |line: &str| cb(&unit_id, line)) as UiLogCallback
        })
    }

    fn create_logger(&self, request: &MediaRequest) -> RunLogger {
        let Some(dir) = &self.log_dir else {
            return RunLogger::detached(&request.id, self.log_config.clone(), self.ui_callback(&request.id));
        };

        match RunLogger::new(
            &request.id,
            dir,
            self.log_config.clone(),
            self.ui_callback(&request.id),
        ) {
            Ok(logger) => logger,
            Err(e) => {
                tracing::warn!(
                    "Failed to create log file for '{}' in {}: {}",
                    request.id,
                    dir.display(),
                    e
                );
                RunLogger::detached(&request.id, self.log_config.clone(), self.ui_callback(&request.id))
            }
        }
    }

    /// Process a single request.
    pub async fn process_one(&self, request: &MediaRequest, cancel: &CancellationToken) -> RunReport {
        let logger = self.create_logger(request);
        let mut report = self.orchestrator.run(request, cancel, &logger).await;

        if report.outcome.has_output() {
            if let Some(dir) = &self.output_dir {
                match self.write_captions(&report, dir) {
                    Ok(path) => {
                        logger.info(&format!("Captions written: {}", path.display()));
                        report.output_path = Some(path);
                    }
                    Err(e) => logger.error(&format!("Failed to write captions: {}", e)),
                }
            }
        }

        logger.close();
        report
    }

    /// Process every request, at most `max_workers` at a time.
    ///
    /// Reports are returned in input order. Cancelling `cancel` stops every
    /// run; each still returns a report.
    pub async fn process_all(
        &self,
        requests: Vec<MediaRequest>,
        cancel: &CancellationToken,
    ) -> Vec<RunReport> {
        tracing::info!(
            "Processing {} media units with {} worker(s)",
            requests.len(),
            self.max_workers
        );

        let mut reports: Vec<(usize, RunReport)> = stream::iter(requests.into_iter().enumerate())
            .map(|(index, request)| async move {
                let report = self.process_one(&request, cancel).await;
                (index, report)
            })
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }

    fn write_captions(
        &self,
        report: &RunReport,
        dir: &Path,
    ) -> Result<PathBuf, SubtitleError> {
        let language = report.target_language.as_deref().unwrap_or("translated");
        let file_name = format!(
            "{}.{}.srt",
            sanitize_filename(&report.unit_id),
            language
        );
        let path = dir.join(file_name);

        std::fs::create_dir_all(dir).map_err(|source| SubtitleError::WriteError {
            path: dir.to_path_buf(),
            source,
        })?;
        write_srt_file(&report.captions, &self.srt_options, &path)?;
        Ok(path)
    }
}
