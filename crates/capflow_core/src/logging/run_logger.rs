//! Per-run logger with file and callback output.
//!
//! Each pipeline run gets its own logger that:
//! - Writes to a dedicated log file (optional)
//! - Sends messages to a UI callback (if provided)
//! - Supports compact mode with progress filtering
//! - Maintains a tail buffer for error diagnosis

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, LogLevel, MessagePrefix, UiLogCallback};

/// Per-run logger with dual output (file + UI).
pub struct RunLogger {
    /// Run name for identification.
    run_name: String,
    /// Path to log file, if file output is enabled.
    log_path: Option<PathBuf>,
    /// File writer (buffered).
    file_writer: Arc<Mutex<Option<BufWriter<File>>>>,
    /// UI callback for sending messages.
    ui_callback: Arc<Mutex<Option<UiLogCallback>>>,
    /// Logging configuration.
    config: LogConfig,
    /// Tail buffer for recent lines.
    tail_buffer: Arc<Mutex<VecDeque<String>>>,
    /// Last progress value logged (for compact mode filtering).
    last_progress: Arc<Mutex<u32>>,
}

impl RunLogger {
    /// Create a new run logger writing to `<log_dir>/<run_name>.log`.
    pub fn new(
        run_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        ui_callback: Option<UiLogCallback>,
    ) -> std::io::Result<Self> {
        let run_name = run_name.into();
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&run_name)));
        let file = File::create(&log_path)?;

        Ok(Self::build(
            run_name,
            Some(log_path),
            Some(BufWriter::new(file)),
            config,
            ui_callback,
        ))
    }

    /// Create a logger without file output (callback and tail buffer only).
    pub fn detached(
        run_name: impl Into<String>,
        config: LogConfig,
        ui_callback: Option<UiLogCallback>,
    ) -> Self {
        Self::build(run_name.into(), None, None, config, ui_callback)
    }

    fn build(
        run_name: String,
        log_path: Option<PathBuf>,
        writer: Option<BufWriter<File>>,
        config: LogConfig,
        ui_callback: Option<UiLogCallback>,
    ) -> Self {
        let tail_capacity = config.error_tail.max(1);
        Self {
            run_name,
            log_path,
            file_writer: Arc::new(Mutex::new(writer)),
            ui_callback: Arc::new(Mutex::new(ui_callback)),
            config,
            tail_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(tail_capacity))),
            last_progress: Arc::new(Mutex::new(0)),
        }
    }

    /// Get the run name.
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Get the log file path.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }

        self.remember(message);
        let formatted = self.format_message(message);
        self.output(&formatted);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        let msg = MessagePrefix::Warning.format(message);
        self.log(LogLevel::Warn, &msg);
    }

    pub fn error(&self, message: &str) {
        let msg = MessagePrefix::Error.format(message);
        self.log(LogLevel::Error, &msg);
    }

    /// Log an external command being executed.
    pub fn command(&self, command: &str) {
        let msg = MessagePrefix::Command.format(command);
        self.log(LogLevel::Info, &msg);
    }

    /// Log a stage marker.
    pub fn phase(&self, phase_name: &str) {
        let msg = MessagePrefix::Phase.format(phase_name);
        self.log(LogLevel::Info, &msg);
    }

    pub fn section(&self, section_name: &str) {
        let msg = MessagePrefix::Section.format(section_name);
        self.log(LogLevel::Info, &msg);
    }

    pub fn success(&self, message: &str) {
        let msg = MessagePrefix::Success.format(message);
        self.log(LogLevel::Info, &msg);
    }

    /// Log progress update (filtered in compact mode).
    ///
    /// Returns true if the progress was logged, false if filtered.
    pub fn progress(&self, percent: u32) -> bool {
        if self.config.compact {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);

            let current_step = (percent / step) * step;
            let last_step = (*last / step) * step;

            if current_step <= last_step && percent < 100 {
                return false;
            }
            *last = percent;
        }

        let msg = format!("Progress: {}%", percent);
        self.log(LogLevel::Info, &msg);
        true
    }

    /// Log a line of collaborator output (stdout/stderr of external tools).
    ///
    /// In compact mode, these only go to the tail buffer.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        self.remember(line);

        if self.config.compact {
            return;
        }

        let prefix = if is_stderr { "[stderr] " } else { "" };
        let msg = format!("{}{}", prefix, line);
        self.output(&self.format_message(&msg));
    }

    /// Show the tail buffer (typically after an error).
    pub fn show_tail(&self, header: &str) {
        let lines = self.get_tail();
        if lines.is_empty() {
            return;
        }

        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in &lines {
            self.output(&self.format_message(line));
        }
    }

    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    /// Get the current tail buffer contents.
    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release the file.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn remember(&self, line: &str) {
        let mut buffer = self.tail_buffer.lock();
        if buffer.len() >= self.config.error_tail.max(1) {
            buffer.pop_front();
        }
        buffer.push_back(line.to_string());
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }

        if let Some(ref callback) = *self.ui_callback.lock() {
            callback(formatted);
        }
    }
}

impl Drop for RunLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Builder for creating a RunLogger with fluent API.
pub struct RunLoggerBuilder {
    run_name: String,
    log_dir: Option<PathBuf>,
    config: LogConfig,
    ui_callback: Option<UiLogCallback>,
}

impl RunLoggerBuilder {
    pub fn new(run_name: impl Into<String>) -> Self {
        Self {
            run_name: run_name.into(),
            log_dir: None,
            config: LogConfig::default(),
            ui_callback: None,
        }
    }

    /// Write the log file into this directory.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn compact(mut self, compact: bool) -> Self {
        self.config.compact = compact;
        self
    }

    pub fn ui_callback(mut self, callback: UiLogCallback) -> Self {
        self.ui_callback = Some(callback);
        self
    }

    /// Build the RunLogger.
    pub fn build(self) -> std::io::Result<RunLogger> {
        match self.log_dir {
            Some(dir) => RunLogger::new(self.run_name, dir, self.config, self.ui_callback),
            None => Ok(RunLogger::detached(
                self.run_name,
                self.config,
                self.ui_callback,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn creates_log_file() {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new("ep_01", dir.path(), LogConfig::default(), None).unwrap();

        let path = logger.log_path().unwrap();
        assert!(path.exists());
        assert!(path.to_string_lossy().contains("ep_01.log"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new("ep_01", dir.path(), LogConfig::default(), None).unwrap();

        logger.phase("Filtering");
        logger.flush();

        let content = fs::read_to_string(logger.log_path().unwrap()).unwrap();
        assert!(content.contains("=== Filtering ==="));
    }

    #[test]
    fn detached_logger_calls_callback() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let count_clone = call_count.clone();

        let callback: UiLogCallback = Box::new(move |_msg| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let logger = RunLogger::detached("ep_02", LogConfig::default(), Some(callback));
        logger.info("Message 1");
        logger.debug("filtered by level");
        logger.warn("Message 2");

        assert!(logger.log_path().is_none());
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn compact_mode_filters_progress() {
        let mut config = LogConfig::default();
        config.compact = true;
        config.progress_step = 20;

        let logger = RunLogger::detached("ep_03", config, None);

        assert!(!logger.progress(5));
        assert!(!logger.progress(15));
        assert!(logger.progress(20));
        assert!(!logger.progress(25));
        assert!(logger.progress(40));
        assert!(logger.progress(100));
    }

    #[test]
    fn tail_buffer_maintains_limit() {
        let mut config = LogConfig::default();
        config.error_tail = 5;

        let logger = RunLogger::detached("ep_04", config, None);

        for i in 0..10 {
            logger.output_line(&format!("Line {}", i), false);
        }

        let tail = logger.get_tail();
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0], "Line 5");
        assert_eq!(tail[4], "Line 9");
    }

    #[test]
    fn builder_without_dir_is_detached() {
        let logger = RunLoggerBuilder::new("ep_05").compact(false).build().unwrap();
        assert!(logger.log_path().is_none());
        assert_eq!(logger.run_name(), "ep_05");
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("normal_name"), "normal_name");
        assert_eq!(sanitize_filename("has/slash"), "has_slash");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
    }
}
