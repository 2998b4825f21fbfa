//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::manager::{ConfigError, ConfigResult};
use crate::logging::LogLevel;

/// Phrases transcription engines commonly invent over silence or music.
pub const DEFAULT_HALLUCINATION_PHRASES: &[&str] = &[
    "thank you for watching",
    "thanks for watching",
    "subscribe to our channel",
    "please subscribe",
    "see you next time",
    "stay tuned",
    "legendas por",
    "subtitles by",
    "amara.org",
    "transcribed by",
    "captioned by",
];

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Engine selection thresholds.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Confidence filter limits.
    #[serde(default)]
    pub filter: FilterSettings,

    /// Translation batching and retry policy.
    #[serde(default)]
    pub translation: TranslationSettings,

    /// Run scheduling.
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl Settings {
    /// Check that all thresholds and limits are within their domains.
    pub fn validate(&self) -> ConfigResult<()> {
        self.engine.validate()?;
        self.filter.validate()?;
        self.translation.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }
}

/// Path configuration for output, temp, and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Output folder for caption files.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for temporary files (extracted audio).
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_output_folder() -> String {
    "captions_output".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl PathSettings {
    /// Directory caption files are written to.
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_folder)
    }

    /// Directory for per-run log files.
    pub fn logs_dir(&self) -> PathBuf {
        PathBuf::from(&self.logs_folder)
    }

    /// Directory for speech-filtered audio under the temp root.
    pub fn audio_temp_dir(&self) -> PathBuf {
        PathBuf::from(&self.temp_root).join("audio")
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level for application-wide logging.
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of lines kept in the tail buffer.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
        }
    }
}

/// Engine selection thresholds, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Below this duration the fast engine is always used.
    #[serde(default = "default_engine_threshold")]
    pub short_threshold_secs: f64,

    /// At or above this duration the accurate engine is used when available.
    #[serde(default = "default_engine_threshold")]
    pub long_threshold_secs: f64,
}

fn default_engine_threshold() -> f64 {
    1200.0
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            short_threshold_secs: default_engine_threshold(),
            long_threshold_secs: default_engine_threshold(),
        }
    }
}

impl EngineSettings {
    fn validate(&self) -> ConfigResult<()> {
        if !(self.short_threshold_secs >= 0.0) {
            return Err(ConfigError::invalid(
                "engine.short_threshold_secs",
                "must be a non-negative number",
            ));
        }
        if !(self.short_threshold_secs <= self.long_threshold_secs) {
            return Err(ConfigError::invalid(
                "engine.long_threshold_secs",
                "must be >= short_threshold_secs",
            ));
        }
        Ok(())
    }
}

/// Confidence filter limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Segments with a higher no-speech probability are dropped as silence.
    #[serde(default = "default_no_speech_limit")]
    pub no_speech_limit: f64,

    /// Segments with a lower average log probability are dropped.
    #[serde(default = "default_log_prob_limit")]
    pub log_prob_limit: f64,

    /// Reading speed above which kept segments are flagged for review.
    #[serde(default = "default_cps_limit")]
    pub cps_limit: f64,

    /// Known hallucination phrases (matched after normalization).
    #[serde(default = "default_hallucination_phrases")]
    pub hallucination_phrases: Vec<String>,

    /// Detect single-segment word loops ("oh oh oh oh oh").
    #[serde(default = "default_true")]
    pub detect_repetition: bool,

    /// Identical consecutive segments allowed before the rest are dropped.
    #[serde(default = "default_max_consecutive_repeats")]
    pub max_consecutive_repeats: usize,
}

fn default_no_speech_limit() -> f64 {
    0.6
}

fn default_log_prob_limit() -> f64 {
    -1.0
}

fn default_cps_limit() -> f64 {
    25.0
}

fn default_hallucination_phrases() -> Vec<String> {
    DEFAULT_HALLUCINATION_PHRASES
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_max_consecutive_repeats() -> usize {
    2
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            no_speech_limit: default_no_speech_limit(),
            log_prob_limit: default_log_prob_limit(),
            cps_limit: default_cps_limit(),
            hallucination_phrases: default_hallucination_phrases(),
            detect_repetition: true,
            max_consecutive_repeats: default_max_consecutive_repeats(),
        }
    }
}

impl FilterSettings {
    fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.no_speech_limit) {
            return Err(ConfigError::invalid(
                "filter.no_speech_limit",
                "must be within [0, 1]",
            ));
        }
        if !(self.log_prob_limit <= 0.0) {
            return Err(ConfigError::invalid(
                "filter.log_prob_limit",
                "must be <= 0",
            ));
        }
        if !(self.cps_limit > 0.0) {
            return Err(ConfigError::invalid("filter.cps_limit", "must be > 0"));
        }
        Ok(())
    }
}

/// Translation batching and retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationSettings {
    /// Source language of the transcripts.
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Default target language for requests that do not name one.
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Maximum segments per translation request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retries allowed after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff step in seconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,

    /// Batches of one run in flight at the same time.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight_batches: usize,

    /// Timeout for a single translation attempt, in seconds.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "pt-BR".to_string()
}

fn default_batch_size() -> usize {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    5
}

fn default_max_in_flight() -> usize {
    2
}

fn default_attempt_timeout() -> u64 {
    600
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            source_language: default_source_language(),
            target_language: default_target_language(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay(),
            max_in_flight_batches: default_max_in_flight(),
            attempt_timeout_secs: default_attempt_timeout(),
        }
    }
}

impl TranslationSettings {
    /// Linear backoff step.
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    /// Per-attempt timeout.
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("translation.batch_size", "must be > 0"));
        }
        if self.max_in_flight_batches == 0 {
            return Err(ConfigError::invalid(
                "translation.max_in_flight_batches",
                "must be > 0",
            ));
        }
        if self.attempt_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "translation.attempt_timeout_secs",
                "must be > 0",
            ));
        }
        Ok(())
    }
}

/// Run scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Media units processed concurrently.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Timeout for a whole transcription call, in seconds.
    #[serde(default = "default_transcription_timeout")]
    pub transcription_timeout_secs: u64,

    /// Translation requests in flight across all runs.
    #[serde(default = "default_translator_quota")]
    pub translator_quota: usize,

    /// Timeout for an engine availability check, in seconds.
    #[serde(default = "default_availability_timeout")]
    pub availability_timeout_secs: u64,
}

fn default_max_workers() -> usize {
    1
}

fn default_transcription_timeout() -> u64 {
    7200
}

fn default_translator_quota() -> usize {
    4
}

fn default_availability_timeout() -> u64 {
    10
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            transcription_timeout_secs: default_transcription_timeout(),
            translator_quota: default_translator_quota(),
            availability_timeout_secs: default_availability_timeout(),
        }
    }
}

impl PipelineSettings {
    /// Transcription timeout.
    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription_timeout_secs)
    }

    /// Engine availability check timeout.
    pub fn availability_timeout(&self) -> Duration {
        Duration::from_secs(self.availability_timeout_secs)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_workers == 0 {
            return Err(ConfigError::invalid("pipeline.max_workers", "must be > 0"));
        }
        if self.translator_quota == 0 {
            return Err(ConfigError::invalid(
                "pipeline.translator_quota",
                "must be > 0",
            ));
        }
        if self.availability_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "pipeline.availability_timeout_secs",
                "must be > 0",
            ));
        }
        Ok(())
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Engine,
    Filter,
    Translation,
    Pipeline,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 6] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Engine,
        ConfigSection::Filter,
        ConfigSection::Translation,
        ConfigSection::Pipeline,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Engine => "engine",
            ConfigSection::Filter => "filter",
            ConfigSection::Translation => "translation",
            ConfigSection::Pipeline => "pipeline",
        }
    }

    /// Comment written above the section in generated files.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output and working directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Engine => "Recognition engine selection (seconds)",
            ConfigSection::Filter => "Segment confidence filter",
            ConfigSection::Translation => "Batched translation and retry policy",
            ConfigSection::Pipeline => "Run scheduling and timeouts",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[translation]"));
        assert!(toml.contains("batch_size = 20"));
    }

    #[test]
    fn defaults_match_production_tuning() {
        let settings = Settings::default();
        assert_eq!(settings.filter.no_speech_limit, 0.6);
        assert_eq!(settings.filter.log_prob_limit, -1.0);
        assert_eq!(settings.filter.cps_limit, 25.0);
        assert_eq!(settings.filter.hallucination_phrases.len(), 11);
        assert_eq!(settings.translation.max_retries, 3);
        assert_eq!(settings.translation.base_delay(), Duration::from_secs(5));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[translation]\nbatch_size = 7";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.translation.batch_size, 7);
        assert_eq!(parsed.translation.max_retries, 3);
        assert_eq!(parsed.engine.long_threshold_secs, 1200.0);
    }

    #[test]
    fn path_helpers_follow_configured_folders() {
        let mut settings = Settings::default();
        settings.paths.temp_root = "/scratch/capflow".to_string();
        settings.paths.output_folder = "/srv/captions".to_string();
        assert_eq!(
            settings.paths.audio_temp_dir(),
            PathBuf::from("/scratch/capflow/audio")
        );
        assert_eq!(settings.paths.output_dir(), PathBuf::from("/srv/captions"));
        assert_eq!(settings.paths.logs_dir(), PathBuf::from(".logs"));
        assert_eq!(
            settings.pipeline.availability_timeout(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut settings = Settings::default();
        settings.engine.short_threshold_secs = 1800.0;
        settings.engine.long_threshold_secs = 600.0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("long_threshold_secs"));
    }

    #[test]
    fn rejects_out_of_range_limits() {
        let mut settings = Settings::default();
        settings.filter.no_speech_limit = 1.5;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.filter.log_prob_limit = 0.5;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.translation.batch_size = 0;
        assert!(settings.validate().is_err());
    }
}
