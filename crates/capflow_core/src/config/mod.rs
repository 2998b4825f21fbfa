//! Configuration management for the captioning pipeline.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation of thresholds and limits
//!
//! Components never read this module's state directly: each one receives
//! its own section (or a value derived from it) at construction.
//!
//! # Example
//!
//! ```no_run
//! use capflow_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/capflow.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Batch size: {}", config.settings().translation.batch_size);
//!
//! config.settings_mut().translation.batch_size = 10;
//! config.update_section(ConfigSection::Translation).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, EngineSettings, FilterSettings, LoggingSettings, PathSettings,
    PipelineSettings, Settings, TranslationSettings, DEFAULT_HALLUCINATION_PHRASES,
};
