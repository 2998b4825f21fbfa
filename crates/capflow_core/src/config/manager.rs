//! Config manager for loading, saving, and atomic updates.
//!
//! Key features:
//! - Atomic writes (write to temp file, then rename)
//! - Section-level updates (only modified section is changed)
//! - Validation on load
//! - Preserves comments and formatting with toml_edit

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    /// Create an invalid value error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Manages application configuration.
///
/// Handles loading, saving, and atomic section-level updates.
pub struct ConfigManager {
    /// Path to the config file.
    config_path: PathBuf,
    /// Current settings loaded in memory.
    settings: Settings,
}

impl ConfigManager {
    /// Create a new config manager with the given config file path.
    ///
    /// Does not load the config - call `load()` or `load_or_create()` after.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get a reference to the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a mutable reference to the current settings.
    ///
    /// Changes made here are only in memory until `save()` or
    /// `update_section()` is called.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Load config from file.
    ///
    /// Returns error if the file doesn't exist or fails validation.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Load config from file, creating with defaults if it doesn't exist.
    ///
    /// Missing keys are filled with defaults and written back.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let (settings, was_modified) = self.parse_and_check(&content)?;
            settings.validate()?;
            self.settings = settings;

            if was_modified {
                self.save()?;
            }
        } else {
            if let Some(parent) = self.config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            self.settings = Settings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Ensure all configured directories exist.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let paths = &self.settings.paths;
        for dir in [paths.output_dir(), paths.audio_temp_dir(), paths.logs_dir()] {
            fs::create_dir_all(dir)?;
        }

        Ok(())
    }

    /// Get the logs folder path.
    pub fn logs_folder(&self) -> PathBuf {
        self.settings.paths.logs_dir()
    }

    /// Parse content and report whether it differs from its normalized form.
    fn parse_and_check(&self, content: &str) -> ConfigResult<(Settings, bool)> {
        let doc: DocumentMut = content.parse()?;
        let settings: Settings = toml::from_str(content)?;

        let has_unknown = doc.iter().any(|(key, _)| {
            !ConfigSection::ALL
                .iter()
                .any(|section| section.table_name() == key)
        });

        let has_missing = ConfigSection::ALL.iter().any(|section| {
            doc.get(section.table_name())
                .and_then(|item| item.as_table())
                .map(|table| {
                    let expected = self.section_keys(&settings, *section);
                    expected.iter().any(|key| !table.contains_key(key))
                })
                .unwrap_or(true)
        });

        Ok((settings, has_unknown || has_missing))
    }

    /// Keys a fully-populated section would contain.
    fn section_keys(&self, settings: &Settings, section: ConfigSection) -> Vec<String> {
        Self::section_toml(settings, section)
            .ok()
            .and_then(|s| s.parse::<DocumentMut>().ok())
            .map(|doc| doc.iter().map(|(k, _)| k.to_string()).collect())
            .unwrap_or_default()
    }

    /// Serialize one section of the settings.
    fn section_toml(settings: &Settings, section: ConfigSection) -> ConfigResult<String> {
        let content = match section {
            ConfigSection::Paths => toml::to_string_pretty(&settings.paths)?,
            ConfigSection::Logging => toml::to_string_pretty(&settings.logging)?,
            ConfigSection::Engine => toml::to_string_pretty(&settings.engine)?,
            ConfigSection::Filter => toml::to_string_pretty(&settings.filter)?,
            ConfigSection::Translation => toml::to_string_pretty(&settings.translation)?,
            ConfigSection::Pipeline => toml::to_string_pretty(&settings.pipeline)?,
        };
        Ok(content)
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Update a specific section atomically.
    ///
    /// Re-reads the file from disk, replaces only the given section and
    /// writes back atomically. Other sections keep their on-disk content.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let current_content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = if current_content.is_empty() {
            DocumentMut::new()
        } else {
            current_content.parse()?
        };

        let section_doc: DocumentMut = Self::section_toml(&self.settings, section)?.parse()?;
        let section_table = section_doc.as_table().clone();

        doc[section.table_name()] = Item::Table(section_table);

        self.atomic_write(&doc.to_string())?;

        Ok(())
    }

    /// Generate config content with a comment above each section.
    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let mut output = String::new();

        output.push_str("# capflow configuration\n");
        output.push_str(
            "# This file is auto-generated. Comments may be preserved on section updates.\n",
        );

        for section in ConfigSection::ALL {
            output.push('\n');
            output.push_str(&format!("# {}\n", section.description()));
            output.push_str(&format!("[{}]\n", section.table_name()));
            for line in Self::section_toml(&self.settings, section)?.lines() {
                output.push_str(line);
                output.push('\n');
            }
        }

        Ok(output)
    }

    /// Write content to config file atomically.
    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.config_path.with_extension("toml.tmp");

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(".config").join("capflow.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[paths]"));
        assert!(content.contains("[filter]"));
        assert!(content.contains("# Segment confidence filter"));
    }

    #[test]
    fn generated_file_parses_back() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("capflow.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let mut reloaded = ConfigManager::new(&config_path);
        reloaded.load().unwrap();
        assert_eq!(
            reloaded.settings().filter.hallucination_phrases,
            manager.settings().filter.hallucination_phrases
        );
    }

    #[test]
    fn load_or_create_preserves_existing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("capflow.toml");

        fs::write(&config_path, "[translation]\nbatch_size = 8\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().translation.batch_size, 8);
        // Missing sections were written back
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[engine]"));
        assert!(content.contains("batch_size = 8"));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("capflow.toml");

        fs::write(
            &config_path,
            "[engine]\nshort_threshold_secs = 900.0\nlong_threshold_secs = 300.0\n",
        )
        .unwrap();

        let mut manager = ConfigManager::new(&config_path);
        let err = manager.load().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("absent.toml"));
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn update_section_only_changes_target() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("capflow.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        manager.settings_mut().translation.max_retries = 5;
        manager.settings_mut().filter.cps_limit = 17.0;

        manager.update_section(ConfigSection::Translation).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("max_retries = 5"));
        // Filter was not written, so disk keeps the default
        assert!(content.contains("cps_limit = 25.0"));
    }

    #[test]
    fn atomic_write_creates_no_temp_on_success() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("capflow.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let temp_path = config_path.with_extension("toml.tmp");
        assert!(!temp_path.exists());
    }
}
