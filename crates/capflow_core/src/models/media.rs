//! Media intake and probed media units.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::enums::TimeBudget;

/// A media file submitted for captioning, before its duration is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRequest {
    /// Caller-assigned identifier.
    pub id: String,
    /// Path to the source media file.
    pub source: PathBuf,
    /// Language the captions are translated into; empty uses the
    /// configured default.
    #[serde(default)]
    pub target_language: String,
    /// Spare-time hint for engine selection.
    #[serde(default)]
    pub time_budget: TimeBudget,
}

impl MediaRequest {
    /// Create a request with a tight time budget.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<PathBuf>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target_language: target_language.into(),
            time_budget: TimeBudget::Tight,
        }
    }

    /// Create a request translated into the configured default language.
    pub fn with_configured_target(id: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self::new(id, source, String::new())
    }

    /// Set the time budget (builder pattern).
    pub fn with_time_budget(mut self, budget: TimeBudget) -> Self {
        self.time_budget = budget;
        self
    }
}

/// A media unit with its measured duration.
///
/// Created once the duration probe succeeds; never modified afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct MediaUnit {
    id: String,
    source: PathBuf,
    duration_secs: f64,
    target_language: String,
    time_budget: TimeBudget,
}

impl MediaUnit {
    /// Build a unit from an intake request and the probed duration.
    ///
    /// `default_target` applies when the request names no target language.
    pub fn from_request(request: &MediaRequest, duration_secs: f64, default_target: &str) -> Self {
        let target = request.target_language.trim();
        Self {
            id: request.id.clone(),
            source: request.source.clone(),
            duration_secs,
            target_language: if target.is_empty() {
                default_target.to_string()
            } else {
                target.to_string()
            },
            time_budget: request.time_budget,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Measured duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn time_budget(&self) -> TimeBudget {
        self.time_budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_copies_request_fields() {
        let request = MediaRequest::new("ep01", "/videos/ep01.mp4", "pt-BR")
            .with_time_budget(TimeBudget::Spare);
        let unit = MediaUnit::from_request(&request, 1534.2, "es");

        assert_eq!(unit.id(), "ep01");
        assert_eq!(unit.source(), Path::new("/videos/ep01.mp4"));
        assert_eq!(unit.duration_secs(), 1534.2);
        assert_eq!(unit.target_language(), "pt-BR");
        assert_eq!(unit.time_budget(), TimeBudget::Spare);
    }

    #[test]
    fn request_defaults_to_tight_budget() {
        let request: MediaRequest = serde_json::from_str(
            r#"{"id":"a","source":"/a.mp4","target_language":"pt-BR"}"#,
        )
        .unwrap();
        assert_eq!(request.time_budget, TimeBudget::Tight);
    }

    #[test]
    fn missing_target_uses_configured_default() {
        let request: MediaRequest =
            serde_json::from_str(r#"{"id":"a","source":"/a.mp4"}"#).unwrap();
        assert_eq!(MediaUnit::from_request(&request, 10.0, "pt-BR").target_language(), "pt-BR");

        let request = MediaRequest::with_configured_target("b", "/b.mp4");
        assert_eq!(MediaUnit::from_request(&request, 10.0, "es").target_language(), "es");
    }
}
