//! Gemini `generateContent` translator.

use async_trait::async_trait;
use serde_json::json;

use super::batch::Translator;
use super::response::{classify_error_text, classify_http_error, classify_response, GenerateContentResponse};
use crate::config::TranslationSettings;
use crate::models::TranslationOutcome;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// HTTP client for the Gemini API.
///
/// The API key is supplied by the caller; this type never reads the
/// environment.
pub struct GeminiTranslator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    source_language: String,
}

impl GeminiTranslator {
    pub fn new(api_key: impl Into<String>, source_language: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            source_language: source_language.into(),
        }
    }

    /// Translator for the configured source language.
    pub fn from_settings(api_key: impl Into<String>, settings: &TranslationSettings) -> Self {
        Self::new(api_key, settings.source_language.clone())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Prompt asking for a bare JSON array in input order.
    pub fn build_prompt(&self, texts: &[String], target_language: &str) -> String {
        let target = display_language(target_language);
        let mut prompt = format!(
            "Translate the list of texts below from {} to {}.\n\
             IMPORTANT:\n\
             1. Return ONLY a JSON array of strings.\n\
             2. Keep the exact order and the same number of items.\n",
            self.source_language, target
        );
        if is_portuguese(target_language) {
            prompt.push_str("3. Use Brazilian Portuguese (PT-BR).\n");
        }
        prompt.push_str("Do not include markdown or explanations.\n\nTexts:\n");
        prompt.push_str(&serde_json::Value::from(texts.to_vec()).to_string());
        prompt
    }
}

fn is_portuguese(language: &str) -> bool {
    let lower = language.to_lowercase();
    lower.starts_with("pt") || lower.starts_with("portugu")
}

fn display_language(language: &str) -> String {
    if is_portuguese(language) {
        "Brazilian Portuguese".to_string()
    } else {
        language.to_string()
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn translate(&self, texts: &[String], target_language: &str) -> TranslationOutcome {
        if texts.is_empty() {
            return TranslationOutcome::Success(Vec::new());
        }

        let body = json!({
            "contents": [{ "parts": [{ "text": self.build_prompt(texts, target_language) }] }],
        });

        tracing::debug!(model = %self.model, texts = texts.len(), "Sending batch to Gemini");

        let response = match self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify_error_text(&format!("request: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return classify_http_error(status.as_u16(), &body);
        }

        match response.json::<GenerateContentResponse>().await {
            Ok(decoded) => classify_response(&decoded, texts.len()),
            Err(e) => TranslationOutcome::transient(format!("body: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_texts_as_json() {
        let t = GeminiTranslator::new("key", "English");
        let prompt = t.build_prompt(&["Hi \"there\"".to_string(), "Bye".to_string()], "pt-BR");
        assert!(prompt.contains("Brazilian Portuguese"));
        assert!(prompt.contains(r#"["Hi \"there\"","Bye"]"#));
    }

    #[test]
    fn prompt_for_other_languages() {
        let t = GeminiTranslator::new("key", "English");
        let prompt = t.build_prompt(&["Hi".to_string()], "es");
        assert!(prompt.contains("to es."));
        assert!(!prompt.contains("PT-BR"));
    }

    #[test]
    fn settings_supply_source_language() {
        let settings = TranslationSettings {
            source_language: "Japanese".to_string(),
            ..TranslationSettings::default()
        };
        let t = GeminiTranslator::from_settings("key", &settings);
        let prompt = t.build_prompt(&["konnichiwa".to_string()], "es");
        assert!(prompt.contains("from Japanese to es."));
    }

    #[test]
    fn endpoint_uses_model() {
        let t = GeminiTranslator::new("key", "en")
            .with_base_url("http://localhost:9999/")
            .with_model("gemini-test");
        assert_eq!(t.endpoint(), "http://localhost:9999/models/gemini-test:generateContent");
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        assert!(!GeminiTranslator::new("  ", "en").is_available().await);
        assert!(GeminiTranslator::new("abc", "en").is_available().await);
    }

    #[tokio::test]
    async fn unreachable_host_is_transient() {
        let t = GeminiTranslator::new("key", "en").with_base_url("http://127.0.0.1:9");
        let outcome = t.translate(&["Hi".to_string()], "pt-BR").await;
        assert!(matches!(outcome, TranslationOutcome::TransientFailure(_)));
    }
}
