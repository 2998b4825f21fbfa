//! Classification of translation service responses.
//!
//! Everything here is pure: it turns raw service output into a
//! [`TranslationOutcome`] and keeps content-policy blocks apart from
//! transient failures.

use serde::Deserialize;
use serde_json::Value;

use crate::models::TranslationOutcome;

/// Markers that mean the service will never accept the content.
const BLOCK_MARKERS: &[&str] = &["PROHIBITED_CONTENT", "SAFETY", "BLOCKLIST"];

/// Numeric finish reason used for prohibited content.
const PROHIBITED_FINISH_CODE: i64 = 8;

/// Body of a `generateContent` response (only the fields we read).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    /// String ("SAFETY") or numeric (8) depending on API version.
    #[serde(default)]
    pub finish_reason: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Why the response carries no text, as reported by the service.
    pub fn block_reason(&self) -> Option<String> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Some(reason);
        }
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_ref())
            .map(finish_reason_text)
    }
}

fn finish_reason_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.as_i64() == Some(PROHIBITED_FINISH_CODE) => {
            format!("PROHIBITED_CONTENT (finish_reason: {})", n)
        }
        other => format!("finish_reason: {}", other),
    }
}

/// Whether an error or block message signals a content-policy rejection.
pub fn is_block_signal(message: &str) -> bool {
    let upper = message.to_uppercase();
    if BLOCK_MARKERS.iter().any(|m| upper.contains(m)) {
        return true;
    }
    let code = PROHIBITED_FINISH_CODE.to_string();
    upper.trim() == code
        || upper.contains(&format!("FINISH_REASON: {}", code))
        || upper.contains(&format!("FINISHREASON: {}", code))
}

/// Map an error message to permanent or transient.
pub fn classify_error_text(message: &str) -> TranslationOutcome {
    if is_block_signal(message) {
        TranslationOutcome::permanent(message)
    } else {
        TranslationOutcome::transient(message)
    }
}

/// Map a non-success HTTP status and its body.
///
/// Only content-policy text makes a failure permanent; rate limits, server
/// errors and unexpected client errors are all retried.
pub fn classify_http_error(status: u16, body: &str) -> TranslationOutcome {
    if is_block_signal(body) {
        return TranslationOutcome::permanent(format!("HTTP {}: {}", status, truncate(body, 200)));
    }
    let kind = match status {
        429 => "rate limited",
        500..=599 => "server error",
        _ => "request failed",
    };
    TranslationOutcome::transient(format!("HTTP {} ({}): {}", status, kind, truncate(body, 200)))
}

/// Remove surrounding markdown code fences (```json ... ```).
pub fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// Parse a JSON array of translations and check its length.
pub fn parse_translation_array(text: &str, expected: usize) -> TranslationOutcome {
    let cleaned = strip_code_fences(text);
    let translations: Vec<String> = match serde_json::from_str(cleaned) {
        Ok(list) => list,
        Err(e) => {
            return TranslationOutcome::transient(format!("invalid JSON array: {}", e));
        }
    };

    if translations.len() != expected {
        return TranslationOutcome::transient(format!(
            "response size mismatch: got {}, expected {}",
            translations.len(),
            expected
        ));
    }

    TranslationOutcome::Success(translations)
}

/// Classify a decoded `generateContent` body.
pub fn classify_response(response: &GenerateContentResponse, expected: usize) -> TranslationOutcome {
    match response.text() {
        Some(text) => parse_translation_array(&text, expected),
        None => {
            let reason = response
                .block_reason()
                .unwrap_or_else(|| "empty response".to_string());
            if is_block_signal(&reason) {
                TranslationOutcome::permanent(format!("blocked: {}", reason))
            } else {
                TranslationOutcome::transient(format!("no content: {}", reason))
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
