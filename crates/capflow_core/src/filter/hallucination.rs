//! Hallucination detectors.
//!
//! Two kinds of invented captions are recognized:
//! - known phrases engines emit over silence ("thanks for watching")
//! - word loops inside a single segment ("oh, oh, oh, oh, oh")

use std::collections::HashMap;

/// Share of the normalized text the matched phrases must cover.
const PHRASE_COVERAGE: f64 = 0.6;

/// Words that legitimately repeat in ordinary speech.
const COMMON_WORDS: &[&str] = &[
    "i", "you", "the", "a", "and", "to", "it", "is", "of", "in", "that", "me", "my", "your",
];

/// Lowercase, drop punctuation and collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;

    for c in lowered.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else if c.is_alphanumeric() || c == '_' {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }

    out
}

/// Matches text against a list of known hallucination phrases.
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    phrases: Vec<String>,
}

impl PhraseMatcher {
    /// Build a matcher; phrases are normalized the same way as input text.
    pub fn new<S: AsRef<str>>(phrases: &[S]) -> Self {
        let mut phrases: Vec<String> = phrases
            .iter()
            .map(|p| normalize_text(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        phrases.dedup();
        Self { phrases }
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Return the first matched phrase, if the text is (nearly) only phrases.
    ///
    /// Matches when the normalized text equals a phrase, or when the phrases
    /// it contains cover at least 60% of its characters.
    pub fn find_match(&self, text: &str) -> Option<&str> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return None;
        }

        if let Some(exact) = self.phrases.iter().find(|p| **p == normalized) {
            return Some(exact.as_str());
        }

        let contained: Vec<&String> = self
            .phrases
            .iter()
            .filter(|p| normalized.contains(p.as_str()))
            .collect();
        let first = contained.first()?;

        let covered: usize = contained.iter().map(|p| p.chars().count()).sum();
        let total = normalized.chars().count();
        let coverage = covered.min(total) as f64 / total as f64;

        if coverage >= PHRASE_COVERAGE {
            Some(first.as_str())
        } else {
            None
        }
    }
}

/// Detect a word loop inside a single segment.
///
/// True when the text has at least 5 words and its most frequent word makes
/// up at least half of them (70% for common function words), or when it has
/// at least 10 words drawn from 3 or fewer distinct ones.
pub fn is_word_loop(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();

    if words.len() < 5 {
        return false;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &word in &words {
        *counts.entry(word).or_insert(0) += 1;
    }

    // First-seen word wins ties so the result never depends on hash order.
    let mut top_word = words[0];
    let mut top_count = 0;
    for &word in &words {
        let count = counts[&word];
        if count > top_count {
            top_word = word;
            top_count = count;
        }
    }

    let threshold = if COMMON_WORDS.contains(&top_word) {
        0.7
    } else {
        0.5
    };

    if top_count as f64 / words.len() as f64 >= threshold {
        return true;
    }

    words.len() >= 10 && counts.len() <= 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_HALLUCINATION_PHRASES;

    fn matcher() -> PhraseMatcher {
        PhraseMatcher::new(DEFAULT_HALLUCINATION_PHRASES)
    }

    #[test]
    fn normalization_strips_punctuation_and_case() {
        assert_eq!(normalize_text("  Thanks   for WATCHING!!  "), "thanks for watching");
        assert_eq!(normalize_text("Amara.org"), "amaraorg");
        assert_eq!(normalize_text("Legendas por: João"), "legendas por joão");
        assert_eq!(normalize_text("..."), "");
    }

    #[test]
    fn exact_phrase_matches() {
        assert_eq!(matcher().find_match("Thanks for watching."), Some("thanks for watching"));
        assert!(matcher().find_match("Subtitles by Amara.org").is_some());
    }

    #[test]
    fn phrase_inside_real_dialogue_does_not_match() {
        let text = "I told her thanks for watching the kids while I was at the hospital";
        assert_eq!(matcher().find_match(text), None);
    }

    #[test]
    fn multiple_phrases_add_coverage() {
        let text = "Thanks for watching! See you next time, bye.";
        assert!(matcher().find_match(text).is_some());
    }

    #[test]
    fn empty_text_never_matches() {
        assert_eq!(matcher().find_match(""), None);
        assert_eq!(matcher().find_match("?!"), None);
    }

    #[test]
    fn detects_word_loops() {
        assert!(is_word_loop("oh, oh, oh, oh, oh, oh..."));
        assert!(is_word_loop("yeah yeah yeah yeah okay"));
        assert!(is_word_loop("go go stop go stop go stop stop go stop"));
    }

    #[test]
    fn ordinary_sentences_are_not_loops() {
        assert!(!is_word_loop("oh oh oh"));
        assert!(!is_word_loop("I think you know that I want you to come"));
        assert!(!is_word_loop("The quick brown fox jumps over the lazy dog"));
    }

    #[test]
    fn common_words_need_higher_share() {
        // "you" is 3/5 = 60%, below the 70% bar for common words
        assert!(!is_word_loop("you you you see it"));
        // "no" is 3/5 = 60%, above the 50% bar
        assert!(is_word_loop("no no no see it"));
    }
}
