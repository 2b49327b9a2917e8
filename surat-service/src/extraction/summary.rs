//! Heuristic summary used when the backend cannot summarize.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{collapse_whitespace, truncate_chars};
use crate::usage::TokenUsage;

/// Longest summary produced, in characters
pub const SUMMARY_MAX_CHARS: usize = 200;

pub const LABELLED_CONFIDENCE: f64 = 0.60;
pub const SENTENCE_CONFIDENCE: f64 = 0.50;
pub const LEADING_TEXT_CONFIDENCE: f64 = 0.40;

/// Sentences shorter than this are headers or fragments
const MIN_SENTENCE_CHARS: usize = 20;

static SUBJECT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)\b(?:perihal|hal|re|subject)[ \t]*:[ \t]*([^\n]+)").unwrap()
});

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// A summary together with how it was produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryOutcome {
    pub summary: String,
    pub confidence: f64,
    pub used_fallback: bool,
    #[serde(skip)]
    pub tokens: TokenUsage,
}

/// Summarize without the backend: subject line, then first real sentence,
/// then leading text.
pub fn summarize(text: &str) -> SummaryOutcome {
    fallback(text.trim())
}

fn fallback(text: &str) -> SummaryOutcome {
    let outcome = |summary: String, confidence: f64| SummaryOutcome {
        summary,
        confidence,
        used_fallback: true,
        tokens: TokenUsage::default(),
    };

    if text.is_empty() {
        return outcome(String::new(), 0.0);
    }

    if let Some(subject) = labelled_subject(text) {
        return outcome(subject, LABELLED_CONFIDENCE);
    }

    let collapsed = collapse_whitespace(text);

    if let Some(sentence) = first_sentence(&collapsed) {
        return outcome(truncate_chars(sentence, SUMMARY_MAX_CHARS), SENTENCE_CONFIDENCE);
    }

    outcome(
        truncate_chars(&collapsed, SUMMARY_MAX_CHARS),
        LEADING_TEXT_CONFIDENCE,
    )
}

fn labelled_subject(text: &str) -> Option<String> {
    SUBJECT_LABEL
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| collapse_whitespace(m.as_str()))
        .find(|subject| !subject.is_empty())
        .map(|subject| truncate_chars(&subject, SUMMARY_MAX_CHARS))
}

fn first_sentence(text: &str) -> Option<&str> {
    SENTENCE_END
        .split(text)
        .map(str::trim)
        .find(|sentence| sentence.chars().count() > MIN_SENTENCE_CHARS && !is_heading(sentence))
}

/// All-caps lines are letterheads, not content
fn is_heading(sentence: &str) -> bool {
    !sentence.chars().any(char::is_lowercase)
}
