//! Text and field extraction.
//!
//! Backend-driven extractors (unified single call, legacy three-call path)
//! plus the local fallbacks they degrade to.

pub mod confidence;
pub mod dates;
pub mod legacy;
pub mod patterns;
pub mod prompts;
pub mod response;
pub mod schema;
pub mod summary;
pub mod unified;

use serde::{Deserialize, Serialize};

pub use schema::{Category, CategorySchema};

/// Confidence assigned to values read from a well-formed backend reply
pub const BACKEND_CONFIDENCE: f64 = 0.85;

/// Confidence assigned to values scraped out of a malformed backend reply
pub const MALFORMED_REPLY_CONFIDENCE: f64 = 0.60;

/// One extracted field. A missing value always carries zero confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult {
    pub value: Option<String>,
    pub confidence: f64,
}

impl FieldResult {
    /// A found value; blank values collapse to [`FieldResult::missing`]
    pub fn found(value: impl Into<String>, confidence: f64) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Self::missing();
        }

        Self {
            value: Some(trimmed.to_string()),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn missing() -> Self {
        Self {
            value: None,
            confidence: 0.0,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

/// A value read from a backend reply; date fields are normalized when possible
pub(crate) fn backend_field(field: &str, value: String, confidence: f64) -> FieldResult {
    if schema::is_date_field(field) {
        FieldResult::found(dates::normalize_or_keep(&value), confidence)
    } else {
        FieldResult::found(value, confidence)
    }
}

/// First `max_chars` characters of `text`
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Collapse all whitespace runs to single spaces
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_trims_and_clamps() {
        let field = FieldResult::found("  005/UND/2026 ", 1.7);
        assert_eq!(field.value.as_deref(), Some("005/UND/2026"));
        assert_eq!(field.confidence, 1.0);
    }

    #[test]
    fn test_blank_value_is_missing() {
        let field = FieldResult::found("   ", 0.85);
        assert!(field.is_missing());
        assert_eq!(field.confidence, 0.0);
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate_chars("Déwan Perwakilan", 5), "Déwan");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
