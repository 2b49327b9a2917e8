use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::reference::{ReferenceEntry, ReferenceTable};

/// Suggestions returned per summary
pub const MAX_CANDIDATES: usize = 3;

/// Keyword overlap maps onto [0, 0.7]; a keyword match is never certain
const SCORE_CEILING: f64 = 0.7;

/// A suggested classification code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KodeCandidate {
    pub code: String,
    pub description: String,
    pub confidence: f64,
    pub reasoning: Option<String>,
}

/// Suggests classification codes for a summary
pub struct KodeMatcher {
    enabled: bool,
    table: Arc<ReferenceTable>,
}

impl KodeMatcher {
    pub fn new(enabled: bool, table: Arc<ReferenceTable>) -> Self {
        Self { enabled, table }
    }

    pub fn disabled() -> Self {
        Self::new(false, Arc::new(ReferenceTable::from_entries(Vec::new())))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Top candidates for a summary; `None` when matching is switched off
    pub fn suggest(&self, summary: &str) -> Option<Vec<KodeCandidate>> {
        if !self.enabled {
            return None;
        }

        let entries = self.table.snapshot();
        let candidates = score_entries(summary, &entries);
        debug!(
            reference_entries = entries.len(),
            candidates = candidates.len(),
            "Classification codes scored"
        );
        Some(candidates)
    }
}

/// Score every entry by the share of its description words found in the
/// summary, best first, at most [`MAX_CANDIDATES`].
pub fn score_entries(summary: &str, entries: &[ReferenceEntry]) -> Vec<KodeCandidate> {
    let summary = summary.to_lowercase();
    if summary.trim().is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<KodeCandidate> = entries
        .iter()
        .filter_map(|entry| {
            let description = entry.description.to_lowercase();
            let keywords: Vec<&str> = description.split_whitespace().collect();
            if keywords.is_empty() {
                return None;
            }

            let matched = keywords
                .iter()
                .filter(|keyword| summary.contains(*keyword))
                .count();
            if matched == 0 {
                return None;
            }

            Some(KodeCandidate {
                code: entry.code.clone(),
                description: entry.description.clone(),
                confidence: matched as f64 / keywords.len() as f64 * SCORE_CEILING,
                reasoning: Some(format!(
                    "{} of {} keywords found in summary",
                    matched,
                    keywords.len()
                )),
            })
        })
        .collect();

    // Stable sort keeps reference order among ties
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<ReferenceEntry> {
        [
            ("005", "undangan rapat"),
            ("900", "keuangan anggaran"),
            ("800", "kepegawaian"),
            ("005.1", "undangan"),
            ("010", "urusan dalam rapat kantor"),
        ]
        .into_iter()
        .map(|(code, description)| ReferenceEntry {
            code: code.to_string(),
            description: description.to_string(),
        })
        .collect()
    }

    #[test]
    fn test_scores_and_order() {
        let candidates = score_entries("Undangan Rapat Paripurna DPRD", &entries());

        let codes: Vec<&str> = candidates.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["005", "005.1", "010"]);
        assert!((candidates[0].confidence - 0.7).abs() < 1e-9);
        assert!((candidates[2].confidence - 0.175).abs() < 1e-9);
        assert_eq!(
            candidates[0].reasoning.as_deref(),
            Some("2 of 2 keywords found in summary")
        );
    }

    #[test]
    fn test_scores_bounded_and_capped() {
        let candidates = score_entries("undangan rapat anggaran keuangan kepegawaian", &entries());
        assert_eq!(candidates.len(), MAX_CANDIDATES);
        for candidate in &candidates {
            assert!(candidate.confidence > 0.0 && candidate.confidence <= SCORE_CEILING);
        }
        for pair in candidates.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_no_overlap() {
        assert!(score_entries("laporan reses", &entries()).is_empty());
        assert!(score_entries("", &entries()).is_empty());
    }

    #[test]
    fn test_disabled_matcher_returns_none() {
        assert_eq!(KodeMatcher::disabled().suggest("undangan rapat"), None);
    }

    #[test]
    fn test_enabled_matcher_uses_table() {
        let matcher = KodeMatcher::new(true, Arc::new(ReferenceTable::from_entries(entries())));
        let candidates = matcher.suggest("Permohonan anggaran").unwrap();
        assert_eq!(candidates[0].code, "900");
    }
}
