use std::collections::BTreeSet;

use serde::Serialize;

/// Fields scoring below this are flagged for review
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.75;

/// Overall confidence below this forces manual review
pub const MANUAL_REVIEW_THRESHOLD: f64 = 0.60;

/// More low-confidence fields than this forces manual review
pub const MAX_LOW_CONFIDENCE_FIELDS: usize = 2;

/// Aggregate view over per-field confidences
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceAssessment {
    pub overall: f64,
    pub low_confidence_fields: BTreeSet<String>,
    pub requires_manual_review: bool,
}

/// Assess a submission from its per-field confidences.
///
/// Fields without a confidence (`None`) are left out of every statistic.
pub fn assess<'a, I>(confidences: I) -> ConfidenceAssessment
where
    I: IntoIterator<Item = (&'a str, Option<f64>)>,
{
    let scored: Vec<(&str, f64)> = confidences
        .into_iter()
        .filter_map(|(field, confidence)| confidence.map(|c| (field, c)))
        .collect();

    let overall = if scored.is_empty() {
        0.0
    } else {
        scored.iter().map(|(_, c)| c).sum::<f64>() / scored.len() as f64
    };

    let low_confidence_fields: BTreeSet<String> = scored
        .iter()
        .filter(|(_, c)| *c < LOW_CONFIDENCE_THRESHOLD)
        .map(|(field, _)| (*field).to_string())
        .collect();

    let requires_manual_review = overall < MANUAL_REVIEW_THRESHOLD
        || low_confidence_fields.len() > MAX_LOW_CONFIDENCE_FIELDS;

    ConfidenceAssessment {
        overall,
        low_confidence_fields,
        requires_manual_review,
    }
}
