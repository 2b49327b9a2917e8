use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::extraction::FieldResult;
use crate::kode::KodeCandidate;
use crate::usage::TokenUsage;

/// Overall outcome of a submission that produced text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    PartialSuccess,
}

/// Named stages reported in `steps_completed` / `steps_failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    Preprocessing,
    UnifiedExtract,
    Ocr,
    Summarization,
    AutoFill,
    KodeMatching,
}

/// Everything extracted from one scanned letter
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub submission_id: String,
    pub category: String,
    pub status: ProcessingStatus,
    pub raw_text: String,
    pub summary: String,
    pub summary_confidence: f64,
    /// Category fields other than the summary
    pub fields: BTreeMap<String, FieldResult>,
    pub used_fallback: bool,
    pub fallback_reason: Option<String>,
    pub steps_completed: Vec<String>,
    pub steps_failed: Vec<String>,
    pub tokens_used: TokenUsage,
    pub estimated_cost_usd: f64,
    pub overall_confidence: f64,
    pub low_confidence_fields: BTreeSet<String>,
    pub requires_manual_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kode_candidates: Option<Vec<KodeCandidate>>,
    pub estimated_dpi: u32,
    pub was_upscaled: bool,
    pub processing_time_ms: u64,
}

/// Tracks which stages completed or degraded during one run
#[derive(Debug, Default)]
pub(crate) struct StepLog {
    completed: Vec<Step>,
    failed: Vec<Step>,
}

impl StepLog {
    pub fn completed(&mut self, step: Step) {
        self.completed.push(step);
    }

    pub fn failed(&mut self, step: Step) {
        self.failed.push(step);
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// `BACKEND_<STEP>_..._FAILED`, or `None` when nothing failed
    pub fn fallback_reason(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }

        let steps: Vec<String> = self
            .failed
            .iter()
            .map(|step| step.as_ref().to_uppercase())
            .collect();
        Some(format!("BACKEND_{}_FAILED", steps.join("_")))
    }

    pub fn completed_names(&self) -> Vec<String> {
        self.completed.iter().map(ToString::to_string).collect()
    }

    pub fn failed_names(&self) -> Vec<String> {
        self.failed.iter().map(ToString::to_string).collect()
    }
}
