//! End-to-end processing of one scanned letter.
//!
//! Normalize the scan, extract text and fields through the backend (unified
//! call first, escalating to the three-call path), then score confidences and
//! suggest classification codes. Each submission is independent; a `Pipeline`
//! can run many concurrently.

mod result;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::BackendClient;
use crate::error::{PipelineError, PipelineResult, PreprocessError};
use crate::extraction::confidence;
use crate::extraction::schema::SUMMARY_FIELD;
use crate::extraction::summary::SummaryOutcome;
use crate::extraction::{CategorySchema, FieldResult, legacy, patterns, unified};
use crate::kode::KodeMatcher;
use crate::preprocess::{ImageNormalizer, NormalizedImage};
use crate::usage::TokenUsage;

pub use result::{ExtractionResult, ProcessingStatus, Step};
use result::StepLog;

/// Raw transcription archived next to the image artifacts
pub const RAW_TEXT_FILE: &str = "ocr_raw.txt";

/// Which backend strategy a submission starts with
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExtractionMode {
    /// One image call returning text, summary and fields together
    #[default]
    Unified,
    /// Transcribe, then summarize and extract fields from the text
    Legacy,
}

/// Text, summary and fields before scoring
struct Extracted {
    raw_text: String,
    summary: SummaryOutcome,
    fields: BTreeMap<String, FieldResult>,
    tokens: TokenUsage,
}

/// Extraction pipeline shared by all submissions
pub struct Pipeline {
    normalizer: ImageNormalizer,
    backend: BackendClient,
    kode: KodeMatcher,
    artifacts_dir: PathBuf,
}

impl Pipeline {
    /// `artifacts_dir` receives one sub-directory per submission
    pub fn new(backend: BackendClient, kode: KodeMatcher, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            normalizer: ImageNormalizer::new(),
            backend,
            kode,
            artifacts_dir: artifacts_dir.into(),
        }
    }

    /// Process one uploaded scan for the given category
    pub async fn run_pipeline(
        &self,
        image_bytes: &[u8],
        category_id: &str,
        mode: ExtractionMode,
    ) -> PipelineResult<ExtractionResult> {
        let started = Instant::now();
        let submission_id = Uuid::new_v4().to_string();
        let schema = CategorySchema::resolve(category_id);
        let submission_dir = self.artifacts_dir.join(&submission_id);
        let mut steps = StepLog::default();

        info!(
            submission_id = %submission_id,
            category = schema.label(),
            mode = %mode,
            bytes = image_bytes.len(),
            "Processing submission"
        );

        let normalized = self.normalize(image_bytes, &submission_dir).await?;
        steps.completed(Step::Preprocessing);

        let extracted = match mode {
            ExtractionMode::Unified => {
                self.unified_or_legacy(&submission_id, &normalized, &schema, &mut steps)
                    .await?
            }
            ExtractionMode::Legacy => {
                self.legacy(&submission_id, &normalized, &schema, &mut steps)
                    .await?
            }
        };

        archive_raw_text(&submission_dir, &extracted.raw_text);

        let assessment = confidence::assess(
            extracted
                .fields
                .iter()
                .map(|(field, result)| (field.as_str(), Some(result.confidence)))
                .chain(std::iter::once((
                    SUMMARY_FIELD,
                    Some(extracted.summary.confidence),
                ))),
        );

        let kode_candidates = if extracted.summary.summary.is_empty() {
            None
        } else {
            let candidates = self.kode.suggest(&extracted.summary.summary);
            if candidates.is_some() {
                steps.completed(Step::KodeMatching);
            }
            candidates
        };

        let estimated_cost_usd = self.backend.rates().cost_of(extracted.tokens);
        let status = if steps.has_failures() {
            ProcessingStatus::PartialSuccess
        } else {
            ProcessingStatus::Success
        };
        let processing_time_ms = started.elapsed().as_millis() as u64;

        info!(
            submission_id = %submission_id,
            status = %status,
            overall_confidence = assessment.overall,
            requires_manual_review = assessment.requires_manual_review,
            input_tokens = extracted.tokens.input,
            output_tokens = extracted.tokens.output,
            estimated_cost_usd,
            processing_time_ms,
            "Submission processed"
        );

        Ok(ExtractionResult {
            submission_id,
            category: schema.id.clone(),
            status,
            raw_text: extracted.raw_text,
            summary: extracted.summary.summary,
            summary_confidence: extracted.summary.confidence,
            fields: extracted.fields,
            used_fallback: steps.has_failures(),
            fallback_reason: steps.fallback_reason(),
            steps_completed: steps.completed_names(),
            steps_failed: steps.failed_names(),
            tokens_used: extracted.tokens,
            estimated_cost_usd,
            overall_confidence: assessment.overall,
            low_confidence_fields: assessment.low_confidence_fields,
            requires_manual_review: assessment.requires_manual_review,
            kode_candidates,
            estimated_dpi: normalized.estimated_dpi,
            was_upscaled: normalized.was_upscaled,
            processing_time_ms,
        })
    }

    /// Image work is CPU bound and runs off the async workers
    async fn normalize(&self, bytes: &[u8], output_dir: &Path) -> PipelineResult<NormalizedImage> {
        let normalizer = self.normalizer;
        let bytes = bytes.to_vec();
        let output_dir = output_dir.to_path_buf();

        let normalized =
            tokio::task::spawn_blocking(move || normalizer.normalize(&bytes, &output_dir))
                .await
                .map_err(|e| PreprocessError::Interrupted {
                    message: e.to_string(),
                })??;
        Ok(normalized)
    }

    async fn unified_or_legacy(
        &self,
        submission_id: &str,
        normalized: &NormalizedImage,
        schema: &CategorySchema,
        steps: &mut StepLog,
    ) -> PipelineResult<Extracted> {
        let extraction = match unified::extract(
            &self.backend,
            submission_id,
            &normalized.transmission,
            schema,
        )
        .await
        {
            Ok(extraction) => extraction,
            Err(e @ PipelineError::RetriesExhausted { .. }) => {
                warn!(
                    submission_id,
                    error = %e,
                    "Unified extraction unavailable, escalating to three-call path"
                );
                steps.failed(Step::UnifiedExtract);
                return self.legacy(submission_id, normalized, schema, steps).await;
            }
            Err(e) => return Err(e),
        };

        if extraction.raw_text.trim().is_empty() {
            return Err(PipelineError::NoTextExtracted);
        }
        steps.completed(Step::UnifiedExtract);

        if extraction.structured && extraction.summary.used_fallback {
            steps.failed(Step::Summarization);
        }

        let fields = if extraction.structured {
            steps.completed(Step::AutoFill);
            extraction.fields
        } else {
            debug!(submission_id, "Rebuilding fields from unstructured reply");
            steps.failed(Step::AutoFill);
            patterns::extract_fields(&extraction.raw_text, &schema.data_fields())
        };

        Ok(Extracted {
            raw_text: extraction.raw_text,
            summary: extraction.summary,
            fields,
            tokens: extraction.tokens,
        })
    }

    async fn legacy(
        &self,
        submission_id: &str,
        normalized: &NormalizedImage,
        schema: &CategorySchema,
        steps: &mut StepLog,
    ) -> PipelineResult<Extracted> {
        let transcription =
            legacy::transcribe(&self.backend, submission_id, &normalized.transmission).await?;
        steps.completed(Step::Ocr);

        let summary =
            legacy::summarize(&self.backend, submission_id, &transcription.text, schema).await;
        if summary.used_fallback {
            steps.failed(Step::Summarization);
        } else {
            steps.completed(Step::Summarization);
        }

        let fields = legacy::extract_fields(
            &self.backend,
            submission_id,
            &transcription.text,
            &schema.data_fields(),
        )
        .await;
        if fields.used_fallback {
            steps.failed(Step::AutoFill);
        } else {
            steps.completed(Step::AutoFill);
        }

        let mut tokens = transcription.tokens;
        tokens += summary.tokens;
        tokens += fields.tokens;

        Ok(Extracted {
            raw_text: transcription.text,
            summary,
            fields: fields.fields,
            tokens,
        })
    }
}

fn archive_raw_text(dir: &Path, text: &str) {
    let path = dir.join(RAW_TEXT_FILE);
    if let Err(e) = std::fs::write(&path, text) {
        warn!(path = %path.display(), error = %e, "Failed to archive raw text");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{
        ScriptedBackend, auth_error, instant_client, rate_limited, server_error,
    };
    use crate::extraction::BACKEND_CONFIDENCE;
    use crate::kode::{ReferenceEntry, ReferenceTable};
    use crate::preprocess::tests::page_png;
    use crate::preprocess::{ARCHIVAL_FILE, TRANSMISSION_FILE};
    use std::str::FromStr;
    use std::sync::Arc;

    const UNIFIED_REPLY: &str = r#"{
        "raw_text": "Nomor: 005/UND/2026\nPerihal: Undangan Rapat Paripurna",
        "isi_ringkas": "Rapat Paripurna pada 28 Januari 2026 di Gedung DPRD",
        "nomor_surat": "005/UND/2026",
        "tgl_surat_masuk": "28/01/2026",
        "asal_surat": "Sekretariat Daerah",
        "kepada": "Ketua DPRD",
        "lampiran": null
    }"#;

    const LETTER_TEXT: &str = "Nomor : 12/DPRD/2026\nPerihal : Laporan Reses Anggota\nDengan hormat.";

    fn pipeline(backend: Arc<ScriptedBackend>, dir: &Path) -> Pipeline {
        let table = ReferenceTable::from_entries(vec![ReferenceEntry {
            code: "005".to_string(),
            description: "undangan rapat".to_string(),
        }]);
        Pipeline::new(
            instant_client(backend),
            KodeMatcher::new(true, Arc::new(table)),
            dir,
        )
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(ExtractionMode::from_str("legacy").unwrap(), ExtractionMode::Legacy);
        assert_eq!(ExtractionMode::from_str("UNIFIED").unwrap(), ExtractionMode::Unified);
        assert_eq!(ExtractionMode::default(), ExtractionMode::Unified);
    }

    #[tokio::test]
    async fn test_unified_success() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new().reply_with_tokens(UNIFIED_REPLY, 1000, 200));
        let pipeline = pipeline(backend.clone(), dir.path());

        let result = pipeline
            .run_pipeline(&page_png(300, 400), "undangan", ExtractionMode::Unified)
            .await
            .unwrap();

        assert_eq!(backend.call_count(), 1);
        assert_eq!(result.status, ProcessingStatus::Success);
        assert!(!result.used_fallback);
        assert_eq!(result.fallback_reason, None);
        assert_eq!(result.category, "undangan");
        assert_eq!(result.summary_confidence, BACKEND_CONFIDENCE);
        assert_eq!(
            result.fields["tgl_surat_masuk"].value.as_deref(),
            Some("2026-01-28")
        );
        assert!(result.fields["lampiran"].is_missing());
        assert!(!result.fields.contains_key(SUMMARY_FIELD));
        assert_eq!(result.tokens_used, TokenUsage::new(1000, 200));
        assert!((result.estimated_cost_usd - crate::calculate_cost(1000, 200)).abs() < 1e-12);
        assert!(result.requires_manual_review);

        let candidates = result.kode_candidates.unwrap();
        assert_eq!(candidates[0].code, "005");
        assert!(result.steps_completed.contains(&"kode_matching".to_string()));
    }

    #[tokio::test]
    async fn test_artifacts_are_written_per_submission() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new().reply(UNIFIED_REPLY));
        let pipeline = pipeline(backend, dir.path());

        let result = pipeline
            .run_pipeline(&page_png(300, 400), "undangan", ExtractionMode::Unified)
            .await
            .unwrap();

        let submission_dir = dir.path().join(&result.submission_id);
        assert!(submission_dir.join(ARCHIVAL_FILE).exists());
        assert!(submission_dir.join(TRANSMISSION_FILE).exists());
        let archived = std::fs::read_to_string(submission_dir.join(RAW_TEXT_FILE)).unwrap();
        assert_eq!(archived, result.raw_text);
    }

    #[tokio::test]
    async fn test_unstructured_reply_rebuilds_fields_from_text() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new().reply(LETTER_TEXT));
        let pipeline = pipeline(backend, dir.path());

        let result = pipeline
            .run_pipeline(&page_png(300, 400), "masuk_biasa", ExtractionMode::Unified)
            .await
            .unwrap();

        assert_eq!(result.status, ProcessingStatus::PartialSuccess);
        assert_eq!(result.fallback_reason.as_deref(), Some("BACKEND_AUTO_FILL_FAILED"));
        assert_eq!(result.raw_text, LETTER_TEXT);
        assert_eq!(
            result.fields["nomor_surat"].value.as_deref(),
            Some("12/DPRD/2026")
        );
        assert_eq!(result.fields["nomor_surat"].confidence, patterns::PATTERN_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_unified_exhaustion_escalates_to_legacy() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            ScriptedBackend::new()
                .fail_times(4, rate_limited)
                .reply(LETTER_TEXT)
                .fail_times(4, server_error)
                .fail_times(4, server_error),
        );
        let pipeline = pipeline(backend.clone(), dir.path());

        let result = pipeline
            .run_pipeline(&page_png(300, 400), "masuk_biasa", ExtractionMode::Unified)
            .await
            .unwrap();

        assert_eq!(backend.call_count(), 13);
        assert_eq!(result.status, ProcessingStatus::PartialSuccess);
        assert_eq!(
            result.fallback_reason.as_deref(),
            Some("BACKEND_UNIFIED_EXTRACT_SUMMARIZATION_AUTO_FILL_FAILED")
        );
        assert_eq!(result.summary, "Laporan Reses Anggota");
        assert_eq!(
            result.fields["nomor_surat"].value.as_deref(),
            Some("12/DPRD/2026")
        );
        assert_eq!(result.tokens_used, TokenUsage::new(100, 50));
    }

    #[tokio::test]
    async fn test_legacy_mode_uses_three_calls() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            ScriptedBackend::new()
                .reply(LETTER_TEXT)
                .reply("Laporan reses anggota DPRD")
                .reply(r#"{"nomor_surat": "12/DPRD/2026", "tgl_surat_masuk": null}"#),
        );
        let pipeline = pipeline(backend.clone(), dir.path());

        let result = pipeline
            .run_pipeline(&page_png(300, 400), "masuk_biasa", ExtractionMode::Legacy)
            .await
            .unwrap();

        assert_eq!(backend.call_count(), 3);
        assert_eq!(result.status, ProcessingStatus::Success);
        assert_eq!(result.summary, "Laporan reses anggota DPRD");
        assert_eq!(result.fields["nomor_surat"].confidence, BACKEND_CONFIDENCE);
        assert_eq!(result.tokens_used, TokenUsage::new(300, 150));
        assert_eq!(
            result.steps_completed,
            vec!["preprocessing", "ocr", "summarization", "auto_fill", "kode_matching"]
        );

        let requests = backend.requests();
        assert!(requests[0].image_len.is_some());
        assert!(requests[1].image_len.is_none());
        assert!(requests[2].image_len.is_none());
    }

    #[tokio::test]
    async fn test_fatal_auth_stops_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new().fail_with(auth_error()));
        let pipeline = pipeline(backend.clone(), dir.path());

        let error = pipeline
            .run_pipeline(&page_png(300, 400), "undangan", ExtractionMode::Unified)
            .await
            .unwrap_err();

        assert_eq!(error.error_code(), "backend_fatal_auth");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_transcription_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new().reply("  "));
        let pipeline = pipeline(backend, dir.path());

        let error = pipeline
            .run_pipeline(&page_png(300, 400), "keluar", ExtractionMode::Legacy)
            .await
            .unwrap_err();

        assert_eq!(error.error_code(), "no_text_extracted");
    }

    #[tokio::test]
    async fn test_corrupt_upload_never_reaches_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new().reply(UNIFIED_REPLY));
        let pipeline = pipeline(backend.clone(), dir.path());

        let error = pipeline
            .run_pipeline(b"not an image at all", "undangan", ExtractionMode::Unified)
            .await
            .unwrap_err();

        assert_eq!(error.error_code(), "image_corrupt");
        assert_eq!(backend.call_count(), 0);
    }
}
