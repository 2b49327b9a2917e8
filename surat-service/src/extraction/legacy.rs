//! Three-call path: transcribe, then summarize and extract fields from text.
//!
//! Only transcription is mandatory. Summarization and field extraction fall
//! back to the local heuristics when the backend gives up.

use std::collections::BTreeMap;

use tracing::warn;

use super::prompts::ExtractionCall;
use super::response::{parse_json_object, scan_quoted_pairs, value_to_field};
use super::schema::CategorySchema;
use super::summary::{self, SUMMARY_MAX_CHARS, SummaryOutcome};
use super::{
    BACKEND_CONFIDENCE, FieldResult, MALFORMED_REPLY_CONFIDENCE, backend_field, patterns,
    truncate_chars,
};
use crate::backend::BackendClient;
use crate::error::{PipelineError, PipelineResult};
use crate::usage::TokenUsage;

/// Text transcribed from the page image
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    pub tokens: TokenUsage,
}

/// Field values plus how they were obtained
#[derive(Debug, Clone, Default)]
pub struct FieldsOutcome {
    pub fields: BTreeMap<String, FieldResult>,
    pub used_fallback: bool,
    pub tokens: TokenUsage,
}

/// Transcribe the page. Failure here aborts the submission.
pub async fn transcribe(
    client: &BackendClient,
    submission_id: &str,
    image: &[u8],
) -> PipelineResult<Transcription> {
    let reply = ExtractionCall::Transcribe { image }
        .send(client, submission_id)
        .await
        .into_result()?;

    let text = reply.text.trim().to_string();
    if text.is_empty() {
        return Err(PipelineError::NoTextExtracted);
    }

    Ok(Transcription {
        text,
        tokens: reply.tokens,
    })
}

/// Summarize transcribed text, falling back to the local heuristic
pub async fn summarize(
    client: &BackendClient,
    submission_id: &str,
    text: &str,
    schema: &CategorySchema,
) -> SummaryOutcome {
    if text.trim().is_empty() {
        return summary::summarize(text);
    }

    let call = ExtractionCall::Summarize { text, schema };
    let reply = match call.send(client, submission_id).await.into_result() {
        Ok(reply) => reply,
        Err(e) => {
            warn!(submission_id, error = %e, "Backend summary unavailable, using local summary");
            return summary::summarize(text);
        }
    };

    let backend_summary = reply.text.trim();
    if backend_summary.is_empty() {
        warn!(submission_id, "Backend returned an empty summary, using local summary");
        return SummaryOutcome {
            tokens: reply.tokens,
            ..summary::summarize(text)
        };
    }

    SummaryOutcome {
        summary: truncate_chars(backend_summary, SUMMARY_MAX_CHARS),
        confidence: BACKEND_CONFIDENCE,
        used_fallback: false,
        tokens: reply.tokens,
    }
}

/// Extract fields from transcribed text, falling back to local patterns
pub async fn extract_fields(
    client: &BackendClient,
    submission_id: &str,
    text: &str,
    fields: &[&'static str],
) -> FieldsOutcome {
    if fields.is_empty() {
        return FieldsOutcome::default();
    }

    let call = ExtractionCall::ExtractFields { text, fields };
    let reply = match call.send(client, submission_id).await.into_result() {
        Ok(reply) => reply,
        Err(e) => {
            warn!(submission_id, error = %e, "Backend field extraction unavailable, using patterns");
            return FieldsOutcome {
                fields: patterns::extract_fields(text, fields),
                used_fallback: true,
                tokens: TokenUsage::default(),
            };
        }
    };

    match parse_field_reply(&reply.text, fields) {
        Some(parsed) => FieldsOutcome {
            fields: parsed,
            used_fallback: false,
            tokens: reply.tokens,
        },
        None => {
            warn!(submission_id, "Field reply held no usable values, using patterns");
            FieldsOutcome {
                fields: patterns::extract_fields(text, fields),
                used_fallback: true,
                tokens: reply.tokens,
            }
        }
    }
}

/// Read requested fields from a reply: JSON first, then quoted pairs
/// scraped from malformed JSON. `None` when neither yields anything.
pub fn parse_field_reply(reply: &str, fields: &[&str]) -> Option<BTreeMap<String, FieldResult>> {
    if let Some(object) = parse_json_object(reply) {
        return Some(
            fields
                .iter()
                .map(|field| {
                    let result = object
                        .get(*field)
                        .and_then(value_to_field)
                        .map(|value| backend_field(field, value, BACKEND_CONFIDENCE))
                        .unwrap_or_else(FieldResult::missing);
                    ((*field).to_string(), result)
                })
                .collect(),
        );
    }

    let pairs = scan_quoted_pairs(reply, fields);
    if pairs.is_empty() {
        return None;
    }

    let mut recovered: BTreeMap<String, FieldResult> = fields
        .iter()
        .map(|field| ((*field).to_string(), FieldResult::missing()))
        .collect();
    for (field, value) in pairs {
        let result = backend_field(&field, value, MALFORMED_REPLY_CONFIDENCE);
        recovered.insert(field, result);
    }

    Some(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{ScriptedBackend, instant_client, server_error, unknown_error};
    use std::sync::Arc;

    const FIELDS: &[&str] = &["nomor_surat", "tgl_surat", "lampiran"];

    #[test]
    fn test_parse_json_reply() {
        let reply = r#"{"nomor_surat": "001/2026", "tgl_surat": "28/01/2026", "lampiran": null}"#;
        let fields = parse_field_reply(reply, FIELDS).unwrap();

        assert_eq!(fields["nomor_surat"].value.as_deref(), Some("001/2026"));
        assert_eq!(fields["nomor_surat"].confidence, BACKEND_CONFIDENCE);
        assert_eq!(fields["tgl_surat"].value.as_deref(), Some("2026-01-28"));
        assert!(fields["lampiran"].is_missing());
    }

    #[test]
    fn test_parse_malformed_reply() {
        let reply = r#"Hasil: {"nomor_surat": "001/2026", "tgl_surat": "2026-01-28", "lampiran""#;
        let fields = parse_field_reply(reply, FIELDS).unwrap();

        assert_eq!(fields["nomor_surat"].confidence, MALFORMED_REPLY_CONFIDENCE);
        assert_eq!(fields["tgl_surat"].value.as_deref(), Some("2026-01-28"));
        assert!(fields["lampiran"].is_missing());
        assert_eq!(fields.len(), FIELDS.len());
    }

    #[test]
    fn test_parse_unusable_reply() {
        assert!(parse_field_reply("Maaf, saya tidak dapat membaca dokumen.", FIELDS).is_none());
    }

    #[tokio::test]
    async fn test_transcribe_empty_text_is_fatal() {
        let backend = Arc::new(ScriptedBackend::new().reply("   \n"));
        let client = instant_client(backend);

        let error = transcribe(&client, "sub-1", &[0xFF]).await.unwrap_err();
        assert_eq!(error.error_code(), "no_text_extracted");
    }

    #[tokio::test]
    async fn test_summary_falls_back_after_retries() {
        let backend = Arc::new(ScriptedBackend::new().fail_times(4, server_error));
        let client = instant_client(backend.clone());
        let schema = CategorySchema::resolve("masuk_biasa");

        let outcome = summarize(&client, "sub-2", "Perihal: Laporan Reses\nIsi", &schema).await;

        assert_eq!(outcome.summary, "Laporan Reses");
        assert!(outcome.used_fallback);
        assert_eq!(outcome.confidence, summary::LABELLED_CONFIDENCE);
        assert_eq!(backend.call_count(), 4);
    }

    #[tokio::test]
    async fn test_backend_summary() {
        let backend = Arc::new(ScriptedBackend::new().reply(" Undangan rapat paripurna DPRD. "));
        let client = instant_client(backend);
        let schema = CategorySchema::resolve("undangan");

        let outcome = summarize(&client, "sub-3", "teks surat", &schema).await;

        assert_eq!(outcome.summary, "Undangan rapat paripurna DPRD.");
        assert_eq!(outcome.confidence, BACKEND_CONFIDENCE);
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.tokens, TokenUsage::new(100, 50));
    }

    #[tokio::test]
    async fn test_backend_fields_send_text_without_image() {
        let backend = Arc::new(
            ScriptedBackend::new().reply(r#"{"nomor_surat": "005/77/2026", "lampiran": "2"}"#),
        );
        let client = instant_client(backend.clone());

        let outcome = extract_fields(
            &client,
            "sub-5",
            "Nomor: 005/77/2026",
            &["nomor_surat", "lampiran"],
        )
        .await;

        assert!(!outcome.used_fallback);
        assert_eq!(outcome.fields["lampiran"].value.as_deref(), Some("2"));

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].image_len, None);
        assert!(requests[0].prompt.contains("Nomor: 005/77/2026"));
        assert!(requests[0].prompt.contains("nomor_surat"));
        assert!(requests[0].prompt.contains("lampiran"));
    }

    #[tokio::test]
    async fn test_fields_fall_back_to_patterns() {
        let backend = Arc::new(ScriptedBackend::new().fail_times(4, unknown_error));
        let client = instant_client(backend);

        let outcome =
            extract_fields(&client, "sub-4", "Nomor Surat: 123/ABC/2026", &["nomor_surat"]).await;

        assert!(outcome.used_fallback);
        assert_eq!(
            outcome.fields["nomor_surat"].value.as_deref(),
            Some("123/ABC/2026")
        );
        assert_eq!(outcome.fields["nomor_surat"].confidence, 0.55);
    }
}
