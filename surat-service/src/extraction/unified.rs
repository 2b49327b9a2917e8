use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::prompts::ExtractionCall;
use super::response::{parse_json_object, value_to_field};
use super::schema::{CategorySchema, SUMMARY_FIELD};
use super::summary::{self, SUMMARY_MAX_CHARS, SummaryOutcome};
use super::{
    BACKEND_CONFIDENCE, FieldResult, backend_field, collapse_whitespace, truncate_chars,
};
use crate::backend::BackendClient;
use crate::error::PipelineResult;
use crate::usage::TokenUsage;

/// Summary confidence when the reply was not JSON and the leading text is used
pub const DEGRADED_SUMMARY_CONFIDENCE: f64 = 0.40;

/// Everything one unified call produced
#[derive(Debug, Clone)]
pub struct UnifiedExtraction {
    pub raw_text: String,
    pub summary: SummaryOutcome,
    /// Category fields other than the summary
    pub fields: BTreeMap<String, FieldResult>,
    /// False when the reply was not JSON; `fields` is then empty
    pub structured: bool,
    pub tokens: TokenUsage,
}

/// Transcribe, summarize and extract fields with a single image call.
///
/// Backend failure is returned as an error so the caller can escalate;
/// an unparseable reply degrades locally instead.
pub async fn extract(
    client: &BackendClient,
    submission_id: &str,
    image: &[u8],
    schema: &CategorySchema,
) -> PipelineResult<UnifiedExtraction> {
    let reply = ExtractionCall::UnifiedExtract { image, schema }
        .send(client, submission_id)
        .await
        .into_result()?;

    let mut extraction = parse_unified_reply(&reply.text, schema);
    extraction.tokens = reply.tokens;

    if extraction.structured {
        debug!(
            submission_id,
            fields_found = extraction.fields.values().filter(|f| !f.is_missing()).count(),
            "Unified reply parsed"
        );
    } else {
        warn!(
            submission_id,
            reply_chars = reply.text.chars().count(),
            "Unified reply was not JSON, using raw reply as text"
        );
    }

    Ok(extraction)
}

/// Interpret a unified reply against the schema's field allow-list
pub fn parse_unified_reply(reply: &str, schema: &CategorySchema) -> UnifiedExtraction {
    let data_fields = schema.data_fields();

    let Some(object) = parse_json_object(reply) else {
        let raw_text = reply.trim().to_string();
        let summary = SummaryOutcome {
            summary: truncate_chars(&collapse_whitespace(&raw_text), SUMMARY_MAX_CHARS),
            confidence: DEGRADED_SUMMARY_CONFIDENCE,
            used_fallback: true,
            tokens: TokenUsage::default(),
        };
        return UnifiedExtraction {
            raw_text,
            summary,
            fields: BTreeMap::new(),
            structured: false,
            tokens: TokenUsage::default(),
        };
    };

    let raw_text = object
        .get("raw_text")
        .and_then(value_to_field)
        .unwrap_or_default();

    let summary = match object.get(SUMMARY_FIELD).and_then(value_to_field) {
        Some(text) => SummaryOutcome {
            summary: text,
            confidence: BACKEND_CONFIDENCE,
            used_fallback: false,
            tokens: TokenUsage::default(),
        },
        None => summary::summarize(&raw_text),
    };

    // Keys outside the allow-list are ignored
    let fields = data_fields
        .iter()
        .map(|field| {
            let result = object
                .get(*field)
                .and_then(value_to_field)
                .map(|value| backend_field(field, value, BACKEND_CONFIDENCE))
                .unwrap_or_else(FieldResult::missing);
            ((*field).to_string(), result)
        })
        .collect();

    UnifiedExtraction {
        raw_text,
        summary,
        fields,
        structured: true,
        tokens: TokenUsage::default(),
    }
}
