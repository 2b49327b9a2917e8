use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{GenerateRequest, GenerateResponse, GenerativeBackend};
use crate::config::GeminiConfig;
use crate::error::{BackendError, ServiceError, ServiceResult};

/// Gemini `generateContent` client
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::Backend(BackendError::Connection {
                    url: config.base_url.clone(),
                    source: e,
                })
            })?;

        Ok(Self { client, config })
    }

    /// Whether an API key is available; calls fail as fatal auth without one
    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Check that the configured model is reachable with the configured key
    pub async fn health_check(&self) -> bool {
        let Some(api_key) = self.api_key() else {
            return false;
        };
        let url = format!(
            "{}/v1beta/models/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        match self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Backend health check failed");
                false
            }
        }
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_body(&self, request: &GenerateRequest<'_>) -> GenerateContentRequest {
        let mut parts = vec![RequestPart {
            text: Some(request.prompt.clone()),
            inline_data: None,
        }];

        if let Some(image) = request.image {
            parts.push(RequestPart {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: "image/jpeg".to_string(),
                    data: BASE64.encode(image),
                }),
            });
        }

        GenerateContentRequest {
            contents: vec![RequestContent { parts }],
            generation_config: Some(GenerationConfig {
                temperature: Some(self.config.temperature),
            }),
        }
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn generate_content(
        &self,
        request: &GenerateRequest<'_>,
    ) -> Result<GenerateResponse, BackendError> {
        let api_key = self.api_key().ok_or(BackendError::NotConfigured)?;
        let url = self.endpoint();
        let body = self.build_body(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout {
                        url: url.clone(),
                        source: e,
                    }
                } else {
                    BackendError::Connection {
                        url: url.clone(),
                        source: e,
                    }
                }
            })?;

        let status = response.status();
        let payload = response.text().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout {
                    url: url.clone(),
                    source: e,
                }
            } else {
                BackendError::Connection {
                    url: url.clone(),
                    source: e,
                }
            }
        })?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message(&payload),
            });
        }

        parse_generate_response(&payload)
    }
}

/// Pull the human-readable message out of a Gemini error body
fn error_message(payload: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(payload)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| payload.trim().to_string())
}

fn parse_generate_response(payload: &str) -> Result<GenerateResponse, BackendError> {
    let parsed: GenerateContentResponse = serde_json::from_str(payload)
        .map_err(|e| BackendError::InvalidResponse { source: e })?;

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or(BackendError::EmptyResponse)?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    let usage = parsed.usage_metadata.unwrap_or_default();

    Ok(GenerateResponse {
        text,
        prompt_token_count: usage.prompt_token_count,
        candidate_token_count: usage.candidates_token_count,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
