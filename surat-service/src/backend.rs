//! Remote extraction backend seam.
//!
//! The backend is a single "generate from prompt (+ optional image)" call.
//! Everything above it goes through [`BackendClient`], which owns the
//! classified-retry protocol and token accounting.

mod gemini;
mod retry;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::BackendError;

pub use gemini::GeminiBackend;
pub use retry::{
    BackendCallOutcome, BackendClient, BackendReply, CostRates, INPUT_COST_PER_1M,
    OUTPUT_COST_PER_1M, RetryPolicy, calculate_cost,
};

/// One prompt sent to the backend, optionally with an image attached
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub prompt: String,
    /// Encoded JPEG bytes
    pub image: Option<&'a [u8]>,
}

/// Backend reply with its token accounting
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub text: String,
    pub prompt_token_count: u64,
    pub candidate_token_count: u64,
}

/// A vision-capable text generation backend
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate_content(
        &self,
        request: &GenerateRequest<'_>,
    ) -> Result<GenerateResponse, BackendError>;
}

/// Logical backend operations, used for logging and usage attribution
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Transcribe,
    Summarize,
    ExtractFields,
    UnifiedExtract,
}

/// Semantic class of a failed backend attempt; selects the retry policy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    RateLimited,
    Transient,
    ServerError,
    FatalAuth,
    Unknown,
}

impl ErrorClass {
    /// Classify a failure from its message text.
    ///
    /// Checks run in a fixed order; the first matching marker wins.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("429") || lower.contains("rate") {
            ErrorClass::RateLimited
        } else if lower.contains("timeout") || lower.contains("connection") {
            ErrorClass::Transient
        } else if lower.contains("api key") || lower.contains("authentication") {
            ErrorClass::FatalAuth
        } else if lower.contains("500") || lower.contains("503") || lower.contains("server") {
            ErrorClass::ServerError
        } else {
            ErrorClass::Unknown
        }
    }

    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorClass::FatalAuth)
    }
}

impl BackendError {
    /// Classify this failure, preferring structured information over message text
    pub fn class(&self) -> ErrorClass {
        match self {
            BackendError::NotConfigured => ErrorClass::FatalAuth,
            BackendError::Timeout { .. } | BackendError::Connection { .. } => {
                ErrorClass::Transient
            }
            BackendError::Status { status: 429, .. } => ErrorClass::RateLimited,
            BackendError::Status {
                status: 401 | 403, ..
            } => ErrorClass::FatalAuth,
            BackendError::Status {
                status: 500..=599, ..
            } => ErrorClass::ServerError,
            BackendError::Status { message, .. } | BackendError::Other { message } => {
                ErrorClass::from_message(message)
            }
            BackendError::InvalidResponse { .. } | BackendError::EmptyResponse => {
                ErrorClass::Unknown
            }
        }
    }
}
