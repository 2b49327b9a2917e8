//! Scripted backend and in-memory usage sink for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    BackendClient, CostRates, GenerateRequest, GenerateResponse, GenerativeBackend, RetryPolicy,
};
use crate::error::{BackendError, ServiceResult};
use crate::usage::{UsageRecord, UsageSink};

/// A request as the backend saw it
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub prompt: String,
    pub image_len: Option<usize>,
}

/// Backend that replays a fixed script of replies and failures
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    script: Mutex<VecDeque<Result<GenerateResponse, BackendError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.reply_with_tokens(text, 100, 50)
    }

    pub fn reply_with_tokens(self, text: &str, input: u64, output: u64) -> Self {
        self.push(Ok(GenerateResponse {
            text: text.to_string(),
            prompt_token_count: input,
            candidate_token_count: output,
        }))
    }

    pub fn fail_with(self, error: BackendError) -> Self {
        self.push(Err(error))
    }

    pub fn fail_times(mut self, times: usize, make: fn() -> BackendError) -> Self {
        for _ in 0..times {
            self = self.fail_with(make());
        }
        self
    }

    fn push(self, entry: Result<GenerateResponse, BackendError>) -> Self {
        self.script.lock().unwrap().push_back(entry);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn generate_content(
        &self,
        request: &GenerateRequest<'_>,
    ) -> Result<GenerateResponse, BackendError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            prompt: request.prompt.clone(),
            image_len: request.image.map(<[u8]>::len),
        });

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(auth_error()))
    }
}

/// Usage sink that keeps every record
#[derive(Default)]
pub(crate) struct MemoryUsage {
    records: Mutex<Vec<UsageRecord>>,
}

impl MemoryUsage {
    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl UsageSink for MemoryUsage {
    fn record_usage(&self, record: &UsageRecord) -> ServiceResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Retry policy with the default attempt budget and no waiting
pub(crate) fn instant_policy() -> RetryPolicy {
    RetryPolicy {
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        rate_limit_delay: Duration::ZERO,
        ..RetryPolicy::default()
    }
}

/// Client over a scripted backend that never sleeps between attempts
pub(crate) fn instant_client(backend: Arc<ScriptedBackend>) -> BackendClient {
    BackendClient::new(
        backend,
        instant_policy(),
        CostRates::default(),
        Arc::new(MemoryUsage::default()),
    )
}

pub(crate) fn rate_limited() -> BackendError {
    BackendError::Status {
        status: 429,
        message: "Resource has been exhausted".to_string(),
    }
}

pub(crate) fn server_error() -> BackendError {
    BackendError::Status {
        status: 503,
        message: "The model is overloaded".to_string(),
    }
}

pub(crate) fn auth_error() -> BackendError {
    BackendError::Status {
        status: 400,
        message: "API key not valid. Please pass a valid API key.".to_string(),
    }
}

pub(crate) fn unknown_error() -> BackendError {
    BackendError::Other {
        message: "unexpected finish reason".to_string(),
    }
}
