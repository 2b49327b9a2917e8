use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::{ErrorClass, GenerateRequest, GenerativeBackend, Operation};
use crate::config::{GeminiConfig, RetryConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::usage::{TokenUsage, UsageRecord, UsageSink};

/// USD per one million input tokens
pub const INPUT_COST_PER_1M: f64 = 0.0075;
/// USD per one million output tokens
pub const OUTPUT_COST_PER_1M: f64 = 0.030;

/// Estimated USD cost of one call at the default rates
pub fn calculate_cost(input_tokens: u64, output_tokens: u64) -> f64 {
    CostRates::default().cost(input_tokens, output_tokens)
}

/// Per-token pricing of the backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostRates {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            input_per_1m: INPUT_COST_PER_1M,
            output_per_1m: OUTPUT_COST_PER_1M,
        }
    }
}

impl CostRates {
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_per_1m
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_1m
    }

    pub fn cost_of(&self, tokens: TokenUsage) -> f64 {
        self.cost(tokens.input, tokens.output)
    }
}

impl From<&GeminiConfig> for CostRates {
    fn from(config: &GeminiConfig) -> Self {
        Self {
            input_per_1m: config.input_cost_per_1m,
            output_per_1m: config.output_cost_per_1m,
        }
    }
}

/// Wait schedule between failed attempts, selected by error class.
///
/// `max_retries` counts retries, so an operation makes at most
/// `max_retries + 1` attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(32),
            rate_limit_delay: Duration::from_secs(60),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
            rate_limit_delay: Duration::from_secs(config.rate_limit_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for the zero-based retry index, capped at `max_delay`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before retrying after failed attempt `attempt` (zero-based),
    /// or `None` when the failure must not be retried.
    pub fn delay_for(&self, class: ErrorClass, attempt: u32) -> Option<Duration> {
        if !class.is_retryable() || attempt >= self.max_retries {
            return None;
        }

        Some(match class {
            ErrorClass::RateLimited => self.rate_limit_delay,
            _ => self.backoff(attempt),
        })
    }
}

/// Result of one logical backend operation, after retries
#[derive(Debug, Clone)]
pub struct BackendCallOutcome {
    pub operation: Operation,
    pub succeeded: bool,
    pub text: Option<String>,
    pub tokens: TokenUsage,
    pub cost_usd: f64,
    pub attempts_used: u32,
    pub error_class: Option<ErrorClass>,
    pub error_message: Option<String>,
}

/// Successful backend reply with its accounting
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub text: String,
    pub tokens: TokenUsage,
    pub cost_usd: f64,
}

impl BackendCallOutcome {
    /// Convert into the reply, or the pipeline error this failure represents
    pub fn into_result(self) -> PipelineResult<BackendReply> {
        match (self.succeeded, self.text) {
            (true, Some(text)) => Ok(BackendReply {
                text,
                tokens: self.tokens,
                cost_usd: self.cost_usd,
            }),
            _ => {
                let class = self.error_class.unwrap_or(ErrorClass::Unknown);
                if class == ErrorClass::FatalAuth {
                    Err(PipelineError::BackendFatalAuth {
                        operation: self.operation,
                        message: self.error_message.unwrap_or_default(),
                    })
                } else {
                    Err(PipelineError::RetriesExhausted {
                        operation: self.operation,
                        class,
                        attempts: self.attempts_used,
                    })
                }
            }
        }
    }
}

/// Backend wrapper that applies classified retries and records usage
#[derive(Clone)]
pub struct BackendClient {
    backend: Arc<dyn GenerativeBackend>,
    policy: RetryPolicy,
    rates: CostRates,
    usage: Arc<dyn UsageSink>,
}

impl BackendClient {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        policy: RetryPolicy,
        rates: CostRates,
        usage: Arc<dyn UsageSink>,
    ) -> Self {
        Self {
            backend,
            policy,
            rates,
            usage,
        }
    }

    pub fn rates(&self) -> CostRates {
        self.rates
    }

    /// Run one logical operation, retrying per the error class of each failure.
    ///
    /// Never returns an error; the outcome carries the final class and message.
    pub async fn execute(
        &self,
        submission_id: &str,
        operation: Operation,
        request: &GenerateRequest<'_>,
    ) -> BackendCallOutcome {
        let mut attempt: u32 = 0;

        loop {
            debug!(
                submission_id,
                operation = %operation,
                attempt = attempt + 1,
                has_image = request.image.is_some(),
                "Calling backend"
            );

            let error = match self.backend.generate_content(request).await {
                Ok(response) => {
                    let tokens =
                        TokenUsage::new(response.prompt_token_count, response.candidate_token_count);
                    let cost_usd = self.rates.cost_of(tokens);
                    self.record_usage(submission_id, operation, tokens, cost_usd);

                    info!(
                        submission_id,
                        operation = %operation,
                        attempts = attempt + 1,
                        input_tokens = tokens.input,
                        output_tokens = tokens.output,
                        cost_usd,
                        "Backend call succeeded"
                    );

                    return BackendCallOutcome {
                        operation,
                        succeeded: true,
                        text: Some(response.text),
                        tokens,
                        cost_usd,
                        attempts_used: attempt + 1,
                        error_class: None,
                        error_message: None,
                    };
                }
                Err(e) => e,
            };

            let class = error.class();
            let message = error.to_string();

            match self.policy.delay_for(class, attempt) {
                Some(delay) => {
                    warn!(
                        submission_id,
                        operation = %operation,
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_retries + 1,
                        error_class = %class,
                        retry_delay_secs = delay.as_secs_f64(),
                        error = %message,
                        "Backend call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    if class == ErrorClass::FatalAuth {
                        error!(
                            submission_id,
                            operation = %operation,
                            error = %message,
                            "Backend rejected credentials, not retrying"
                        );
                    } else {
                        error!(
                            submission_id,
                            operation = %operation,
                            attempts = attempt + 1,
                            error_class = %class,
                            error = %message,
                            "Backend call failed, max retries exhausted"
                        );
                    }

                    return BackendCallOutcome {
                        operation,
                        succeeded: false,
                        text: None,
                        tokens: TokenUsage::default(),
                        cost_usd: 0.0,
                        attempts_used: attempt + 1,
                        error_class: Some(class),
                        error_message: Some(message),
                    };
                }
            }
        }
    }

    fn record_usage(
        &self,
        submission_id: &str,
        operation: Operation,
        tokens: TokenUsage,
        cost_usd: f64,
    ) {
        let record = UsageRecord {
            submission_id: submission_id.to_string(),
            operation,
            input_tokens: tokens.input,
            output_tokens: tokens.output,
            cost_usd,
            recorded_at: Utc::now(),
        };

        // Accounting must never fail the call it accounts for
        if let Err(e) = self.usage.record_usage(&record) {
            warn!(submission_id, operation = %operation, error = %e, "Failed to record usage");
        }
    }
}
