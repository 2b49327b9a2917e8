use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::Operation;
use crate::error::ServiceResult;

/// Input/output token counts reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input += other.input;
        self.output += other.output;
    }
}

/// One successful backend call, attributed to a submission
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub submission_id: String,
    pub operation: Operation,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Destination for per-call usage records
pub trait UsageSink: Send + Sync {
    fn record_usage(&self, record: &UsageRecord) -> ServiceResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_accumulates() {
        let mut total = TokenUsage::default();
        total += TokenUsage::new(1200, 300);
        total += TokenUsage::new(800, 200);
        assert_eq!(total, TokenUsage::new(2000, 500));
        assert_eq!(total.total(), 2500);
    }
}
