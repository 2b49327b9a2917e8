//! Backend usage accounting.

use rusqlite::params;

use super::Database;
use crate::error::{DatabaseError, ServiceResult};
use crate::usage::{UsageRecord, UsageSink};

impl Database {
    /// Append one usage record
    pub fn insert_usage(&self, record: &UsageRecord) -> ServiceResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO api_usage (surat_id, operation, input_tokens, output_tokens, estimated_cost_usd, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.submission_id,
                record.operation.as_ref(),
                record.input_tokens as i64,
                record.output_tokens as i64,
                record.cost_usd,
                record.recorded_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Estimated spend recorded since the start of the current UTC day
    pub fn daily_cost(&self) -> ServiceResult<f64> {
        let conn = self.conn()?;
        let day_start = chrono::Utc::now()
            .date_naive()
            .format("%Y-%m-%d")
            .to_string();

        let cost: f64 = conn
            .query_row(
                "SELECT COALESCE(SUM(estimated_cost_usd), 0) FROM api_usage WHERE created_at >= ?1",
                params![day_start],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;

        Ok(cost)
    }
}

impl UsageSink for Database {
    fn record_usage(&self, record: &UsageRecord) -> ServiceResult<()> {
        self.insert_usage(record)
    }
}
