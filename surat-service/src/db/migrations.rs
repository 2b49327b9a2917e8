//! Database schema migrations.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Bring the schema up to date. Safe to run on every open.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        -- Classification reference (maintained by the import tooling)
        CREATE TABLE IF NOT EXISTS ref_klasifikasi (
            kode TEXT PRIMARY KEY,
            indeks TEXT,
            keterangan TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per successful backend call
        CREATE TABLE IF NOT EXISTS api_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            surat_id TEXT NOT NULL,
            operation TEXT NOT NULL,
            input_tokens INTEGER NOT NULL DEFAULT 0,
            output_tokens INTEGER NOT NULL DEFAULT 0,
            estimated_cost_usd REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_api_usage_surat ON api_usage(surat_id);
        CREATE INDEX IF NOT EXISTS idx_api_usage_created ON api_usage(created_at);
        "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: format!("Failed to create schema: {}", e),
    })?;

    Ok(())
}
