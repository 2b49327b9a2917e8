//! Classification reference reads.

use super::Database;
use crate::error::{DatabaseError, ServiceResult};
use crate::kode::{ReferenceEntry, ReferenceSource};

impl Database {
    /// All classification entries, ordered by code
    pub fn list_reference_entries(&self) -> ServiceResult<Vec<ReferenceEntry>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT kode, COALESCE(keterangan, '') FROM ref_klasifikasi \
                 WHERE TRIM(kode) <> '' ORDER BY kode",
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ReferenceEntry {
                    code: row.get(0)?,
                    description: row.get(1)?,
                })
            })
            .map_err(DatabaseError::Query)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(entries)
    }
}

impl ReferenceSource for Database {
    fn load_reference_entries(&self) -> ServiceResult<Vec<ReferenceEntry>> {
        self.list_reference_entries()
    }
}
