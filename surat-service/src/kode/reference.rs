use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ServiceError, ServiceResult};

/// One classification code and its description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    #[serde(alias = "kode")]
    pub code: String,
    #[serde(alias = "keterangan", default)]
    pub description: String,
}

/// Primary store of reference entries
pub trait ReferenceSource: Send + Sync {
    fn load_reference_entries(&self) -> ServiceResult<Vec<ReferenceEntry>>;
}

/// Shared, lazily loaded reference table.
///
/// Loaded from the source on first use, falling back to a bundled CSV or JSON file,
/// then to an empty table. `reload` swaps in fresh entries for concurrent
/// readers after an import.
pub struct ReferenceTable {
    entries: ArcSwapOption<Vec<ReferenceEntry>>,
    source: Option<Arc<dyn ReferenceSource>>,
    fallback_file: Option<PathBuf>,
}

impl ReferenceTable {
    pub fn new(source: Option<Arc<dyn ReferenceSource>>, fallback_file: Option<PathBuf>) -> Self {
        Self {
            entries: ArcSwapOption::empty(),
            source,
            fallback_file,
        }
    }

    /// Table with fixed contents and nothing to reload from
    pub fn from_entries(entries: Vec<ReferenceEntry>) -> Self {
        Self {
            entries: ArcSwapOption::from_pointee(entries),
            source: None,
            fallback_file: None,
        }
    }

    /// Current entries, loading them on first access
    pub fn snapshot(&self) -> Arc<Vec<ReferenceEntry>> {
        if let Some(entries) = self.entries.load_full() {
            return entries;
        }

        let entries = Arc::new(self.load_entries());
        self.entries.store(Some(entries.clone()));
        entries
    }

    /// Re-read the sources and publish the result; returns the entry count
    pub fn reload(&self) -> usize {
        let entries = self.load_entries();
        let count = entries.len();
        self.entries.store(Some(Arc::new(entries)));
        info!(entries = count, "Reference table reloaded");
        count
    }

    fn load_entries(&self) -> Vec<ReferenceEntry> {
        if let Some(source) = &self.source {
            match source.load_reference_entries() {
                Ok(entries) if !entries.is_empty() => {
                    info!(entries = entries.len(), "Loaded reference table from database");
                    return entries;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to load reference table from database"),
            }
        }

        if let Some(path) = &self.fallback_file {
            match load_reference_file(path) {
                Ok(entries) => {
                    info!(
                        entries = entries.len(),
                        path = %path.display(),
                        "Loaded reference table from bundled file"
                    );
                    return entries;
                }
                Err(e) => warn!(error = %e, path = %path.display(), "Failed to load reference file"),
            }
        }

        warn!("No reference entries available, classification suggestions disabled");
        Vec::new()
    }
}

/// Read the bundled reference file.
///
/// `.csv` files need a header row with a `kode` column and optionally
/// `keterangan`; other columns are ignored. Anything else is read as a JSON
/// array of `{kode, keterangan}` records. Rows without a code are skipped.
pub fn load_reference_file(path: &Path) -> ServiceResult<Vec<ReferenceEntry>> {
    let content = std::fs::read_to_string(path).map_err(|e| ServiceError::Reference {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;

    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let parsed = if is_csv {
        parse_reference_csv(&content)
    } else {
        serde_json::from_str::<Vec<ReferenceEntry>>(&content).map_err(|e| e.to_string())
    };
    let entries = parsed.map_err(|message| ServiceError::Reference {
        message: format!("Failed to parse {}: {}", path.display(), message),
    })?;

    Ok(entries
        .into_iter()
        .filter(|entry| !entry.code.trim().is_empty())
        .collect())
}

fn parse_reference_csv(content: &str) -> Result<Vec<ReferenceEntry>, String> {
    let mut lines = content
        .trim_start_matches('\u{feff}')
        .lines()
        .filter(|line| !line.trim().is_empty());

    let header = split_csv_line(lines.next().ok_or("empty file")?);
    let column = |name: &str| {
        header
            .iter()
            .position(|cell| cell.trim().eq_ignore_ascii_case(name))
    };
    let code_col = column("kode").ok_or("missing kode column")?;
    let description_col = column("keterangan");

    Ok(lines
        .map(|line| {
            let cells = split_csv_line(line);
            let cell = |index: usize| cells.get(index).map(|c| c.trim().to_string());
            ReferenceEntry {
                code: cell(code_col).unwrap_or_default(),
                description: description_col.and_then(cell).unwrap_or_default(),
            }
        })
        .collect())
}

/// Split one record on commas; double-quoted cells may hold commas and `""`
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        entries: Vec<ReferenceEntry>,
        loads: AtomicUsize,
    }

    impl ReferenceSource for CountingSource {
        fn load_reference_entries(&self) -> ServiceResult<Vec<ReferenceEntry>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.entries.clone())
        }
    }

    struct BrokenSource;

    impl ReferenceSource for BrokenSource {
        fn load_reference_entries(&self) -> ServiceResult<Vec<ReferenceEntry>> {
            Err(ServiceError::Reference {
                message: "table missing".to_string(),
            })
        }
    }

    fn entry(code: &str, description: &str) -> ReferenceEntry {
        ReferenceEntry {
            code: code.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_loads_once_then_caches() {
        let source = Arc::new(CountingSource {
            entries: vec![entry("005", "Undangan")],
            loads: AtomicUsize::new(0),
        });
        let table = ReferenceTable::new(Some(source.clone()), None);

        assert_eq!(table.snapshot().len(), 1);
        assert_eq!(table.snapshot().len(), 1);
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);

        assert_eq!(table.reload(), 1);
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_falls_back_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("klasifikasi.json");
        std::fs::write(
            &path,
            r#"[{"kode": "900", "keterangan": "Keuangan"}, {"kode": " ", "keterangan": "kosong"}]"#,
        )
        .unwrap();

        let table = ReferenceTable::new(Some(Arc::new(BrokenSource)), Some(path));
        let entries = table.snapshot();

        assert_eq!(entries.as_slice(), &[entry("900", "Keuangan")]);
    }

    #[test]
    fn test_reads_csv_reference_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KODE_KLASIFIKASI.csv");
        std::fs::write(
            &path,
            "\u{feff}kode,indeks,keterangan\n\
             005,UND,Undangan\n\
             900,KEU,\"Keuangan, anggaran\"\n\
             ,X,tanpa kode\n\
             \n\
             800\n",
        )
        .unwrap();

        let entries = load_reference_file(&path).unwrap();

        assert_eq!(
            entries,
            vec![
                entry("005", "Undangan"),
                entry("900", "Keuangan, anggaran"),
                entry("800", ""),
            ]
        );
    }

    #[test]
    fn test_csv_without_kode_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.csv");
        std::fs::write(&path, "code,description\n005,Undangan\n").unwrap();

        let error = load_reference_file(&path).unwrap_err();
        assert!(error.to_string().contains("missing kode column"));
    }

    #[test]
    fn test_split_csv_line_handles_quotes() {
        assert_eq!(
            split_csv_line(r#"005,"Rapat ""Paripurna""",x"#),
            vec!["005", r#"Rapat "Paripurna""#, "x"]
        );
        assert_eq!(split_csv_line(""), vec![""]);
    }

    #[test]
    fn test_empty_when_nothing_available() {
        let table = ReferenceTable::new(None, Some(PathBuf::from("/nonexistent/ref.json")));
        assert!(table.snapshot().is_empty());
    }
}
