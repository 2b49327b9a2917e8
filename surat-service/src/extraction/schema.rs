use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing::warn;

/// Field that carries the free-text summary rather than a discrete value
pub const SUMMARY_FIELD: &str = "isi_ringkas";

/// Fields requested when the category is not recognised
pub const DEFAULT_FIELDS: &[&str] = &["nomor_surat", "tgl_surat", "isi_ringkas"];

const MASUK_BIASA_FIELDS: &[&str] = &[
    "nomor_urut",
    "index_surat",
    "kode",
    "tgl_surat",
    "isi_ringkas",
    "asal_surat",
    "nomor_surat",
    "lampiran",
    "pengolah",
    "tgl_diteruskan",
    "disposisi_ketua",
    "tgl_masuk",
    "tujuan",
    "tgl_surat_turun",
    "disposisi_sekwan",
];

const UNDANGAN_FIELDS: &[&str] = &[
    "nomor_urut",
    "index_surat",
    "kode",
    "tgl_surat_masuk",
    "tgl_penyelesaian",
    "isi_ringkas",
    "asal_surat",
    "nomor_surat",
    "lampiran",
    "keterangan",
    "tgl_masuk_surat",
    "diperuntukan",
    "tgl_surat_turun",
    "disposisi_sekwan",
];

const MASUK_PENTING_FIELDS: &[&str] = &[
    "nomor_urut",
    "index_surat",
    "kode",
    "tgl_surat_masuk",
    "isi_ringkas",
    "asal_surat",
    "nomor_surat",
    "lampiran",
    "pengolah",
    "tgl_diteruskan",
    "disposisi_ketua",
    "tgl_masuk",
    "tujuan",
    "tgl_surat_turun",
    "disposisi_sekwan",
];

const KELUAR_FIELDS: &[&str] = &[
    "nomor_urut",
    "index_surat",
    "kode",
    "isi_ringkas",
    "kepada",
    "pengolah",
    "tgl_surat",
    "lampiran",
    "catatan",
];

const RAHASIA_FIELDS: &[&str] = &[
    "nomor_urut",
    "index_surat",
    "kode",
    "tgl_terima_surat",
    "isi_ringkas",
    "asal_surat",
    "nomor_surat",
    "lampiran",
    "pengolah",
    "tgl_diteruskan",
    "catatan",
];

/// Known document categories
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    MasukBiasa,
    Undangan,
    MasukPenting,
    Keluar,
    KeluarSekwan,
    Rahasia,
}

impl Category {
    /// Ordered field list for this category
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Category::MasukBiasa => MASUK_BIASA_FIELDS,
            Category::Undangan => UNDANGAN_FIELDS,
            Category::MasukPenting => MASUK_PENTING_FIELDS,
            Category::Keluar | Category::KeluarSekwan => KELUAR_FIELDS,
            Category::Rahasia => RAHASIA_FIELDS,
        }
    }

    /// Human-readable name used in prompts
    pub fn label(self) -> &'static str {
        match self {
            Category::MasukBiasa => "surat masuk biasa",
            Category::Undangan => "surat undangan",
            Category::MasukPenting => "surat masuk penting",
            Category::Keluar => "surat keluar",
            Category::KeluarSekwan => "surat keluar sekretariat dewan",
            Category::Rahasia => "surat rahasia",
        }
    }

    /// Event-type letters get an event-oriented summary
    pub fn is_event(self) -> bool {
        matches!(self, Category::Undangan)
    }
}

/// Resolved category for one submission
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySchema {
    /// Identifier as supplied by the caller
    pub id: String,
    pub category: Option<Category>,
    pub fields: &'static [&'static str],
}

impl CategorySchema {
    /// Resolve a caller-supplied identifier. Unknown identifiers fall back to
    /// [`DEFAULT_FIELDS`] rather than failing.
    pub fn resolve(category_id: &str) -> Self {
        let normalized = category_id.trim().replace([' ', '-'], "_");

        match Category::from_str(&normalized) {
            Ok(category) => Self {
                id: category_id.to_string(),
                category: Some(category),
                fields: category.fields(),
            },
            Err(_) => {
                warn!(category = category_id, "Unknown category, using default fields");
                Self {
                    id: category_id.to_string(),
                    category: None,
                    fields: DEFAULT_FIELDS,
                }
            }
        }
    }

    pub fn is_event(&self) -> bool {
        self.category.is_some_and(Category::is_event)
    }

    pub fn label(&self) -> &'static str {
        self.category.map(Category::label).unwrap_or("surat")
    }

    /// Fields other than the summary field, in schema order
    pub fn data_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .copied()
            .filter(|field| *field != SUMMARY_FIELD)
            .collect()
    }
}

/// Date-typed fields are recognised by name
pub fn is_date_field(field: &str) -> bool {
    field.contains("tgl") || field.contains("tanggal")
}
