//! Local, deterministic field extraction from raw text.
//!
//! Each field has an ordered list of label patterns; the first capture wins.
//! Used when the backend cannot produce fields, so confidences stay below
//! anything the backend path reports.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use super::FieldResult;
use super::dates::normalize_date;
use super::schema::is_date_field;

/// Confidence of a pattern-matched value
pub const PATTERN_CONFIDENCE: f64 = 0.55;

/// Confidence of a date-field match that normalized cleanly
pub const NORMALIZED_DATE_CONFIDENCE: f64 = 0.60;

/// Confidence of a date-field match that did not normalize
pub const UNNORMALIZED_DATE_CONFIDENCE: f64 = 0.45;

/// Optional `.` or `:` between a label and its value, staying on one line
const SEP: &str = r"[ \t]*[.:]?[ \t]*";

/// Day, month (numeric or named), year
const DATE: &str = r"(\d{1,2}[ \t\-/]\w+[ \t\-/]\d{2,4})";

const MONTHS: &str = "januari|februari|pebruari|maret|april|mei|juni|juli|agustus|september|\
                      oktober|nopember|november|desember|january|february|march|may|june|\
                      july|august|october|december";

const RULES: &[(&str, &[&str])] = &[
    (
        "nomor_urut",
        &[r"\bno(?:mor)?\.?[ \t]*urut{SEP}(\d+)", r"^[ \t]*(\d+)[.,)][ \t]"],
    ),
    (
        "index_surat",
        &[
            r"\b(?:index|indeks)(?:[ \t]*surat)?{SEP}([^\n,;]+)",
            r"\bjenis[ \t]*surat{SEP}([^\n,;]+)",
        ],
    ),
    (
        "kode",
        &[
            r"\b(?:kode|klasifikasi){SEP}(\d{3}(?:\.\d+)*)",
            r"\b(?:kode|klasifikasi){SEP}([A-Za-z0-9][A-Za-z0-9.\-]*)",
        ],
    ),
    (
        "nomor_surat",
        &[
            r"\b(?:nomor[ \t]*surat|no(?:mor)?)\b\.?{SEP}([A-Za-z0-9./\-]*\d[A-Za-z0-9./\-]*)",
            r"\b([A-Za-z0-9]+/[A-Za-z0-9.\-]+/[A-Za-z0-9/.\-]+)",
        ],
    ),
    (
        "tgl_surat",
        &[
            r"\b(?:tanggal|tgl)(?:[ \t]*surat)?\.?{SEP}{DATE}",
            r"\b(\d{1,2}[ \t]+(?:{MONTHS})[ \t]+\d{4})\b",
            r"\b(\d{1,2}/\d{1,2}/\d{2,4})\b",
            r"\b(\d{4}-\d{2}-\d{2})\b",
        ],
    ),
    (
        "tgl_surat_masuk",
        &[
            r"\b(?:tanggal|tgl)\.?[ \t]*(?:surat[ \t]*)?(?:masuk|diterima|terima){SEP}{DATE}",
            r"\bditerima[ \t]+(?:tanggal|tgl)\.?{SEP}{DATE}",
            r"\b(\d{1,2}[ \t]+(?:{MONTHS})[ \t]+\d{4})\b",
        ],
    ),
    (
        "tgl_masuk",
        &[r"\b(?:tanggal|tgl)\.?[ \t]*masuk{SEP}{DATE}"],
    ),
    (
        "tgl_masuk_surat",
        &[
            r"\b(?:tanggal|tgl)\.?[ \t]*masuk[ \t]*surat{SEP}{DATE}",
            r"\b(?:tanggal|tgl)\.?[ \t]*masuk{SEP}{DATE}",
        ],
    ),
    (
        "tgl_terima_surat",
        &[
            r"\b(?:tanggal|tgl)\.?[ \t]*(?:terima|diterima)(?:[ \t]*surat)?{SEP}{DATE}",
            r"\bditerima(?:[ \t]+(?:tanggal|tgl)\.?)?{SEP}{DATE}",
        ],
    ),
    (
        "tgl_diteruskan",
        &[
            r"\b(?:tanggal|tgl)\.?[ \t]*(?:diteruskan|teruskan){SEP}{DATE}",
            r"\bditeruskan(?:[ \t]+(?:tanggal|tgl)\.?)?{SEP}{DATE}",
        ],
    ),
    (
        "tgl_surat_turun",
        &[r"\b(?:tanggal|tgl)\.?[ \t]*(?:surat[ \t]*)?turun{SEP}{DATE}"],
    ),
    (
        "tgl_penyelesaian",
        &[
            r"\b(?:tanggal|tgl)\.?[ \t]*(?:penyelesaian|selesai){SEP}{DATE}",
            r"\bbatas[ \t]*waktu{SEP}{DATE}",
        ],
    ),
    (
        "asal_surat",
        &[
            r"\b(?:asal[ \t]*surat|pengirim|dari|from|asal)\b{SEP}([^\n]+)",
            r"\b(?:kepala|direktur|ketua)[ \t]+([^\n,]+)",
        ],
    ),
    (
        "kepada",
        &[r"\b(?:kepada[ \t]+yth|kepada|yth|to)\b\.?{SEP}([^\n]+)"],
    ),
    (
        "tujuan",
        &[r"\b(?:tujuan|ditujukan(?:[ \t]+kepada)?){SEP}([^\n]+)"],
    ),
    (
        "diperuntukan",
        &[
            r"\b(?:diperuntukan|diperuntukkan){SEP}([^\n]+)",
            r"\b(?:untuk|bagi)\b{SEP}([^\n]+)",
        ],
    ),
    (
        "pengolah",
        &[r"\b(?:pengolah|diolah(?:[ \t]+oleh)?|bagian|bag)\b\.?{SEP}([^\n]+)"],
    ),
    (
        "lampiran",
        &[r"\b(?:lampiran|lamp)\b\.?{SEP}(\d+|[^\n]+)"],
    ),
    (
        "isi_ringkas",
        &[r"\b(?:isi[ \t]*ringkas|perihal|hal|subject)\b{SEP}([^\n]+)"],
    ),
    (
        "disposisi_ketua",
        &[
            r"\bdisposisi[ \t]*ketua{SEP}([^\n]+)",
            r"\bketua\b[^\n]*?:[ \t]*([^\n]+)",
        ],
    ),
    (
        "disposisi_sekwan",
        &[
            r"\bdisposisi[ \t]*(?:sekwan|sekretaris(?:[ \t]+dewan)?){SEP}([^\n]+)",
            r"\bsekwan\b[^\n]*?:[ \t]*([^\n]+)",
        ],
    ),
    (
        "catatan",
        &[r"\b(?:catatan|note)\b{SEP}([^\n]+)"],
    ),
    (
        "keterangan",
        &[r"\b(?:keterangan|ket)\b\.?{SEP}([^\n]+)"],
    ),
];

/// Compiled rules, case-insensitive and line-anchored
static COMPILED: LazyLock<HashMap<&'static str, Vec<Regex>>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|(field, patterns)| {
            let compiled = patterns
                .iter()
                .map(|pattern| {
                    let expanded = pattern
                        .replace("{SEP}", SEP)
                        .replace("{DATE}", DATE)
                        .replace("{MONTHS}", MONTHS);
                    Regex::new(&format!("(?im){expanded}")).unwrap()
                })
                .collect();
            (*field, compiled)
        })
        .collect()
});

/// Extract one field from raw text
pub fn extract_field(text: &str, field: &str) -> FieldResult {
    let Some(rules) = COMPILED.get(field) else {
        return FieldResult::missing();
    };

    let Some(value) = rules.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|value| !value.is_empty())
    }) else {
        return FieldResult::missing();
    };

    if is_date_field(field) {
        match normalize_date(value) {
            Some(iso) => FieldResult::found(iso, NORMALIZED_DATE_CONFIDENCE),
            None => FieldResult::found(value, UNNORMALIZED_DATE_CONFIDENCE),
        }
    } else {
        FieldResult::found(value, PATTERN_CONFIDENCE)
    }
}

/// Extract every requested field; unmatched fields are present but missing
pub fn extract_fields(text: &str, fields: &[&str]) -> BTreeMap<String, FieldResult> {
    fields
        .iter()
        .map(|field| ((*field).to_string(), extract_field(text, field)))
        .collect()
}
