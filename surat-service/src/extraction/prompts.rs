//! Backend operations and the prompts that drive them.
//!
//! Prompts are written in Indonesian to match the documents.

use super::schema::{CategorySchema, SUMMARY_FIELD};
use super::truncate_chars;
use crate::backend::{BackendCallOutcome, BackendClient, GenerateRequest, Operation};

/// Characters of transcribed text included in text-only prompts
pub const PROMPT_TEXT_LIMIT: usize = 4000;

const TRANSCRIBE_PROMPT: &str = "Baca seluruh teks pada gambar dokumen ini.\n\
Tuliskan teks persis seperti yang tertulis, pertahankan urutan baris dan paragraf.\n\
Jangan menambahkan komentar, ringkasan, atau format markdown.";

const EVENT_SUMMARY_RULE: &str = "- isi_ringkas: tulis dengan pola \"[nama kegiatan] pada [tanggal] di [tempat]\",\n  \
misalnya \"Rapat Koordinasi pada 28 Januari 2026 di Ruang Rapat DPRD\".\n  \
Bila jadwal tidak lengkap, cukup tuliskan nama kegiatannya.";

const SUBJECT_SUMMARY_RULE: &str = "- isi_ringkas: utamakan isi baris \"Hal:\" atau \"Perihal:\" bila ada.\n  \
Bila tidak ada, tulis ringkasan paling banyak 100 karakter,\n  \
misalnya \"Permohonan Revisi DPA Tahun 2026\".";

/// One logical backend operation with its inputs
#[derive(Debug, Clone, Copy)]
pub enum ExtractionCall<'a> {
    /// Transcribe all text from the page image
    Transcribe { image: &'a [u8] },
    /// Summarize transcribed text for a category
    Summarize {
        text: &'a str,
        schema: &'a CategorySchema,
    },
    /// Extract named fields from transcribed text as JSON
    ExtractFields {
        text: &'a str,
        fields: &'a [&'static str],
    },
    /// Transcribe, summarize and extract in a single image call
    UnifiedExtract {
        image: &'a [u8],
        schema: &'a CategorySchema,
    },
}

impl<'a> ExtractionCall<'a> {
    pub fn operation(&self) -> Operation {
        match self {
            ExtractionCall::Transcribe { .. } => Operation::Transcribe,
            ExtractionCall::Summarize { .. } => Operation::Summarize,
            ExtractionCall::ExtractFields { .. } => Operation::ExtractFields,
            ExtractionCall::UnifiedExtract { .. } => Operation::UnifiedExtract,
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            ExtractionCall::Transcribe { .. } => TRANSCRIBE_PROMPT.to_string(),
            ExtractionCall::Summarize { text, schema } => summarize_prompt(text, schema),
            ExtractionCall::ExtractFields { text, fields } => extract_fields_prompt(text, fields),
            ExtractionCall::UnifiedExtract { schema, .. } => unified_prompt(schema),
        }
    }

    pub fn request(&self) -> GenerateRequest<'a> {
        let image = match *self {
            ExtractionCall::Transcribe { image } | ExtractionCall::UnifiedExtract { image, .. } => {
                Some(image)
            }
            ExtractionCall::Summarize { .. } | ExtractionCall::ExtractFields { .. } => None,
        };

        GenerateRequest {
            prompt: self.prompt(),
            image,
        }
    }

    /// Run this operation through the retrying client
    pub async fn send(&self, client: &BackendClient, submission_id: &str) -> BackendCallOutcome {
        client
            .execute(submission_id, self.operation(), &self.request())
            .await
    }
}

fn summarize_prompt(text: &str, schema: &CategorySchema) -> String {
    let focus = if schema.is_event() {
        "Sebutkan nama kegiatan, tanggal, dan tempatnya bila ada."
    } else {
        "Utamakan isi baris Hal atau Perihal bila ada."
    };

    format!(
        "Ringkas {label} berikut dalam satu atau dua kalimat pendek.\n\
         {focus}\n\n\
         Teks dokumen:\n{text}\n\n\
         Ringkasan (Bahasa Indonesia, paling banyak 200 karakter):",
        label = schema.label(),
        text = truncate_chars(text, PROMPT_TEXT_LIMIT),
    )
}

fn extract_fields_prompt(text: &str, fields: &[&str]) -> String {
    format!(
        "Ambil nilai field berikut dari teks dokumen: {fields}\n\n\
         Teks dokumen:\n{text}\n\n\
         Jawab dalam format JSON dengan nama field sebagai key.\n\
         Gunakan null untuk field yang tidak ditemukan.\n\
         Tulis tanggal dengan format YYYY-MM-DD bila memungkinkan.\n\n\
         Contoh:\n\
         {{\"nomor_surat\": \"001/2026\", \"asal_surat\": \"Dinas ABC\", \"tgl_surat\": \"2026-01-28\"}}\n\n\
         JSON:",
        fields = fields.join(", "),
        text = truncate_chars(text, PROMPT_TEXT_LIMIT),
    )
}

fn unified_prompt(schema: &CategorySchema) -> String {
    let summary_rule = if schema.is_event() {
        EVENT_SUMMARY_RULE
    } else {
        SUBJECT_SUMMARY_RULE
    };

    let data_fields = schema.data_fields();
    let template = std::iter::once("\"raw_text\": \"seluruh teks dokumen\"".to_string())
        .chain(std::iter::once(format!(
            "\"{SUMMARY_FIELD}\": \"ringkasan sesuai aturan\""
        )))
        .chain(
            data_fields
                .iter()
                .map(|field| format!("\"{field}\": \"nilai atau null\"")),
        )
        .collect::<Vec<_>>()
        .join(",\n    ");

    format!(
        "Analisis {label} pada gambar ini dan jawab HANYA dengan JSON.\n\n\
         TUGAS:\n\
         1. Salin seluruh teks dari gambar\n\
         2. Buat isi ringkas sesuai aturan\n\
         3. Ambil field berikut: {fields}\n\n\
         FORMAT:\n{{\n    {template}\n}}\n\n\
         ATURAN:\n\
         - raw_text: salin semua teks persis seperti yang terlihat\n\
         {summary_rule}\n\
         - Tulis tanggal dengan format YYYY-MM-DD\n\
         - Gunakan null untuk field yang tidak ditemukan\n\
         - Jangan menambahkan penjelasan di luar JSON",
        label = schema.label(),
        fields = schema.fields.join(", "),
    )
}
