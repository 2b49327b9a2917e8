//! Service configuration.
//!
//! Loaded once at startup from an optional `config` file (any format the
//! `config` crate understands) overlaid with `SURAT__SECTION__KEY`
//! environment variables.

mod loader;

use serde::Deserialize;
use std::path::PathBuf;

use crate::pipeline::ExtractionMode;

pub use loader::load_config;

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// Storage locations
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Database file name, relative to `data_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Bundled classification reference (`.csv` with `kode`/`keterangan`
    /// columns, or a JSON array of `{kode, keterangan}`), used when the
    /// database table is empty or unreadable
    #[serde(default)]
    pub reference_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            reference_file: None,
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Root under which each submission gets its own artifact directory
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

/// Remote vision backend
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_input_cost")]
    pub input_cost_per_1m: f64,

    #[serde(default = "default_output_cost")]
    pub output_cost_per_1m: f64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_url(),
            api_key: None,
            model: default_gemini_model(),
            request_timeout_secs: default_request_timeout(),
            temperature: default_temperature(),
            input_cost_per_1m: default_input_cost(),
            output_cost_per_1m: default_output_cost(),
        }
    }
}

/// Backend retry schedule
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,

    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_secs: default_initial_delay(),
            max_delay_secs: default_max_delay(),
            rate_limit_delay_secs: default_rate_limit_delay(),
        }
    }
}

/// Extraction behaviour
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub mode: ExtractionMode,

    /// Suggest classification codes from the reference table
    #[serde(default)]
    pub kode_matching_enabled: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_database_file() -> String {
    "surat.db".to_string()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.2
}

fn default_input_cost() -> f64 {
    crate::backend::INPUT_COST_PER_1M
}

fn default_output_cost() -> f64 {
    crate::backend::OUTPUT_COST_PER_1M
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    2
}

fn default_max_delay() -> u64 {
    32
}

fn default_rate_limit_delay() -> u64 {
    60
}
