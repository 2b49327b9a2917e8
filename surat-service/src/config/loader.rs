//! Configuration loading from files and environment variables.

use config::{Config, Environment, File};

use super::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};

/// Environment variable consulted when no key is configured explicitly
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Load configuration from `{path}.*` (optional) and `SURAT__*` env vars
pub fn load_config(path: &str) -> ServiceResult<ServiceConfig> {
    let mut config: ServiceConfig = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("SURAT")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })?;

    if config.gemini.api_key.is_none() {
        config.gemini.api_key = std::env::var(API_KEY_ENV).ok();
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &ServiceConfig) -> ServiceResult<()> {
    if config.retry.initial_delay_secs > config.retry.max_delay_secs {
        return Err(ServiceError::Config {
            message: format!(
                "retry.initial_delay_secs ({}) exceeds retry.max_delay_secs ({})",
                config.retry.initial_delay_secs, config.retry.max_delay_secs
            ),
        });
    }

    if config.gemini.request_timeout_secs == 0 {
        return Err(ServiceError::Config {
            message: "gemini.request_timeout_secs must be positive".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ExtractionMode;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = load_config("/nonexistent/surat-config").unwrap();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.rate_limit_delay_secs, 60);
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.extraction.mode, ExtractionMode::Unified);
        assert!(!config.extraction.kode_matching_enabled);
        assert!(config.storage.database_path().ends_with("surat.db"));
    }

    #[test]
    fn test_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surat.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[extraction]\nmode = \"legacy\"\nkode_matching_enabled = true\n\n[retry]\nmax_retries = 5"
        )
        .unwrap();

        let base = dir.path().join("surat");
        let config = load_config(base.to_str().unwrap()).unwrap();
        assert_eq!(config.extraction.mode, ExtractionMode::Legacy);
        assert!(config.extraction.kode_matching_enabled);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_secs, 2);
    }

    #[test]
    fn test_rejects_inverted_delays() {
        let mut config = ServiceConfig::default();
        config.retry.initial_delay_secs = 64;
        assert!(validate(&config).is_err());
    }
}
