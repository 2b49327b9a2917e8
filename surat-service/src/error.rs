use serde::Serialize;
use thiserror::Error;

use crate::backend::{ErrorClass, Operation};

/// Errors that abort a single document submission.
///
/// Everything else (summarization, field extraction, classification matching)
/// is recovered inside the pipeline and reported as a partial success.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Image is corrupt or in an unsupported format")]
    ImageCorrupt(#[source] PreprocessError),

    #[error("Image preprocessing failed")]
    PreprocessFailed(#[source] PreprocessError),

    #[error("Backend rejected credentials during {operation}: {message}")]
    BackendFatalAuth { operation: Operation, message: String },

    #[error("{operation} failed after {attempts} attempts ({class}): max retries exhausted")]
    RetriesExhausted {
        operation: Operation,
        class: ErrorClass,
        attempts: u32,
    },

    #[error("No text could be extracted from the document")]
    NoTextExtracted,
}

/// Failure of one remote backend attempt
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend api key not configured")]
    NotConfigured,

    #[error("Request to {url} hit a timeout")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Backend connection failed to {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response from backend")]
    InvalidResponse {
        #[source]
        source: serde_json::Error,
    },

    #[error("Backend response contained no candidates")]
    EmptyResponse,

    #[error("{message}")]
    Other { message: String },
}

/// Image decode / encode / write failures
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Failed to decode image")]
    Decode(#[source] image::ImageError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Failed to encode {artifact} artifact")]
    Encode {
        artifact: &'static str,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read PDF: {message}")]
    PdfUnreadable { message: String },

    #[error("Failed to render PDF page: {message}")]
    PdfRender { message: String },

    #[error("Preprocessing task did not complete: {message}")]
    Interrupted { message: String },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Failed to create database directory {path}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while wiring the service together (config, storage, reference data)
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Reference data error: {message}")]
    Reference { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<PreprocessError> for PipelineError {
    fn from(error: PreprocessError) -> Self {
        match error {
            PreprocessError::Decode(_) | PreprocessError::PdfUnreadable { .. } => {
                PipelineError::ImageCorrupt(error)
            }
            _ => PipelineError::PreprocessFailed(error),
        }
    }
}

impl PipelineError {
    /// Stable machine-readable code for the failure
    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::ImageCorrupt(_) => "image_corrupt",
            PipelineError::PreprocessFailed(_) => "preprocess_failed",
            PipelineError::BackendFatalAuth { .. } => "backend_fatal_auth",
            PipelineError::RetriesExhausted { class, .. } => match class {
                ErrorClass::RateLimited => "backend_rate_limited_retries_exhausted",
                ErrorClass::Transient => "backend_transient_retries_exhausted",
                ErrorClass::ServerError => "backend_server_error_retries_exhausted",
                ErrorClass::FatalAuth | ErrorClass::Unknown => "backend_retries_exhausted",
            },
            PipelineError::NoTextExtracted => "no_text_extracted",
        }
    }

    /// Convert to the serializable shape handed to callers
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

impl ServiceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Database(_) => "database_error",
            ServiceError::Backend(_) => "backend_error",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Reference { .. } => "reference_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

/// Error shape returned to callers (never a raw internal error)
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Result type alias for pipeline submissions
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type alias for service wiring operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_failure_maps_to_image_corrupt() {
        let decode = image::load_from_memory(b"definitely not an image").unwrap_err();
        let error: PipelineError = PreprocessError::Decode(decode).into();
        assert_eq!(error.error_code(), "image_corrupt");
    }

    #[test]
    fn test_write_failure_maps_to_preprocess_failed() {
        let error: PipelineError = PreprocessError::Write {
            path: "/nowhere/processed.jpg".to_string(),
            source: std::io::Error::other("disk full"),
        }
        .into();
        assert_eq!(error.error_code(), "preprocess_failed");
    }

    #[test]
    fn test_pdf_failures_map_by_cause() {
        let unreadable: PipelineError = PreprocessError::PdfUnreadable {
            message: "trailer missing".to_string(),
        }
        .into();
        assert_eq!(unreadable.error_code(), "image_corrupt");

        let renderer: PipelineError = PreprocessError::PdfRender {
            message: "library not found".to_string(),
        }
        .into();
        assert_eq!(renderer.error_code(), "preprocess_failed");
    }

    #[test]
    fn test_retries_exhausted_codes_carry_class() {
        let error = PipelineError::RetriesExhausted {
            operation: Operation::Transcribe,
            class: ErrorClass::RateLimited,
            attempts: 4,
        };
        assert_eq!(error.error_code(), "backend_rate_limited_retries_exhausted");
        assert!(error.to_string().contains("max retries exhausted"));
        assert!(error.to_string().contains("transcribe"));
    }
}
