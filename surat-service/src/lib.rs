//! Extraction pipeline for scanned letters (surat).
//!
//! A scanned page plus its declared category goes in; a confidence-scored
//! record (raw text, summary, category fields, optional classification codes)
//! comes out. The remote vision backend is unreliable and metered, so every
//! path that can degrade does so locally instead of failing the submission.

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod kode;
pub mod pipeline;
pub mod preprocess;
pub mod usage;

pub use backend::calculate_cost;
pub use error::{PipelineError, PipelineResult, ServiceError, ServiceResult};
pub use pipeline::{ExtractionMode, ExtractionResult, Pipeline};
