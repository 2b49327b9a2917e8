//! Scan normalization.
//!
//! Produces two JPEG artifacts from an uploaded page: an archival copy
//! (grayscale, contrast-equalized, denoised, upscaled when the scan is low
//! resolution) and a smaller transmission copy for the backend. PDF uploads
//! contribute their first page only.

mod clahe;
mod pdf;
mod resize;

use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageEncoder};
use tracing::{debug, info};

use crate::error::PreprocessError;

pub use pdf::is_pdf;
pub use resize::{
    MAX_DIMENSION, MIN_DPI, TARGET_DPI, TRANSMISSION_MAX_EDGE, estimate_dpi,
    transmission_dimensions, upscaled_dimensions,
};

/// Archival artifact file name within the submission directory
pub const ARCHIVAL_FILE: &str = "processed.jpg";

/// Transmission artifact file name within the submission directory
pub const TRANSMISSION_FILE: &str = "processed_transmission.jpg";

/// Uploads larger than this are rejected before decoding
pub const MAX_INPUT_BYTES: usize = 50 * 1024 * 1024;

const ARCHIVAL_QUALITY: u8 = 95;
const TRANSMISSION_QUALITY: u8 = 85;

const CLAHE_TILES: u32 = 8;
const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// Median window radius for denoising (3x3)
const DENOISE_RADIUS: u32 = 1;

/// Both artifacts of one normalized page
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub archival: Vec<u8>,
    pub transmission: Vec<u8>,
    pub archival_path: PathBuf,
    pub transmission_path: PathBuf,
    pub original_dimensions: (u32, u32),
    pub archival_dimensions: (u32, u32),
    pub transmission_dimensions: (u32, u32),
    pub estimated_dpi: u32,
    pub was_upscaled: bool,
}

/// Grayscale, equalize, denoise and resize uploaded scans
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageNormalizer;

impl ImageNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize `bytes` and write both artifacts into `output_dir`.
    ///
    /// On failure no artifact is left behind.
    pub fn normalize(
        &self,
        bytes: &[u8],
        output_dir: &Path,
    ) -> Result<NormalizedImage, PreprocessError> {
        validate_input(bytes)?;

        let decoded = decode_upload(bytes)?;
        let original_dimensions = (decoded.width(), decoded.height());
        let estimated_dpi = estimate_dpi(decoded.width(), decoded.height());

        let gray = decoded.to_luma8();
        let equalized = clahe::equalize(&gray, CLAHE_TILES, CLAHE_TILES, CLAHE_CLIP_LIMIT);
        let denoised = imageproc::filter::median_filter(&equalized, DENOISE_RADIUS, DENOISE_RADIUS);

        let (archival_image, was_upscaled) =
            match upscaled_dimensions(denoised.width(), denoised.height(), estimated_dpi) {
                Some((width, height)) => {
                    debug!(
                        from_width = denoised.width(),
                        from_height = denoised.height(),
                        to_width = width,
                        to_height = height,
                        estimated_dpi,
                        "Upscaling low resolution scan"
                    );
                    (
                        imageops::resize(&denoised, width, height, FilterType::CatmullRom),
                        true,
                    )
                }
                None => (denoised, false),
            };

        let (tx_width, tx_height) =
            transmission_dimensions(archival_image.width(), archival_image.height());
        let transmission_image = if (tx_width, tx_height) == archival_image.dimensions() {
            archival_image.clone()
        } else {
            // Triangle widens its support when shrinking, averaging the source area
            imageops::resize(&archival_image, tx_width, tx_height, FilterType::Triangle)
        };

        let archival = encode_jpeg(&archival_image, ARCHIVAL_QUALITY, "archival")?;
        let transmission = encode_jpeg(&transmission_image, TRANSMISSION_QUALITY, "transmission")?;

        fs::create_dir_all(output_dir).map_err(|e| PreprocessError::Write {
            path: output_dir.display().to_string(),
            source: e,
        })?;

        let archival_path = output_dir.join(ARCHIVAL_FILE);
        let transmission_path = output_dir.join(TRANSMISSION_FILE);

        write_artifact(&archival_path, &archival)?;
        if let Err(e) = write_artifact(&transmission_path, &transmission) {
            let _ = fs::remove_file(&archival_path);
            return Err(e);
        }

        info!(
            original_width = original_dimensions.0,
            original_height = original_dimensions.1,
            estimated_dpi,
            was_upscaled,
            archival_bytes = archival.len(),
            transmission_bytes = transmission.len(),
            "Scan normalized"
        );

        Ok(NormalizedImage {
            archival,
            transmission,
            archival_path,
            transmission_path,
            original_dimensions,
            archival_dimensions: archival_image.dimensions(),
            transmission_dimensions: transmission_image.dimensions(),
            estimated_dpi,
            was_upscaled,
        })
    }
}

fn validate_input(bytes: &[u8]) -> Result<(), PreprocessError> {
    if bytes.is_empty() {
        return Err(PreprocessError::InvalidInput {
            message: "upload is empty".to_string(),
        });
    }

    if bytes.len() > MAX_INPUT_BYTES {
        return Err(PreprocessError::InvalidInput {
            message: format!(
                "upload is {} bytes, limit is {} bytes",
                bytes.len(),
                MAX_INPUT_BYTES
            ),
        });
    }

    Ok(())
}

fn decode_upload(bytes: &[u8]) -> Result<DynamicImage, PreprocessError> {
    if is_pdf(bytes) {
        return pdf::render_first_page(bytes);
    }
    image::load_from_memory(bytes).map_err(PreprocessError::Decode)
}

fn encode_jpeg(
    image: &GrayImage,
    quality: u8,
    artifact: &'static str,
) -> Result<Vec<u8>, PreprocessError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::L8,
        )
        .map_err(|e| PreprocessError::Encode {
            artifact,
            source: e,
        })?;
    Ok(buffer)
}

fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), PreprocessError> {
    fs::write(path, bytes).map_err(|e| PreprocessError::Write {
        path: path.display().to_string(),
        source: e,
    })
}
