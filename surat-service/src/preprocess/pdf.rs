//! First-page rendering for PDF uploads.

use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::PreprocessError;

/// Resolution the first page is rendered at, matching a typical office scan
pub const PDF_RENDER_DPI: f32 = 200.0;

/// True when the upload carries the PDF header
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Bind PDFium from the working directory, `vendor/pdfium/lib/`, then the
/// system library path.
fn create_pdfium() -> Result<Pdfium, PreprocessError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "./vendor/pdfium/lib/",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| PreprocessError::PdfRender {
            message: format!("PDFium library not available: {:?}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Render page one of a PDF upload; later pages are ignored.
pub fn render_first_page(bytes: &[u8]) -> Result<DynamicImage, PreprocessError> {
    let pdfium = create_pdfium()?;

    let document =
        pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| PreprocessError::PdfUnreadable {
                message: e.to_string(),
            })?;

    let pages = document.pages();
    let page_count = pages.len();
    let page = pages.get(0).map_err(|e| PreprocessError::PdfUnreadable {
        message: format!("no first page: {}", e),
    })?;

    // Points are 1/72 inch
    let width = (page.width().value * PDF_RENDER_DPI / 72.0).round() as i32;
    let height = (page.height().value * PDF_RENDER_DPI / 72.0).round() as i32;

    debug!(page_count, width, height, "Rendering first PDF page");

    let config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_target_height(height);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| PreprocessError::PdfRender {
            message: e.to_string(),
        })?;

    Ok(bitmap.as_image())
}
