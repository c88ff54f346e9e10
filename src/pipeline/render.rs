//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is CPU-bound. `tokio::task::spawn_blocking` moves the work onto
//! the blocking pool so worker threads keep serving other batches.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 300 DPI would produce a
//! 10,000 × 14,000 px image. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded.

use crate::error::OcrError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming a directory (or file) holding the pdfium library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Converts a paged document into one image per page, in page order.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, path: &Path) -> Result<Vec<DynamicImage>, OcrError>;
}

/// [`Rasterizer`] backed by a dynamically loaded pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_rendered_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(max_rendered_pixels: u32) -> Self {
        Self {
            max_rendered_pixels,
        }
    }
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self::new(2000)
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(&self, path: &Path) -> Result<Vec<DynamicImage>, OcrError> {
        let path = path.to_path_buf();
        let max_pixels = self.max_rendered_pixels;

        tokio::task::spawn_blocking(move || render_all_blocking(&path, max_pixels))
            .await
            .map_err(|e| OcrError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Bind pdfium from `$PDFIUM_LIB_PATH`, the working directory, or the system.
fn bind_pdfium() -> Result<Pdfium, OcrError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(dir) if !dir.is_empty() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
                .or_else(|_| Pdfium::bind_to_library(&dir))
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| OcrError::RasterizerUnavailable(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn render_all_blocking(pdf_path: &Path, max_pixels: u32) -> Result<Vec<DynamicImage>, OcrError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| OcrError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            OcrError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}
