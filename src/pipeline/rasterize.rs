//! PDF rasterisation: render selected pages to PNG files in a scratch dir.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations, preventing the Tokio worker
//! threads from stalling during CPU-heavy rendering.
//!
//! Rasterisation is one unit: if any selected page fails to render the whole
//! call fails and no recognition is attempted.

use crate::config::PageSelection;
use crate::error::ConvertError;
use async_trait::async_trait;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Turns one source document into an ordered sequence of page images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render the selected pages of `source` into `output_dir`.
    ///
    /// Returned paths are in page order; that order determines the line
    /// order of the reassembled document. Failures are
    /// [`ConvertError::RasterizationFailed`].
    async fn rasterize(
        &self,
        source: &Path,
        output_dir: &Path,
        pages: &PageSelection,
    ) -> Result<Vec<PathBuf>, ConvertError>;
}

/// File name of the rendered image for a 0-based page index.
pub fn page_file_name(index: usize) -> String {
    format!("page-{:04}.png", index + 1)
}

/// Default rasteriser backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_pixels: u32,
    password: Option<String>,
}

impl PdfiumRasterizer {
    pub fn new(max_pixels: u32, password: Option<String>) -> Self {
        Self {
            max_pixels,
            password,
        }
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        source: &Path,
        output_dir: &Path,
        pages: &PageSelection,
    ) -> Result<Vec<PathBuf>, ConvertError> {
        let path = source.to_path_buf();
        let out = output_dir.to_path_buf();
        let selection = pages.clone();
        let max_pixels = self.max_pixels;
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || {
            render_pages_blocking(&path, &out, max_pixels, password.as_deref(), &selection)
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    output_dir: &Path,
    max_pixels: u32,
    password: Option<&str>,
    selection: &PageSelection,
) -> Result<Vec<PathBuf>, ConvertError> {
    let failed = |detail: String| ConvertError::RasterizationFailed {
        path: pdf_path.to_path_buf(),
        detail,
    };

    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                failed("document is encrypted; supply the correct password".to_string())
            } else {
                failed(err_str)
            }
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let indices = selection.to_indices(total_pages);
    if indices.is_empty() {
        return Err(failed(format!(
            "page selection {:?} matches none of {} pages",
            selection, total_pages
        )));
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(indices.len());

    for idx in indices {
        let page = pages
            .get(idx as u16)
            .map_err(|e| failed(format!("page {}: {:?}", idx + 1, e)))?;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| failed(format!("page {}: {:?}", idx + 1, e)))?;

        let image = bitmap.as_image();
        let target = output_dir.join(page_file_name(idx));
        image
            .save_with_format(&target, ImageFormat::Png)
            .map_err(|e| failed(format!("page {}: saving image: {}", idx + 1, e)))?;

        debug!(
            "Rendered page {} → {}x{} px at {}",
            idx + 1,
            image.width(),
            image.height(),
            target.display()
        );

        results.push(target);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_file_names_sort_in_page_order() {
        let mut names: Vec<String> = [10, 1, 0, 9].iter().map(|&i| page_file_name(i)).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["page-0001.png", "page-0002.png", "page-0010.png", "page-0011.png"]
        );
    }
}
