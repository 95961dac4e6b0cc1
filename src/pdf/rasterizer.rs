//! Pdfium-backed page rendering.
//!
//! Pdfium is not async-safe; callers run [`rasterize_document`] inside
//! `tokio::task::spawn_blocking`.

use std::env;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use pdfium_render::prelude::{PdfRenderConfig, Pdfium, PdfiumError};
use thiserror::Error;

use super::PageImage;

/// Errors emitted while rendering PDF pages to images.
#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("failed to load Pdfium runtime: {0}")]
    Library(#[from] PdfiumError),

    #[error("failed to load PDF document: {0}")]
    Document(#[source] PdfiumError),

    #[error("failed to render page {page_number}: {source}")]
    Render {
        page_number: u32,
        #[source]
        source: PdfiumError,
    },

    #[error("failed to encode page {page_number} as PNG: {source}")]
    Encode {
        page_number: u32,
        #[source]
        source: image::ImageError,
    },
}

/// Render every page of the document (up to `page_cap`, when set) to a PNG
/// image `render_width` pixels wide.
pub fn rasterize_document(
    path: &Path,
    render_width: u32,
    page_cap: Option<u32>,
) -> Result<Vec<PageImage>, RasterizeError> {
    let pdfium = load_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(RasterizeError::Document)?;

    let render_config = PdfRenderConfig::new().set_target_width(render_width as i32);

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let page_number = index as u32 + 1;
        if let Some(cap) = page_cap {
            if page_number > cap {
                break;
            }
        }

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|source| RasterizeError::Render {
                page_number,
                source,
            })?;
        let image = bitmap.as_image();

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|source| RasterizeError::Encode {
                page_number,
                source,
            })?;

        pages.push(PageImage { page_number, png });
    }

    Ok(pages)
}

fn load_pdfium() -> Result<Pdfium, PdfiumError> {
    if let Some(value) = env::var_os("PDFIUM_LIBRARY_PATH") {
        let path = PathBuf::from(&value);
        let lib_path = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path
        };
        return Pdfium::bind_to_library(lib_path).map(Pdfium::new);
    }

    match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")) {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(primary_err) => match Pdfium::bind_to_system_library() {
            Ok(bindings) => Ok(Pdfium::new(bindings)),
            Err(_) => Err(primary_err),
        },
    }
}
