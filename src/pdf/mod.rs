//! PDF page rasterization.

pub mod rasterizer;

pub use rasterizer::{rasterize_document, RasterizeError};

/// One rasterized source page, PNG-encoded.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based source page number.
    pub page_number: u32,
    pub png: Vec<u8>,
}

impl PageImage {
    /// Base64 `data:` URL for multimodal API request bodies.
    pub fn to_data_url(&self) -> String {
        use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
        use base64::Engine;

        format!(
            "data:image/png;base64,{}",
            BASE64_STANDARD.encode(&self.png)
        )
    }
}
