//! Image encoding: rendered page PNG → base64 `ImageData` for a vision model.
//!
//! The rasteriser already wrote a lossless PNG, so the bytes are forwarded
//! as-is rather than decoded and re-encoded. `detail: "high"` asks
//! GPT-4-class models to tile the full image; without it small print is lost.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::path::Path;
use tracing::debug;

/// Wrap raw PNG bytes for the multimodal request body.
pub fn encode_png(bytes: &[u8]) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, "image/png").with_detail("high")
}

/// Read a rendered page from disk and encode it.
pub async fn encode_page_file(path: &Path) -> std::io::Result<ImageData> {
    let bytes = tokio::fs::read(path).await?;
    Ok(encode_png(&bytes))
}
