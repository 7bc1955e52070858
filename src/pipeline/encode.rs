//! Upload encoding: raw photo bytes → base64 `ImageData` for the vision call.
//!
//! The photo is forwarded as-is. Re-encoding would only cost time and the
//! vision model accepts PNG and JPEG directly. `detail: "high"` asks
//! GPT-4-class models to tile the full image; faces and small features are
//! lost at the single-tile low-detail setting.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Wrap an uploaded photo for a multimodal chat message.
pub fn encode_upload(bytes: &[u8], mime: &str) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} byte upload → {} bytes base64", bytes.len(), b64.len());
    ImageData::new(b64, mime).with_detail("high")
}
