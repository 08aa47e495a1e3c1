//! Preview encoding: raw image bytes → base64 data URI.
//!
//! The presentation layer renders the photo the user just picked before the
//! OCR service has answered. A data URI is self-contained, so the preview
//! never needs the original file again and nothing is written to disk.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Cursor;
use tracing::debug;

/// A locally renderable form of the selected photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    /// `data:<content-type>;base64,<payload>`
    pub data_uri: String,
    /// Pixel dimensions, when the format is one we can decode headers for.
    pub dimensions: Option<(u32, u32)>,
}

/// Build the preview for `bytes` declared as `content_type`.
pub fn encode_preview(bytes: &[u8], content_type: &str) -> Preview {
    let data_uri = to_data_uri(bytes, content_type);
    let dimensions = probe_dimensions(bytes);
    debug!(
        "Encoded preview → {} bytes data URI, dimensions {:?}",
        data_uri.len(),
        dimensions
    );
    Preview {
        data_uri,
        dimensions,
    }
}

/// Wrap `bytes` in a base64 data URI.
pub fn to_data_uri(bytes: &[u8], content_type: &str) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}

/// Read width/height from the image header without decoding pixels.
///
/// Returns `None` for formats outside the enabled decoders (HEIC photos from
/// phones, for instance); the service may still be able to read them.
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
