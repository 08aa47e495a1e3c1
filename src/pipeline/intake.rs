//! Image intake: turn a user-selected file into a [`SourceImage`].
//!
//! The selected file must report an image media type. The resulting
//! [`SourceImage`] owns the bytes for the rest of the attempt and is kept by
//! the session so that a retry re-sends the same photo without asking the
//! user to pick it again. Nothing is written to disk.

use crate::error::{InvalidInputKind, ScanError};
use crate::pipeline::encode::{self, Preview};
use mime_guess::mime::{self, Mime};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// What the user handed us: a file on disk (camera roll, file picker) or
/// bytes already in memory (camera capture, upload form).
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes {
        bytes: Vec<u8>,
        /// Media type reported by the picker, if any.
        content_type: Option<String>,
        file_name: Option<String>,
    },
}

impl ImageSource {
    /// In-memory source with a declared media type.
    pub fn bytes(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        ImageSource::Bytes {
            bytes: bytes.into(),
            content_type: Some(content_type.into()),
            file_name: None,
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

/// A validated prescription photo held in memory.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Vec<u8>,
    content_type: String,
    file_name: String,
    preview: Preview,
}

impl SourceImage {
    /// Raw bytes, as sent to the OCR service.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Media type, e.g. `image/jpeg`.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// File name sent with the multipart part.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Locally renderable preview.
    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Validate `source` and produce a [`SourceImage`].
///
/// # Errors
/// - [`ScanError::ImageRead`] when a path cannot be read
/// - [`ScanError::InvalidInput`] when the file is empty, larger than
///   `max_bytes`, or does not report an `image/*` media type
pub async fn acquire(source: ImageSource, max_bytes: usize) -> Result<SourceImage, ScanError> {
    let (bytes, declared, file_name) = match source {
        ImageSource::Path(path) => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| ScanError::ImageRead {
                    path: path.clone(),
                    source: e,
                })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
            (bytes, None, name)
        }
        ImageSource::Bytes {
            bytes,
            content_type,
            file_name,
        } => (bytes, content_type, file_name),
    };

    if bytes.is_empty() {
        return Err(InvalidInputKind::Empty.into());
    }
    if bytes.len() > max_bytes {
        return Err(InvalidInputKind::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        }
        .into());
    }

    let content_type = resolve_media_type(declared.as_deref(), file_name.as_deref(), &bytes);
    if !is_image_media_type(&content_type) {
        return Err(InvalidInputKind::NotAnImage {
            media_type: content_type,
        }
        .into());
    }

    let file_name = file_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("prescription.{}", default_extension(&content_type)));
    let preview = encode::encode_preview(&bytes, &content_type);

    info!(
        "Acquired image '{}' ({}, {} bytes)",
        file_name,
        content_type,
        bytes.len()
    );

    Ok(SourceImage {
        bytes,
        content_type,
        file_name,
        preview,
    })
}

/// Work out the media type: declared type, then file extension, then magic bytes.
pub fn resolve_media_type(declared: Option<&str>, file_name: Option<&str>, bytes: &[u8]) -> String {
    if let Some(declared) = declared.map(essence).filter(|d| !d.is_empty()) {
        return declared;
    }

    if let Some(guess) = file_name.and_then(|n| mime_guess::from_path(n).first()) {
        debug!("Media type from extension: {}", guess);
        return guess.essence_str().to_string();
    }

    match image::guess_format(bytes) {
        Ok(format) => {
            debug!("Media type from magic bytes: {:?}", format);
            format.to_mime_type().to_string()
        }
        Err(_) => FALLBACK_MEDIA_TYPE.to_string(),
    }
}

/// `"Image/JPEG; charset=binary"` → `"image/jpeg"`.
fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// A well-formed `image/<subtype>` type. The same parser checks the part
/// header at upload time, so anything rejected there is rejected here.
fn is_image_media_type(media_type: &str) -> bool {
    media_type
        .parse::<Mime>()
        .is_ok_and(|m| m.type_() == mime::IMAGE && !m.subtype().as_str().is_empty())
}

fn default_extension(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "image/gif" => "gif",
        _ => "img",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";
    const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00";

    #[tokio::test]
    async fn accepts_declared_image() {
        let img = acquire(ImageSource::bytes(JPEG_MAGIC, "image/jpeg"), 1024)
            .await
            .expect("jpeg accepted");
        assert_eq!(img.content_type(), "image/jpeg");
        assert_eq!(img.file_name(), "prescription.jpg");
        assert_eq!(img.bytes(), JPEG_MAGIC);
        assert!(img.preview().data_uri.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn rejects_non_image_declared_type() {
        let err = acquire(ImageSource::bytes(b"%PDF-1.7".to_vec(), "application/pdf"), 1024)
            .await
            .unwrap_err();
        match err {
            ScanError::InvalidInput {
                kind: InvalidInputKind::NotAnImage { media_type },
            } => assert_eq!(media_type, "application/pdf"),
            other => panic!("expected NotAnImage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized() {
        let empty = acquire(ImageSource::bytes(Vec::new(), "image/png"), 1024).await;
        assert!(matches!(
            empty,
            Err(ScanError::InvalidInput {
                kind: InvalidInputKind::Empty
            })
        ));

        let big = acquire(ImageSource::bytes(vec![0u8; 11], "image/png"), 10).await;
        assert!(matches!(
            big,
            Err(ScanError::InvalidInput {
                kind: InvalidInputKind::TooLarge { size: 11, limit: 10 }
            })
        ));
    }

    #[tokio::test]
    async fn reads_from_path_and_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(PNG_MAGIC)
            .unwrap();

        let img = acquire(ImageSource::from(path.as_path()), 1024).await.unwrap();
        assert_eq!(img.content_type(), "image/png");
        assert_eq!(img.file_name(), "receipt.png");
    }

    #[tokio::test]
    async fn text_file_path_is_not_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let err = acquire(ImageSource::Path(path), 1024).await.unwrap_err();
        assert!(err.to_string().contains("not an image"), "got: {err}");
    }

    #[tokio::test]
    async fn missing_path_is_read_error() {
        let err = acquire(ImageSource::Path("/definitely/not/here.jpg".into()), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ImageRead { .. }));
    }

    #[test]
    fn media_type_resolution_order() {
        assert_eq!(
            resolve_media_type(Some("Image/JPEG; q=1"), Some("a.png"), PNG_MAGIC),
            "image/jpeg"
        );
        assert_eq!(resolve_media_type(None, Some("a.png"), JPEG_MAGIC), "image/png");
        assert_eq!(resolve_media_type(None, None, PNG_MAGIC), "image/png");
        assert_eq!(resolve_media_type(Some("  "), None, JPEG_MAGIC), "image/jpeg");
        assert_eq!(
            resolve_media_type(None, None, b"plain"),
            "application/octet-stream"
        );
    }

    #[test]
    fn bare_image_prefix_is_not_enough() {
        assert!(!is_image_media_type("image/"));
        assert!(is_image_media_type("image/heic"));
        assert!(!is_image_media_type("video/mp4"));
        assert!(!is_image_media_type("image/ jpeg"));
        assert!(!is_image_media_type("image/jp eg"));
    }

    #[tokio::test]
    async fn malformed_image_type_is_not_an_image() {
        let err = acquire(ImageSource::bytes(JPEG_MAGIC, "image/ jpeg"), 1024)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        match err {
            ScanError::InvalidInput {
                kind: InvalidInputKind::NotAnImage { media_type },
            } => assert_eq!(media_type, "image/ jpeg"),
            other => panic!("expected NotAnImage, got {other:?}"),
        }
    }
}
