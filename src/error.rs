//! Error types for the rxscan library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScanError`]: returned from every session and one-shot operation.
//!   Covers local problems (the selected file is not an image, the session
//!   is busy, the configuration is invalid) as well as wrapping a failed
//!   remote call.
//!
//! * [`ExtractionError`]: the remote call itself failed (transport, non-2xx
//!   status, unparseable body, or an upload that could not be built). It is
//!   `Clone` so the session can keep it as its current error and hand
//!   snapshots to the presentation layer, which offers a retry on the image
//!   it already holds.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the rxscan library.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// The selected file cannot be used as a prescription photo.
    /// Not retryable without selecting a different file.
    #[error("Invalid input: {kind}")]
    InvalidInput { kind: InvalidInputKind },

    /// The image file could not be read from disk.
    #[error("Failed to read image '{path}': {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The remote extraction call failed. Retryable unless the upload
    /// itself could not be built.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    // ── Session errors ────────────────────────────────────────────────────
    /// An extraction call is already in flight for this session.
    #[error("An extraction is already in progress")]
    Busy,

    /// Extraction was requested but no image has been selected.
    #[error("No image selected; choose a prescription photo first")]
    NoImage,

    /// Commit was requested but there is no extracted prescription.
    #[error("No extracted prescription to save")]
    NothingToCommit,

    /// The session was reset while the call was in flight; its result was discarded.
    #[error("Extraction abandoned: the scan was reset before the result arrived")]
    Abandoned,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Whether re-issuing the extraction on the same image may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScanError::Extraction(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<InvalidInputKind> for ScanError {
    fn from(kind: InvalidInputKind) -> Self {
        ScanError::InvalidInput { kind }
    }
}

/// Why a selected file was rejected at intake.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum InvalidInputKind {
    /// The file does not report an image media type.
    #[error("not an image (media type '{media_type}')")]
    NotAnImage { media_type: String },

    /// The file contains no bytes.
    #[error("the image file is empty")]
    Empty,

    /// The file exceeds the configured upload limit.
    #[error("image is {size} bytes, larger than the {limit}-byte limit")]
    TooLarge { size: usize, limit: usize },
}

/// A failed call to the OCR/structuring service.
///
/// Stored in [`crate::session::ScanState::Failed`] and surfaced with a retry
/// affordance when [`is_retryable`](Self::is_retryable). No variant is
/// retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// The service could not be reached, the connection dropped, or the call timed out.
    #[error("Network error: {detail}\nCheck that the prescription service is running.")]
    Network { detail: String },

    /// The service answered with a non-2xx status.
    #[error("Server error: {status}")]
    Service { status: u16 },

    /// The service answered 2xx but the body is not a JSON object.
    #[error("Could not read the service response: {detail}")]
    Parse { detail: String },

    /// The upload could not be encoded (e.g. an unparseable part content
    /// type). Sending the same request again cannot help.
    #[error("Could not build the upload: {detail}")]
    Request { detail: String },
}

impl ExtractionError {
    /// The HTTP status for [`ExtractionError::Service`], if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExtractionError::Service { status } => Some(*status),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExtractionError::Request { .. })
    }
}
