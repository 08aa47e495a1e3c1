//! Progress-callback trait for scan state transitions.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to receive an
//! event every time a [`crate::session::ScanSession`] changes state. The
//! presentation layer re-renders from these events: show the preview,
//! disable the submit button while processing, show the result or the
//! error with its retry button.
//!
//! # Example
//!
//! ```rust
//! use rxscan::{ScanConfig, ScanProgressCallback, ScanState};
//! use std::sync::Arc;
//!
//! struct PrintingCallback;
//!
//! impl ScanProgressCallback for PrintingCallback {
//!     fn on_state_change(&self, state: &ScanState) {
//!         eprintln!("scan is now {}", state.label());
//!     }
//! }
//!
//! let config = ScanConfig::builder()
//!     .progress_callback(Arc::new(PrintingCallback))
//!     .build()
//!     .unwrap();
//! ```

use crate::session::ScanState;
use std::sync::Arc;

/// Called by the session as a scan moves through its states.
///
/// Events are delivered after the session's internal lock is released, so
/// implementations may call back into the session. All methods have no-op
/// defaults.
pub trait ScanProgressCallback: Send + Sync {
    /// Called after every state transition with the new state.
    fn on_state_change(&self, state: &ScanState) {
        let _ = state;
    }

    /// Called just before the image is sent to the OCR service.
    ///
    /// # Arguments
    /// * `image_bytes`: size of the uploaded payload
    fn on_request_start(&self, image_bytes: usize) {
        let _ = image_bytes;
    }

    /// Called when a result arrives after the session was reset and is dropped.
    fn on_result_discarded(&self) {}
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScanConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;
