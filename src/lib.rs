//! # rxscan
//!
//! Turn a photographed prescription or pharmacy receipt into a normalized,
//! display-ready medicine record.
//!
//! ## Why this crate?
//!
//! The OCR/structuring service that reads receipt photos answers with
//! whatever it managed to recognise: keys go missing, numbers arrive as
//! text, the medicine list may be absent. A medication app for elderly
//! users cannot show half-empty cards or crash on a blurry photo. This crate
//! owns the path from "user picked a photo" to "a record that always has a
//! pharmacy, a date and a medicine list", including failure, retry and reset.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo
//!  │
//!  ├─ 1. Intake     validate image media type, keep bytes + data-URI preview
//!  ├─ 2. Extract    multipart POST {base}/api/prescription/extract
//!  ├─ 3. Normalize  field-by-field defaults → NormalizedPrescription
//!  └─ 4. Commit     hand off to the medicine list (or retry / reset)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rxscan::{ImageSource, ScanConfig, ScanSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Base URL from RXSCAN_API_URL, default http://localhost:7080
//!     let config = ScanConfig::from_env()?;
//!     let session = ScanSession::new(&config)?;
//!
//!     let result = match session.submit(ImageSource::Path("receipt.jpg".into())).await {
//!         Err(e) if e.is_retryable() => session.retry().await?,
//!         other => other?,
//!     };
//!     println!("{}: {} medicines", result.pharmacy_name, result.medicines.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `rxscan` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod medicine_list;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scan;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::{ExtractionError, InvalidInputKind, ScanError};
pub use medicine_list::{MedicineEntry, MedicineId, MedicineList, MedicineSink};
pub use output::{MedicineLine, NormalizedPrescription, UNKNOWN};
pub use pipeline::extract::RawExtractionResult;
pub use pipeline::intake::{ImageSource, SourceImage};
pub use pipeline::normalize::normalize;
pub use pipeline::transport::{
    ExtractionRequest, ExtractionTransport, HttpTransport, TransportResponse,
};
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use scan::{scan_bytes, scan_file, scan_sync, scan_to_file, write_json};
pub use session::{ScanSession, ScanState};
