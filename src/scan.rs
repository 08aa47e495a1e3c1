//! One-shot scan entry points.
//!
//! These wrap a throwaway [`ScanSession`] for callers that have a photo and
//! want a record back: the CLI, batch jobs, scripts. Interactive front-ends
//! that show a preview and offer retry hold a [`ScanSession`] directly.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::output::NormalizedPrescription;
use crate::pipeline::intake::ImageSource;
use crate::session::ScanSession;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Scan a photo on disk.
///
/// # Example
/// ```rust,no_run
/// use rxscan::{scan_file, ScanConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ScanConfig::from_env()?;
/// let prescription = scan_file("receipt.jpg", &config).await?;
/// for m in &prescription.medicines {
///     println!("{} {} × {}", m.name, m.dosage_per_intake, m.daily_frequency);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn scan_file(
    path: impl AsRef<Path>,
    config: &ScanConfig,
) -> Result<NormalizedPrescription, ScanError> {
    let path = path.as_ref();
    info!("Scanning {}", path.display());
    ScanSession::new(config)?
        .submit(ImageSource::Path(path.to_path_buf()))
        .await
}

/// Scan a photo already in memory, e.g. straight from a camera capture.
pub async fn scan_bytes(
    bytes: impl Into<Vec<u8>>,
    content_type: impl Into<String>,
    config: &ScanConfig,
) -> Result<NormalizedPrescription, ScanError> {
    ScanSession::new(config)?
        .submit(ImageSource::bytes(bytes, content_type))
        .await
}

/// Scan a photo and write the record as pretty JSON to `output_path`.
pub async fn scan_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ScanConfig,
) -> Result<NormalizedPrescription, ScanError> {
    let prescription = scan_file(path, config).await?;
    write_json(output_path, &prescription).await?;
    Ok(prescription)
}

/// Write `value` as pretty JSON to `output_path`, creating parent
/// directories as needed.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_json<T: Serialize + ?Sized>(
    output_path: impl AsRef<Path>,
    value: &T,
) -> Result<(), ScanError> {
    let out = output_path.as_ref();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ScanError::Internal(format!("Failed to serialise output: {e}")))?;

    let write_err = |e: std::io::Error| ScanError::OutputWriteFailed {
        path: out.to_path_buf(),
        source: e,
    };
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = out.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, out).await.map_err(write_err)?;

    info!("Wrote {}", out.display());
    Ok(())
}

/// Synchronous wrapper around [`scan_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn scan_sync(
    path: impl AsRef<Path>,
    config: &ScanConfig,
) -> Result<NormalizedPrescription, ScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ScanError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(scan_file(path, config))
}
