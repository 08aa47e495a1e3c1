//! Configuration types for prescription scanning.
//!
//! All scanning behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`] or read from the environment with
//! [`ScanConfig::from_env`].

use crate::error::ScanError;
use crate::pipeline::transport::ExtractionTransport;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Environment variable naming the OCR service base URL.
pub const API_URL_ENV: &str = "RXSCAN_API_URL";

/// Base URL used when [`API_URL_ENV`] is unset: the local development server.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:7080";

/// Path of the extraction endpoint, relative to the base URL.
pub const EXTRACT_PATH: &str = "/api/prescription/extract";

/// Default upload limit (20 MiB). Phone photos are typically 2–8 MB.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Configuration for a scan session.
///
/// # Example
/// ```rust
/// use rxscan::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .api_base_url("https://ocr.example.com/")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(
///     config.endpoint(),
///     "https://ocr.example.com/api/prescription/extract"
/// );
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// Base URL of the OCR/structuring service, without trailing slash.
    pub api_base_url: String,

    /// Per-request timeout in seconds. Default: `None`.
    ///
    /// `None` leaves the transport's own behaviour in place; a stalled call
    /// surfaces as a network error whenever the transport gives up.
    pub request_timeout_secs: Option<u64>,

    /// Largest image accepted at intake, in bytes. Default: 20 MiB.
    pub max_image_bytes: usize,

    /// Pre-constructed transport. Takes precedence over the HTTP transport
    /// built from `api_base_url`.
    pub transport: Option<Arc<dyn ExtractionTransport>>,

    /// Receives state transitions for the presentation layer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: None,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            transport: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_image_bytes", &self.max_image_bytes)
            .field(
                "transport",
                &self.transport.as_ref().map(|_| "<dyn ExtractionTransport>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScanProgressCallback>"),
            )
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a config whose base URL comes from [`API_URL_ENV`], falling
    /// back to [`DEFAULT_API_BASE_URL`] when unset or empty.
    pub fn from_env() -> Result<Self, ScanError> {
        let mut builder = Self::builder();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                builder = builder.api_base_url(url);
            }
        }
        builder.build()
    }

    /// Full URL of the extraction endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.api_base_url, EXTRACT_PATH)
    }
}

/// Builder for [`ScanConfig`].
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl fmt::Debug for ScanConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ScanConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.config.api_base_url = url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn ExtractionTransport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        let c = &self.config;
        let parsed = reqwest::Url::parse(&c.api_base_url).map_err(|e| {
            ScanError::InvalidConfig(format!("API base URL '{}' is invalid: {e}", c.api_base_url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScanError::InvalidConfig(format!(
                "API base URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if c.max_image_bytes == 0 {
            return Err(ScanError::InvalidConfig(
                "Image size limit must be ≥ 1 byte".into(),
            ));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(ScanError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:7080");
        assert_eq!(config.request_timeout_secs, None);
        assert_eq!(config.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
        assert_eq!(
            config.endpoint(),
            "http://localhost:7080/api/prescription/extract"
        );
    }

    #[test]
    fn trailing_slash_trimmed() {
        let config = ScanConfig::builder()
            .api_base_url("http://10.0.0.2:9000//")
            .build()
            .unwrap();
        assert_eq!(
            config.endpoint(),
            "http://10.0.0.2:9000/api/prescription/extract"
        );
    }

    #[test]
    fn rejects_bad_url() {
        let err = ScanConfig::builder()
            .api_base_url("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = ScanConfig::builder()
            .api_base_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn rejects_zero_limits() {
        assert!(ScanConfig::builder().max_image_bytes(0).build().is_err());
        assert!(ScanConfig::builder().request_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let config = ScanConfig::default();
        let s = format!("{config:?}");
        assert!(s.contains("api_base_url"));
        assert!(s.contains("transport: None"));
    }
}
