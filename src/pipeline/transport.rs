//! Transport seam between the pipeline and the OCR service.
//!
//! [`extract`](crate::pipeline::extract::extract) only needs "send these
//! bytes, give me a status and a body". Keeping that behind
//! [`ExtractionTransport`] lets the session be driven by an in-process fake
//! in tests and lets callers add their own middleware, while
//! [`HttpTransport`] is the real multipart upload over reqwest.

use crate::config::ScanConfig;
use crate::error::{ExtractionError, ScanError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, warn};

/// Name of the multipart field carrying the photo.
pub const IMAGE_FIELD: &str = "image";

/// One outbound upload. Built fresh for every call, retries included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

/// Status and body of the service's answer, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one request/response exchange with the OCR service.
///
/// Implementations map every transport-level failure (unreachable host,
/// timeout, aborted body) to [`ExtractionError::Network`] and return any
/// HTTP status, success or not, as a [`TransportResponse`]. A request that
/// cannot be encoded at all is [`ExtractionError::Request`].
#[async_trait]
pub trait ExtractionTransport: Send + Sync {
    async fn send(&self, request: ExtractionRequest) -> Result<TransportResponse, ExtractionError>;
}

/// Multipart upload to `POST {base}/api/prescription/extract`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Build a transport for the endpoint and timeout in `config`.
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ScanError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ExtractionTransport for HttpTransport {
    async fn send(&self, request: ExtractionRequest) -> Result<TransportResponse, ExtractionError> {
        let size = request.bytes.len();
        let part = Part::bytes(request.bytes)
            .file_name(request.file_name)
            .mime_str(&request.content_type)
            .map_err(|e| ExtractionError::Request {
                detail: format!("invalid content type '{}': {e}", request.content_type),
            })?;
        let form = Form::new().part(IMAGE_FIELD, part);

        debug!("POST {} ({} bytes)", self.endpoint, size);
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(network_error)?;
        debug!("{} answered {} with {} bytes", self.endpoint, status, body.len());

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn network_error(e: reqwest::Error) -> ExtractionError {
    let detail = if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("could not connect: {e}")
    } else {
        e.to_string()
    };
    warn!("Transport failure: {}", detail);
    ExtractionError::Network { detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        let ok = |status| TransportResponse {
            status,
            body: Vec::new(),
        };
        assert!(ok(200).is_success());
        assert!(ok(204).is_success());
        assert!(!ok(199).is_success());
        assert!(!ok(301).is_success());
        assert!(!ok(500).is_success());
    }

    #[test]
    fn http_transport_uses_config_endpoint() {
        let config = ScanConfig::builder()
            .api_base_url("http://127.0.0.1:9/")
            .request_timeout_secs(5)
            .build()
            .unwrap();
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(
            transport.endpoint(),
            "http://127.0.0.1:9/api/prescription/extract"
        );
    }

    #[tokio::test]
    async fn unencodable_content_type_is_not_a_network_error() {
        let config = ScanConfig::builder()
            .api_base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        let transport = HttpTransport::new(&config).unwrap();
        let err = transport
            .send(ExtractionRequest {
                bytes: b"\xff\xd8\xff".to_vec(),
                content_type: "image/ jpeg".into(),
                file_name: "prescription.jpg".into(),
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, ExtractionError::Request { .. }),
            "got: {err:?}"
        );
        assert!(!err.is_retryable());
    }
}
