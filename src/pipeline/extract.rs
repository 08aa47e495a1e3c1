//! Remote extraction: send the photo, classify the answer.
//!
//! One call is one request/response exchange. Nothing here retries: a
//! failure is reported to the session, which keeps the image so the user can
//! ask for another attempt.

use crate::error::ExtractionError;
use crate::pipeline::intake::SourceImage;
use crate::pipeline::transport::{ExtractionRequest, ExtractionTransport};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{info, warn};

/// The service's decoded JSON object, unvalidated.
///
/// Every key is optional. Consumed by
/// [`normalize`](crate::pipeline::normalize::normalize).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExtractionResult(Map<String, Value>);

impl RawExtractionResult {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse a response body. Anything but a JSON object is rejected.
    pub fn from_slice(body: &[u8]) -> Result<Self, ExtractionError> {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => Ok(Self(fields)),
            Ok(other) => Err(ExtractionError::Parse {
                detail: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
            Err(e) => Err(ExtractionError::Parse {
                detail: e.to_string(),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl TryFrom<Value> for RawExtractionResult {
    type Error = ExtractionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(ExtractionError::Parse {
                detail: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }
}

/// Send `image` to the OCR service and decode its answer.
///
/// Safe to call repeatedly with the same image: each call builds its own
/// [`ExtractionRequest`] and yields an independent result.
///
/// # Errors
/// - [`ExtractionError::Network`]: the transport failed
/// - [`ExtractionError::Service`]: non-2xx status
/// - [`ExtractionError::Parse`]: 2xx status but the body is not a JSON object
pub async fn extract(
    transport: &dyn ExtractionTransport,
    image: &SourceImage,
) -> Result<RawExtractionResult, ExtractionError> {
    let start = Instant::now();
    let request = ExtractionRequest {
        bytes: image.bytes().to_vec(),
        content_type: image.content_type().to_string(),
        file_name: image.file_name().to_string(),
    };

    let response = transport.send(request).await?;

    if !response.is_success() {
        warn!("Extraction service returned HTTP {}", response.status);
        return Err(ExtractionError::Service {
            status: response.status,
        });
    }

    let raw = RawExtractionResult::from_slice(&response.body).inspect_err(|e| {
        warn!("Extraction response unreadable: {}", e);
    })?;

    info!(
        "Extraction answered in {}ms with {} top-level fields",
        start.elapsed().as_millis(),
        raw.fields().len()
    );
    Ok(raw)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
