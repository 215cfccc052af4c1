//! JSON response envelope spoken between the bridge and its front ends.
//!
//! Every bridge action produces exactly one [`ResponseEnvelope`]. The codec is
//! a typed serde pair rather than string assembly, so item names containing
//! quotes, newlines or control characters cannot corrupt the structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{BridgeError, ErrorCode};

/// Protocol version information
pub const PROTOCOL_VERSION: &str = "1.0";

/// Response status types
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Warning,
    Error,
    Info,
}

/// Error information nested inside an error envelope.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

/// The uniform wrapper returned by every bridge action.
///
/// Example success:
/// ```json
/// {
///   "status": "success",
///   "data": { "succeeded": ["neovim"], "succeeded_count": 1 },
///   "message": "1 package installed",
///   "timestamp": "2024-01-15T10:30:15Z"
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ResponseEnvelope {
    fn new(status: Status, message: impl Into<String>, data: Value) -> Self {
        Self {
            status,
            data,
            error: None,
            message: message.into(),
            timestamp: Utc::now(),
            request_id: None,
        }
    }

    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self::new(Status::Success, message, data)
    }

    pub fn warning(message: impl Into<String>, data: Value) -> Self {
        Self::new(Status::Warning, message, data)
    }

    pub fn info(message: impl Into<String>, data: Value) -> Self {
        Self::new(Status::Info, message, data)
    }

    pub fn error(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        let message = message.into();
        let mut envelope = Self::new(Status::Error, message.clone(), Value::Null);
        envelope.error = Some(ErrorDetail {
            code,
            message,
            details,
        });
        envelope
    }

    /// Build an error envelope from a classified bridge error.
    pub fn from_bridge_error(err: &BridgeError) -> Self {
        Self::error(err.code(), err.to_string(), err.details())
    }

    /// Stamp a unique request id onto the envelope.
    pub fn with_request_id(mut self) -> Self {
        self.request_id = Some(generate_request_id());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }

    /// Serialize to a JSON string.
    ///
    /// Failure here is a protocol-level fault: the caller cannot transmit a
    /// response at all and must exit non-zero.
    pub fn to_json(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self).map_err(|e| BridgeError::malformed(e.to_string()))
    }

    /// Parse a transmitted envelope back into the typed structure.
    pub fn from_json(input: &str) -> Result<Self, BridgeError> {
        let envelope: ResponseEnvelope =
            serde_json::from_str(input).map_err(|e| BridgeError::malformed(e.to_string()))?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Structural invariants from the protocol contract: a non-empty message,
    /// and error detail present exactly when the status is `error`.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.message.trim().is_empty() {
            return Err(BridgeError::malformed("envelope message must not be empty"));
        }
        match (self.status, self.error.is_some()) {
            (Status::Error, false) => Err(BridgeError::malformed(
                "status is 'error' but no error detail is attached",
            )),
            (Status::Error, true) => Ok(()),
            (_, true) => Err(BridgeError::malformed(
                "error detail attached to a non-error envelope",
            )),
            (_, false) => Ok(()),
        }
    }
}

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();

    let random: u32 = rand::random();

    format!("req_{}_{}", timestamp, random)
}
