//! Error taxonomy for the bridge layer.
//!
//! Every failure that crosses the bridge boundary is classified into one of
//! the symbolic codes below before it reaches a caller. Batch processing
//! aggregates these per item; only [`ErrorCode::MalformedEnvelope`] is allowed
//! to abort an entire call.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Symbolic error tags carried on the wire inside an error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed or empty caller input. Recoverable by correcting the input.
    ValidationError,
    /// Privilege session missing or expired. Never retried automatically.
    PermissionDenied,
    /// A required external tool is not on PATH. Fatal for the action only.
    CommandNotFound,
    /// External process exceeded its deadline and was terminated.
    Timeout,
    /// External process ran but reported failure outside the other categories.
    SystemError,
    /// Internal protocol violation. Always a bug.
    MalformedEnvelope,
    /// Unknown action name at the dispatch boundary.
    InvalidAction,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::CommandNotFound => "COMMAND_NOT_FOUND",
            Self::Timeout => "TIMEOUT",
            Self::SystemError => "SYSTEM_ERROR",
            Self::MalformedEnvelope => "MALFORMED_ENVELOPE",
            Self::InvalidAction => "INVALID_ACTION",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed bridge errors. Carries enough context to build an error envelope.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{message}")]
    Validation { message: String },

    #[error("operation requires elevated privileges but no session is active")]
    PermissionDenied,

    #[error("required command not found: {command}")]
    CommandNotFound { command: String },

    #[error("command timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    #[error("{message}")]
    System { command: String, message: String },

    #[error("malformed envelope: {message}")]
    MalformedEnvelope { message: String },

    #[error("unknown action '{name}'")]
    InvalidAction { name: String },
}

impl BridgeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ValidationError,
            Self::PermissionDenied => ErrorCode::PermissionDenied,
            Self::CommandNotFound { .. } => ErrorCode::CommandNotFound,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::System { .. } => ErrorCode::SystemError,
            Self::MalformedEnvelope { .. } => ErrorCode::MalformedEnvelope,
            Self::InvalidAction { .. } => ErrorCode::InvalidAction,
        }
    }

    /// Suggested remedy shown to the user alongside the error, if one exists.
    pub fn remedy(&self) -> Option<&'static str> {
        match self {
            Self::Validation { .. } => Some("correct the input and try again"),
            Self::PermissionDenied => Some("re-run the command and authenticate when prompted"),
            Self::CommandNotFound { .. } => Some("install the missing tool and try again"),
            Self::Timeout { .. } => Some("the operation may be retried manually"),
            Self::System { .. } | Self::MalformedEnvelope { .. } => None,
            Self::InvalidAction { .. } => Some("run with a recognized action name"),
        }
    }

    /// Structured context for the `details` field of an error envelope.
    pub fn details(&self) -> Value {
        let mut details = match self {
            Self::Validation { .. } | Self::PermissionDenied | Self::MalformedEnvelope { .. } => {
                json!({})
            }
            Self::CommandNotFound { command } => json!({ "command": command }),
            Self::Timeout { command, seconds } => {
                json!({ "command": command, "timeout_secs": seconds })
            }
            Self::System { command, .. } => json!({ "command": command }),
            Self::InvalidAction { name } => json!({
                "action": name,
                "recognized": super::actions::RECOGNIZED_ACTIONS,
            }),
        };

        if let Some(remedy) = self.remedy() {
            details["remedy"] = Value::String(remedy.to_string());
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_wire_format() {
        let json = serde_json::to_string(&ErrorCode::PermissionDenied).unwrap();
        assert_eq!(json, "\"PERMISSION_DENIED\"");

        let code: ErrorCode = serde_json::from_str("\"VALIDATION_ERROR\"").unwrap();
        assert_eq!(code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_code_display_matches_serde() {
        for code in [
            ErrorCode::ValidationError,
            ErrorCode::PermissionDenied,
            ErrorCode::CommandNotFound,
            ErrorCode::Timeout,
            ErrorCode::SystemError,
            ErrorCode::MalformedEnvelope,
            ErrorCode::InvalidAction,
        ] {
            let via_serde: String = serde_json::to_string(&code).unwrap();
            assert_eq!(via_serde, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_timeout_details_carry_command() {
        let err = BridgeError::Timeout {
            command: "pacman -S vim".to_string(),
            seconds: 300,
        };
        assert_eq!(err.code(), ErrorCode::Timeout);
        let details = err.details();
        assert_eq!(details["command"], "pacman -S vim");
        assert_eq!(details["timeout_secs"], 300);
    }

    #[test]
    fn test_invalid_action_enumerates_recognized_set() {
        let err = BridgeError::InvalidAction {
            name: "frobnicate".to_string(),
        };
        let details = err.details();
        let recognized = details["recognized"].as_array().unwrap();
        assert!(recognized.iter().any(|v| v == "install"));
        assert!(recognized.iter().any(|v| v == "font_update_cache"));
    }
}
