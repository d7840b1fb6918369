//! Error types used throughout the orchestration layer

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for FabricFlow
///
/// Only request-level failures are errors. Operations that finish in a
/// failed or timed-out state are reported as
/// [`OperationOutcome`](crate::OperationOutcome) values instead.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum FlowError {
    /// The credential could not produce a token, or the service kept
    /// rejecting a freshly issued one.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Terminal client error returned by the service (4xx other than 401/429).
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The retry budget was consumed by retryable failures.
    #[error(
        "Retries exhausted after {attempts} attempts (last status {}): {message}",
        display_status(.last_status)
    )]
    ExhaustedRetries { attempts: u32, last_status: Option<u16>, message: String },

    /// Network-level failure that has no HTTP status.
    #[error("Transport error: {message}")]
    Transport { message: String, retryable: bool },

    #[error("Configuration error: {0}")]
    Config(String),

    /// The service answered with a payload that could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl FlowError {
    /// Build a transport error that the dispatcher may retry.
    pub fn transient_transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), retryable: true }
    }

    /// Build a transport error that is never retried (e.g. malformed URL).
    pub fn fatal_transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), retryable: false }
    }

    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::ExhaustedRetries { last_status, .. } => *last_status,
            _ => None,
        }
    }

    /// Short machine-readable code, used when an error is folded into a
    /// failed operation outcome.
    pub fn code(&self) -> String {
        match self {
            Self::Auth(_) => "AuthError".to_string(),
            Self::Api { status, .. } => format!("HTTP{status}"),
            Self::ExhaustedRetries { .. } => "ExhaustedRetries".to_string(),
            Self::Transport { .. } => "TransportError".to_string(),
            Self::Config(_) => "ConfigError".to_string(),
            Self::InvalidResponse(_) => "InvalidResponse".to_string(),
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(format!("JSON error: {err}"))
    }
}

/// Result type alias for FabricFlow operations
pub type Result<T> = std::result::Result<T, FlowError>;
