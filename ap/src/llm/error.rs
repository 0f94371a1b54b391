//! Generation service error types
//!
//! Every failure of the external text-generation service surfaces as one of
//! three typed variants. Third-party client errors are mapped here and never
//! leak past the client boundary.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Service unavailable{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Unavailable { status: Option<u16>, message: String },
}

impl LlmError {
    /// Unavailable without an HTTP status (connection refused, bad config, ...)
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            status: None,
            message: message.into(),
        }
    }

    /// Map a reqwest error, using `timeout` as the reported duration for timeouts
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unavailable {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }

    /// Check if this error is worth retrying at the transport level
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout(_) => true,
            LlmError::Unavailable { status: None, .. } => true,
            LlmError::Unavailable { status: Some(s), .. } => is_retryable_status(*s),
            LlmError::Malformed(_) => false,
        }
    }

    /// Short label for logs and stats
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Timeout(_) => "timeout",
            LlmError::Malformed(_) => "malformed",
            LlmError::Unavailable { .. } => "unavailable",
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Malformed(err.to_string())
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 529)
}
