//! HTTP client error types.

use thiserror::Error;

/// Errors that can occur when talking to the marketplace API.
///
/// Cloneable so one failed in-flight request can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Transport failure: no response was received.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request exceeded its total timeout.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Non-2xx response. `message` comes from the body when it has one.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Body could not be decoded into the expected type.
    #[error("Failed to parse response: {0}")]
    Deserialization(String),

    /// Body decoded but has the wrong shape (e.g. not an array).
    #[error("Invalid response shape: {0}")]
    InvalidResponse(String),

    /// Request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upload accepted but unusable, or inline image data was malformed.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Superseded by a newer request. Not a failure.
    #[error("Request cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// HTTP status, for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short message suitable for a store error field or a notice.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Http { message, .. } => message.clone(),
            FetchError::Connection(_) => "Network error or no response".to_string(),
            FetchError::Timeout(_) => "Request timed out".to_string(),
            FetchError::Cancelled => "Request cancelled".to_string(),
            FetchError::Upload(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Deserialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message() {
        let err = FetchError::Http {
            status: 400,
            message: "Out of stock".into(),
        };
        assert_eq!(err.user_message(), "Out of stock");
        assert_eq!(err.status(), Some(400));
        assert_eq!(
            FetchError::Connection("refused".into()).user_message(),
            "Network error or no response"
        );
        assert!(FetchError::Cancelled.is_cancelled());
    }
}
