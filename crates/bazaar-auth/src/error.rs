//! Authentication errors.

use bazaar_data::FetchError;
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Login rejected; carries the message to show.
    #[error("{0}")]
    LoginFailed(String),

    /// OTP request rejected.
    #[error("OTP request failed: {0}")]
    OtpFailed(String),

    /// Registration rejected.
    #[error("registration failed: {0}")]
    RegistrationFailed(String),

    /// No authenticated session.
    #[error("not authenticated")]
    Unauthenticated,

    /// Role string the client does not know.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// Transport or server error.
    #[error(transparent)]
    Request(#[from] FetchError),
}

impl AuthError {
    /// Check if this is an authentication failure.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            AuthError::LoginFailed(_) | AuthError::Unauthenticated => true,
            AuthError::Request(e) => matches!(e.status(), Some(401 | 403)),
            _ => false,
        }
    }

    /// Message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Request(e) => e.user_message(),
            AuthError::LoginFailed(msg)
            | AuthError::OtpFailed(msg)
            | AuthError::RegistrationFailed(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
