//! SDK error type.

use bazaar_auth::AuthError;
use bazaar_commerce::CommerceError;
use bazaar_data::FetchError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by store operations.
#[derive(Error, Debug)]
pub enum SdkError {
    /// Rejected by a local rule before any request was made.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The operation needs state that has not been loaded yet.
    #[error("{0}")]
    NotLoaded(&'static str),
}

impl SdkError {
    /// Superseded by a newer request; callers should not report it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SdkError::Fetch(e) if e.is_cancelled())
    }

    /// True when no request was sent because a local check failed.
    pub fn is_local(&self) -> bool {
        matches!(self, SdkError::Commerce(_) | SdkError::NotLoaded(_))
    }

    /// Short message for a notice or a store error field.
    pub fn user_message(&self) -> String {
        match self {
            SdkError::Fetch(e) => e.user_message(),
            SdkError::Auth(e) => e.user_message(),
            SdkError::Commerce(CommerceError::Validation(msg)) => msg.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T, E = SdkError> = std::result::Result<T, E>;
