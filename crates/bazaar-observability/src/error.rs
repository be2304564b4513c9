//! Observability errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObservabilityError {
    /// The level or filter directive could not be parsed.
    #[error("invalid log filter '{directive}': {message}")]
    InvalidFilter { directive: String, message: String },

    /// A global subscriber was already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}
