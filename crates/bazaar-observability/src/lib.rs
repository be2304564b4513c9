//! Observability for the Bazaar storefront client.
//!
//! This crate provides:
//! - `LogConfig` - Level and output format, deserializable from config files
//! - `init_logging` - Installs the global `tracing` subscriber

mod error;
mod logging;

pub use error::ObservabilityError;
pub use logging::*;
