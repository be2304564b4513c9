//! HTTP plumbing for the Bazaar storefront client.
//!
//! This crate provides:
//! - `FetchClient` - API client with base URL, bearer auth, timeout and retry
//! - `HttpBackend` - Transport seam (`ReqwestBackend` in production)
//! - `RetryPolicy` / `TimeoutConfig` - Per-client request policy
//! - `upload` - Multipart image upload and upload-response handling
//! - `sync` - In-flight de-duplication, concurrency gate, debouncer and
//!   latest-wins runner
//!
//! # Example
//!
//! ```rust,ignore
//! use bazaar_data::{FetchClient, FetchPolicy};
//!
//! let client = FetchClient::reqwest(FetchPolicy::default())?
//!     .with_base_url("https://api.example.com");
//!
//! let cart: serde_json::Value = client.get("/cart").fetch().await?;
//! ```

mod client;
mod error;
mod request;
mod response;
mod retry;
mod timeout;

pub mod sync;
pub mod upload;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use client::{ClientRequestBuilder, FetchClient, HttpBackend, ReqwestBackend, StaticToken, TokenSource};
pub use error::FetchError;
pub use request::{Body, Method, Part, Request, RequestBuilder};
pub use response::Response;
pub use retry::{BackoffStrategy, RetryCondition, RetryPolicy};
pub use timeout::{FetchPolicy, TimeoutConfig};

/// Commonly used items.
pub mod prelude {
    pub use crate::sync::{ConcurrencyGate, Debouncer, InFlight, Supersede};
    pub use crate::{FetchClient, FetchError, FetchPolicy, Method, Response};
}
