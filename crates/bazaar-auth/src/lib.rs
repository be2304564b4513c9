//! Authentication for the Bazaar storefront client.
//!
//! Provides the cached auth session, login/logout and registration calls,
//! and the user types they return.

mod error;
mod session;
mod user;

pub use error::AuthError;
pub use session::{SessionState, SessionStore, LOGIN_FAILED};
pub use user::{Registration, Role, SessionUser, User, Wallet};
