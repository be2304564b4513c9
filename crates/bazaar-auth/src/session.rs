//! Session cache.
//!
//! The server keeps the session in a cookie; `/user/session` tells the client
//! whether it is logged in and hands out the bearer token used for the other
//! endpoints.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bazaar_commerce::ids::UserId;
use bazaar_data::sync::InFlight;
use bazaar_data::{FetchClient, TokenSource};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::user::{Registration, Role, SessionUser};
use crate::AuthError;

/// Message used when the login endpoint gives no reason.
pub const LOGIN_FAILED: &str = "Login failed. Please try again.";

/// Observable session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub user: Option<SessionUser>,
    /// Set once a session check has completed, successfully or not.
    pub checked: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub login_error: Option<String>,
    pub register_error: Option<String>,
    pub verify_error: Option<String>,
}

impl SessionState {
    fn sign_out(&mut self) {
        self.token = None;
        self.is_authenticated = false;
        self.user = None;
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    auth: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<SessionUser>,
}

/// Cached auth session.
///
/// Cheap to clone; clones share state. Also serves as the [`TokenSource`] for
/// the authenticated API client.
#[derive(Clone)]
pub struct SessionStore {
    client: FetchClient,
    state: Arc<Mutex<SessionState>>,
    checks: InFlight<(), bool>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SessionStore")
            .field("authenticated", &state.is_authenticated)
            .field("checked", &state.checked)
            .finish()
    }
}

impl SessionStore {
    /// `client` should not carry a token source of its own.
    pub fn new(client: FetchClient) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(SessionState::default())),
            checks: InFlight::collapsing(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.lock().clone()
    }

    /// Check the session with the server.
    ///
    /// After the first completed check the cached answer is returned unless
    /// `force` is set. Concurrent callers share one request. Failures count as
    /// signed out and are recorded in the state, never returned.
    pub async fn fetch_session(&self, force: bool) -> bool {
        {
            let state = self.lock();
            if state.checked && !force {
                return state.is_authenticated;
            }
        }
        if force {
            self.checks.forget(&());
        }

        let client = self.client.clone();
        let state = self.state.clone();
        self.checks
            .get_or_start((), move || check_session(client, state))
            .await
    }

    /// Log in and refresh the session.
    ///
    /// Returns the login response body. The error message comes from the
    /// body's `error` field when the server gives one.
    pub async fn login(&self, email: &str, password: &str) -> Result<Value, AuthError> {
        {
            let mut state = self.lock();
            state.loading = true;
            state.login_error = None;
        }

        let result = self
            .client
            .post("/user/login")
            .json(&json!({ "email": email, "password": password }))?
            .send()
            .await;

        let outcome = match result {
            Ok(resp) if resp.is_success() => Ok(resp.json_value().unwrap_or(Value::Null)),
            Ok(resp) => {
                let message = resp
                    .json_value()
                    .ok()
                    .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
                    .unwrap_or_else(|| LOGIN_FAILED.to_string());
                Err(AuthError::LoginFailed(message))
            }
            Err(e) => {
                warn!(error = %e, "login request failed");
                Err(AuthError::LoginFailed(LOGIN_FAILED.to_string()))
            }
        };

        {
            let mut state = self.lock();
            state.loading = false;
            if let Err(e) = &outcome {
                state.login_error = Some(e.user_message());
            }
        }

        if outcome.is_ok() {
            info!(email, "logged in");
            self.fetch_session(true).await;
        }
        outcome
    }

    /// Log out. Local state is cleared even if the request fails.
    pub async fn logout(&self) {
        let result = match self.client.post("/user/logout").json(&json!({})) {
            Ok(req) => req.execute().await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(error = %e, "logout request failed (continuing)");
        }

        let mut state = self.lock();
        state.sign_out();
        state.checked = true;
        debug!("session cleared");
    }

    /// Ask the server to email a one-time password.
    pub async fn request_otp(&self, email: &str) -> Result<(), AuthError> {
        self.set_loading(true, |s| s.register_error = None);
        let result = match self.client.post("/user/request-otp").json(&json!({ "email": email })) {
            Ok(req) => req.execute().await,
            Err(e) => Err(e),
        };
        self.set_loading(false, |_| {});

        result.map(|_| ()).map_err(|e| {
            let message = e.user_message();
            warn!(error = %e, "otp request failed");
            self.lock().register_error = Some(message.clone());
            AuthError::OtpFailed(message)
        })
    }

    /// Verify the OTP and create the account.
    pub async fn register(&self, registration: &Registration) -> Result<(), AuthError> {
        self.set_loading(true, |s| s.verify_error = None);
        let result = match self.client.post("/user/register").json(registration) {
            Ok(req) => req.execute().await,
            Err(e) => Err(e),
        };
        self.set_loading(false, |_| {});

        result.map(|_| ()).map_err(|e| {
            let message = e.user_message();
            self.lock().verify_error = Some(message.clone());
            AuthError::RegistrationFailed(message)
        })
    }

    fn set_loading(&self, loading: bool, f: impl FnOnce(&mut SessionState)) {
        let mut state = self.lock();
        state.loading = loading;
        f(&mut state);
    }

    /// `Bearer <token>` for the current session.
    pub fn authorization_header(&self) -> Option<String> {
        self.token().map(|t| format!("Bearer {t}"))
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated
    }

    pub fn is_checked(&self) -> bool {
        self.lock().checked
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.lock().user.as_ref().map(|u| u.id.clone())
    }

    pub fn role(&self) -> Option<Role> {
        self.lock().user.as_ref().map(|u| u.role)
    }

    /// Fails with [`AuthError::Unauthenticated`] when signed out.
    pub fn require_user(&self) -> Result<UserId, AuthError> {
        self.user_id().ok_or(AuthError::Unauthenticated)
    }
}

impl TokenSource for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        self.token()
    }
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn check_session(client: FetchClient, state: Arc<Mutex<SessionState>>) -> bool {
    {
        let mut s = lock_state(&state);
        s.loading = true;
        s.error = None;
    }

    let result = client.get("/user/session").fetch::<SessionResponse>().await;

    let mut s = lock_state(&state);
    match result {
        Ok(resp) if resp.auth => {
            s.token = resp.token;
            s.user = resp.user;
            s.is_authenticated = true;
        }
        Ok(_) => s.sign_out(),
        Err(e) => {
            warn!(error = %e, "session check failed");
            s.sign_out();
            s.error = Some(e.user_message());
        }
    }
    s.checked = true;
    s.loading = false;
    debug!(authenticated = s.is_authenticated, "session checked");
    s.is_authenticated
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_data::mock::MockBackend;
    use bazaar_data::{FetchError, Method};
    use std::time::Duration;

    fn store(mock: &MockBackend) -> SessionStore {
        SessionStore::new(FetchClient::new(Arc::new(mock.clone())))
    }

    fn signed_in() -> Value {
        json!({"auth": true, "token": "tok-1", "user": {"id": "u1", "role": "vendor"}})
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_checks_issue_one_request() {
        let mock = MockBackend::new();
        mock.on_delayed(
            Method::Get,
            "/user/session",
            Duration::from_millis(100),
            200,
            signed_in(),
        );
        let session = store(&mock);

        let (a, b, c) = tokio::join!(
            session.fetch_session(false),
            session.fetch_session(false),
            session.fetch_session(false),
        );
        assert!(a && b && c);
        assert_eq!(mock.count(Method::Get, "/user/session"), 1);
        assert_eq!(session.authorization_header().as_deref(), Some("Bearer tok-1"));
        assert_eq!(session.role(), Some(Role::Vendor));

        // Cached after the first check.
        assert!(session.fetch_session(false).await);
        assert_eq!(mock.count(Method::Get, "/user/session"), 1);

        session.fetch_session(true).await;
        assert_eq!(mock.count(Method::Get, "/user/session"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_check_is_signed_out() {
        let mock = MockBackend::new();
        mock.fail(
            Method::Get,
            "/user/session",
            FetchError::Connection("refused".into()),
        );
        let session = store(&mock);
        assert!(!session.fetch_session(false).await);
        let state = session.state();
        assert!(state.checked);
        assert_eq!(state.error.as_deref(), Some("Network error or no response"));
        assert_eq!(session.bearer_token(), None);
        assert_eq!(session.require_user(), Err(AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_login_refreshes_session() {
        let mock = MockBackend::new();
        mock.on(Method::Post, "/user/login", 200, json!({"message": "ok"}));
        mock.on(Method::Get, "/user/session", 200, signed_in());
        let session = store(&mock);

        let body = session.login("ana@example.com", "pw").await.unwrap();
        assert_eq!(body["message"], "ok");
        assert!(session.is_authenticated());
        assert_eq!(mock.count(Method::Get, "/user/session"), 1);

        let call = &mock.calls_to(Method::Post, "/user/login")[0];
        assert_eq!(call.body.as_ref().unwrap()["email"], "ana@example.com");
    }

    #[tokio::test]
    async fn test_login_error_message() {
        let mock = MockBackend::new();
        mock.on(Method::Post, "/user/login", 401, json!({"error": "Wrong password"}));
        let session = store(&mock);
        let err = session.login("a@b.c", "x").await.unwrap_err();
        assert_eq!(err, AuthError::LoginFailed("Wrong password".into()));
        assert_eq!(session.state().login_error.as_deref(), Some("Wrong password"));

        mock.on(Method::Post, "/user/login", 500, json!({}));
        let err = session.login("a@b.c", "x").await.unwrap_err();
        assert_eq!(err.user_message(), LOGIN_FAILED);
        assert_eq!(mock.count(Method::Get, "/user/session"), 0);
    }

    #[tokio::test]
    async fn test_logout_clears_even_on_failure() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/user/session", 200, signed_in());
        mock.on(Method::Post, "/user/logout", 500, json!({"message": "boom"}));
        let session = store(&mock);
        assert!(session.fetch_session(false).await);

        session.logout().await;
        assert!(!session.is_authenticated());
        assert!(session.is_checked());
        assert_eq!(session.token(), None);
    }

    #[tokio::test]
    async fn test_otp_and_register_errors() {
        let mock = MockBackend::new();
        mock.on(Method::Post, "/user/request-otp", 400, json!({"message": "Email already used"}));
        mock.on(Method::Post, "/user/register", 400, json!({"error": "Invalid OTP"}));
        let session = store(&mock);

        let err = session.request_otp("a@b.c").await.unwrap_err();
        assert_eq!(err, AuthError::OtpFailed("Email already used".into()));
        assert_eq!(
            session.state().register_error.as_deref(),
            Some("Email already used")
        );

        let err = session
            .register(&Registration::default())
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid OTP");
        assert!(!session.state().loading);
    }
}
