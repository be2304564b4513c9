//! The signed-in user's profile.

use std::sync::{Arc, Mutex};

use bazaar_auth::User;
use bazaar_commerce::address::Address;
use bazaar_data::FetchClient;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::lock;
use crate::Result;

/// Editable profile fields for `PUT /user/me`; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileState {
    pub user: Option<User>,
    pub loading: bool,
    pub error: Option<String>,
    pub fetched: bool,
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    client: FetchClient,
    state: Arc<Mutex<ProfileState>>,
}

impl ProfileStore {
    pub fn new(client: FetchClient) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(ProfileState::default())),
        }
    }

    pub fn state(&self) -> ProfileState {
        lock(&self.state).clone()
    }

    pub fn user(&self) -> Option<User> {
        lock(&self.state).user.clone()
    }

    pub fn is_loaded(&self) -> bool {
        lock(&self.state).user.is_some()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    /// Name, or empty before the profile loads.
    pub fn name(&self) -> String {
        lock(&self.state)
            .user
            .as_ref()
            .map(|u| u.name.clone())
            .unwrap_or_default()
    }

    pub fn wallet_balance(&self) -> f64 {
        lock(&self.state)
            .user
            .as_ref()
            .map_or(0.0, User::wallet_balance)
    }

    /// `GET /user/me`, once until [`refresh`](Self::refresh) or [`clear`](Self::clear).
    pub async fn fetch(&self) -> Result<bool> {
        {
            let mut state = lock(&self.state);
            if state.fetched || state.loading {
                return Ok(false);
            }
            state.loading = true;
            state.error = None;
        }

        let result = self.client.get("/user/me").fetch::<User>().await;

        let mut state = lock(&self.state);
        state.loading = false;
        match result {
            Ok(user) => {
                debug!(user = ?user.id, "profile loaded");
                state.user = Some(user);
                state.fetched = true;
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch profile");
                state.error = Some(e.user_message());
                Err(e.into())
            }
        }
    }

    pub async fn refresh(&self) -> Result<bool> {
        lock(&self.state).fetched = false;
        self.fetch().await
    }

    /// `PUT /user/me`; the response replaces the cached profile.
    pub async fn update(&self, update: &ProfileUpdate) -> Result<User> {
        {
            let mut state = lock(&self.state);
            state.loading = true;
            state.error = None;
        }

        let result = match self.client.put("/user/me").json(update) {
            Ok(request) => request.fetch::<User>().await,
            Err(e) => Err(e),
        };

        let mut state = lock(&self.state);
        state.loading = false;
        match result {
            Ok(user) => {
                info!(user = ?user.id, "profile updated");
                state.user = Some(user.clone());
                state.fetched = true;
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "failed to update profile");
                state.error = Some(e.user_message());
                Err(e.into())
            }
        }
    }

    /// Forget the profile, e.g. on logout.
    pub fn clear(&self) {
        *lock(&self.state) = ProfileState::default();
    }
}
