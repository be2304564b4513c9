//! A seller's public storefront: shop card, product grid and following.

use std::sync::{Arc, Mutex};

use bazaar_commerce::catalog::{Cursor, Product};
use bazaar_commerce::ids::{UserId, VendorId};
use bazaar_commerce::vendor::Seller;
use bazaar_data::FetchClient;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::{error_text, fetch_seller, lock, products_from};
use crate::config::CatalogConfig;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct StorefrontState {
    /// Vendor the state below belongs to.
    pub vendor_id: Option<VendorId>,
    pub seller: Option<Seller>,
    pub products: Vec<Product>,
    pub cursor: Cursor,
    pub loading: bool,
    pub follower_count: usize,
    pub is_following: bool,
    pub error: Option<String>,
}

impl StorefrontState {
    fn new(page_size: u32) -> Self {
        Self {
            vendor_id: None,
            seller: None,
            products: Vec::new(),
            cursor: Cursor::new(page_size),
            loading: false,
            follower_count: 0,
            is_following: false,
            error: None,
        }
    }

    /// Drop everything when switching to another vendor.
    fn switch_to(&mut self, vendor: &VendorId) {
        if self.vendor_id.as_ref() != Some(vendor) {
            *self = Self::new(self.cursor.limit);
            self.vendor_id = Some(vendor.clone());
        }
    }
}

/// Storefront of one vendor at a time.
#[derive(Debug, Clone)]
pub struct StorefrontStore {
    client: FetchClient,
    state: Arc<Mutex<StorefrontState>>,
}

impl StorefrontStore {
    pub fn new(client: FetchClient, config: &CatalogConfig) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(StorefrontState::new(config.page_size))),
        }
    }

    pub fn state(&self) -> StorefrontState {
        lock(&self.state).clone()
    }

    pub fn seller(&self) -> Option<Seller> {
        lock(&self.state).seller.clone()
    }

    pub fn products(&self) -> Vec<Product> {
        lock(&self.state).products.clone()
    }

    pub fn has_more(&self) -> bool {
        lock(&self.state).cursor.has_more
    }

    pub fn follower_count(&self) -> usize {
        lock(&self.state).follower_count
    }

    pub fn is_following(&self) -> bool {
        lock(&self.state).is_following
    }

    /// `GET /vendor/:id/details`. `viewer` decides the following flag.
    pub async fn fetch_seller(&self, vendor: &VendorId, viewer: Option<&UserId>) -> Result<Seller> {
        lock(&self.state).switch_to(vendor);
        let seller = match fetch_seller(&self.client, vendor).await {
            Ok(seller) => seller,
            Err(e) => {
                warn!(%vendor, error = %e, "failed to fetch seller");
                lock(&self.state).error = Some(error_text(&e, "Failed to load seller."));
                return Err(e.into());
            }
        };

        let mut state = lock(&self.state);
        if state.vendor_id.as_ref() == Some(vendor) {
            state.follower_count = seller.follower_count();
            state.is_following = viewer.is_some_and(|u| seller.is_followed_by(u));
            state.seller = Some(seller.clone());
            state.error = None;
        }
        Ok(seller)
    }

    /// Next page of `GET /products/vendor/:id?limit&skip`.
    ///
    /// `reset` starts over from the first page. Returns the number of
    /// products received; zero without a request while loading or once the
    /// last page has been seen.
    pub async fn fetch_products(&self, vendor: &VendorId, reset: bool) -> Result<usize> {
        let query = {
            let mut state = lock(&self.state);
            state.switch_to(vendor);
            if reset {
                state.cursor.reset();
                state.products.clear();
            }
            if state.loading || !state.cursor.has_more {
                return Ok(0);
            }
            state.loading = true;
            state.cursor.query()
        };

        let result = match self
            .client
            .get(format!("/products/vendor/{vendor}"))
            .query(query)
            .fetch::<Value>()
            .await
        {
            Ok(body) => products_from(&body),
            Err(e) => Err(e),
        };

        let mut state = lock(&self.state);
        state.loading = false;
        if state.vendor_id.as_ref() != Some(vendor) {
            return Ok(0);
        }
        match result {
            Ok(batch) => {
                let received = batch.len();
                state.cursor.advance(received);
                state.products.extend(batch);
                debug!(%vendor, received, "storefront products loaded");
                Ok(received)
            }
            Err(e) => {
                warn!(%vendor, error = %e, "failed to fetch storefront products");
                state.error = Some(error_text(&e, "Failed to fetch products."));
                Err(e.into())
            }
        }
    }

    /// `POST /vendor/follow/:id`, which toggles server-side.
    ///
    /// Returns the new following state. Nothing changes locally on failure.
    pub async fn toggle_follow(&self, vendor: &VendorId, viewer: &UserId) -> Result<bool> {
        self.client
            .post(format!("/vendor/follow/{vendor}"))
            .json(&json!({}))?
            .execute()
            .await
            .inspect_err(|e| warn!(%vendor, error = %e, "follow toggle failed"))?;

        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if state.vendor_id.as_ref() != Some(vendor) {
            return Ok(!state.is_following);
        }
        let following = match state.seller.as_mut() {
            Some(seller) => {
                let following = seller.toggle_follower(viewer);
                state.follower_count = seller.follower_count();
                following
            }
            None => {
                let following = !state.is_following;
                state.follower_count = if following {
                    state.follower_count + 1
                } else {
                    state.follower_count.saturating_sub(1)
                };
                following
            }
        };
        state.is_following = following;
        info!(%vendor, following, "follow toggled");
        Ok(following)
    }
}
