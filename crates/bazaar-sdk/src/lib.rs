//! Stateful stores for the Bazaar marketplace storefront client.
//!
//! A [`Marketplace`] is built once per session and owns one of each store:
//!
//! - [`CartStore`] - multi-vendor cart aggregation, selection, debounced
//!   quantity sync
//! - [`CatalogStore`] - product listing, search, suggestions, product detail
//! - [`VendorCatalogStore`] - a vendor's products and their options, with
//!   optimistic edits
//! - [`VendorOrdersStore`] - the vendor order table: filters, pages, status
//!   and shipping updates
//! - [`OrdersStore`] - the customer's orders and rider tracking
//! - [`StorefrontStore`], [`ProfileStore`], [`UploaderStore`]
//!
//! User-visible outcomes of mutations are reported through a [`Notifier`].
//!
//! # Example
//!
//! ```rust,ignore
//! use bazaar_sdk::prelude::*;
//!
//! let mut config = ClientConfig::load("bazaar.toml")?;
//! config.apply_env()?;
//! let market = Marketplace::builder(config).build()?;
//!
//! market.cart().load().await?;
//! let summary = market.cart().summary();
//! println!("{} selected, total {}", summary.selected_count, summary.total);
//! ```

mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
mod marketplace;
pub mod notice;
pub mod optimistic;
pub mod orders;
pub mod profile;
pub mod storefront;
pub mod upload;
pub mod vendor_catalog;
pub mod vendor_orders;

pub use cart::{CartState, CartStore};
pub use catalog::{CatalogState, CatalogStore, Suggestion};
pub use config::{ClientConfig, ConfigError};
pub use error::{Result, SdkError};
pub use marketplace::{Marketplace, MarketplaceBuilder};
pub use notice::{Notice, NoticeLevel, NoticeLog, Notifier, TracingNotifier};
pub use optimistic::{MutationId, MutationState};
pub use orders::OrdersStore;
pub use profile::{ProfileStore, ProfileUpdate};
pub use storefront::StorefrontStore;
pub use upload::UploaderStore;
pub use vendor_catalog::{ProductUpdate, VendorCatalogStore};
pub use vendor_orders::{FetchOptions, VendorOrdersStore};

pub use bazaar_auth as auth;
pub use bazaar_commerce as commerce;
pub use bazaar_data as data;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        CartStore, CatalogStore, ClientConfig, FetchOptions, Marketplace, Notifier, OrdersStore,
        ProfileStore, ProfileUpdate, Result, SdkError, StorefrontStore, UploaderStore,
        VendorCatalogStore, VendorOrdersStore,
    };
    pub use bazaar_auth::{Role, SessionStore, User};
    pub use bazaar_commerce::prelude::*;
}
