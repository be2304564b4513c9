//! The per-session context that owns every store.

use std::sync::Arc;

use bazaar_auth::SessionStore;
use bazaar_data::{FetchClient, HttpBackend};
use tracing::{debug, info};

use crate::cart::CartStore;
use crate::catalog::CatalogStore;
use crate::config::ClientConfig;
use crate::notice::{Notifier, TracingNotifier};
use crate::orders::OrdersStore;
use crate::profile::ProfileStore;
use crate::storefront::StorefrontStore;
use crate::upload::UploaderStore;
use crate::vendor_catalog::VendorCatalogStore;
use crate::vendor_orders::VendorOrdersStore;
use crate::Result;

/// Builder for [`Marketplace`].
///
/// # Example
///
/// ```rust,ignore
/// let market = Marketplace::builder(ClientConfig::default())
///     .with_notifier(Arc::new(NoticeLog::new()))
///     .build()?;
///
/// market.session().fetch_session(false).await;
/// market.cart().load().await?;
/// ```
pub struct MarketplaceBuilder {
    config: ClientConfig,
    backend: Option<Arc<dyn HttpBackend>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl MarketplaceBuilder {
    /// Send requests through `backend` instead of reqwest.
    pub fn with_backend(mut self, backend: Arc<dyn HttpBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Where user-visible notices go. Defaults to the log.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<Marketplace> {
        let config = self.config;
        let policy = config.api.fetch_policy();
        let base = match self.backend {
            Some(backend) => FetchClient::new(backend).with_policy(policy),
            None => FetchClient::reqwest(policy)?,
        }
        .with_base_url(config.api.base_url.clone());

        // The session check and login go out unauthenticated; everything
        // else carries the session's bearer token.
        let session = SessionStore::new(base.clone());
        let client = base.with_token_source(Arc::new(session.clone()));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier));

        debug!(base_url = %config.api.base_url, "marketplace context built");
        Ok(Marketplace {
            cart: CartStore::new(client.clone(), config.cart.clone()),
            catalog: CatalogStore::new(client.clone(), config.catalog.clone()),
            vendor_catalog: VendorCatalogStore::new(client.clone(), notifier.clone()),
            vendor_orders: VendorOrdersStore::new(
                client.clone(),
                config.orders.clone(),
                notifier.clone(),
            ),
            orders: OrdersStore::new(client.clone(), notifier.clone()),
            storefront: StorefrontStore::new(client.clone(), &config.catalog),
            profile: ProfileStore::new(client.clone()),
            uploader: UploaderStore::new(client.clone()),
            session,
            client,
            notifier,
            config,
        })
    }
}

/// Every store for one signed-in (or anonymous) session.
///
/// Cheap to clone; clones share all store state.
#[derive(Clone)]
pub struct Marketplace {
    config: ClientConfig,
    client: FetchClient,
    notifier: Arc<dyn Notifier>,
    session: SessionStore,
    cart: CartStore,
    catalog: CatalogStore,
    vendor_catalog: VendorCatalogStore,
    vendor_orders: VendorOrdersStore,
    orders: OrdersStore,
    storefront: StorefrontStore,
    profile: ProfileStore,
    uploader: UploaderStore,
}

impl std::fmt::Debug for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marketplace")
            .field("client", &self.client)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Marketplace {
    pub fn builder(config: ClientConfig) -> MarketplaceBuilder {
        MarketplaceBuilder {
            config,
            backend: None,
            notifier: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Authenticated API client shared by the stores.
    pub fn client(&self) -> &FetchClient {
        &self.client
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn vendor_catalog(&self) -> &VendorCatalogStore {
        &self.vendor_catalog
    }

    pub fn vendor_orders(&self) -> &VendorOrdersStore {
        &self.vendor_orders
    }

    pub fn orders(&self) -> &OrdersStore {
        &self.orders
    }

    pub fn storefront(&self) -> &StorefrontStore {
        &self.storefront
    }

    pub fn profile(&self) -> &ProfileStore {
        &self.profile
    }

    pub fn uploader(&self) -> &UploaderStore {
        &self.uploader
    }

    /// Log out and drop everything tied to the user.
    ///
    /// Catalog and storefront data are public and kept.
    pub async fn sign_out(&self) {
        self.session.logout().await;
        self.cart.reset();
        self.orders.clear();
        self.profile.clear();
        self.vendor_catalog.clear();
        self.vendor_orders.reset();
        self.uploader.clear_results();
        info!("signed out");
    }
}
