//! Vendor dashboard: the signed-in vendor's profile and product editor.
//!
//! Option edits are optimistic. The product is snapshotted, changed locally
//! and its aggregates recomputed before the server call; a failed call puts
//! the snapshot back and raises an error notice. After a successful call the
//! aggregates are persisted (best effort) and the product is re-read from the
//! server.

use std::sync::{Arc, Mutex};

use bazaar_commerce::catalog::{
    normalize_product, sort_options_by_created, sort_products_by_created, NewOption, NewProduct,
    OptionPatch, Product,
};
use bazaar_commerce::ids::{OptionId, ProductId};
use bazaar_commerce::sort::SortDirection;
use bazaar_commerce::vendor::{MonthlyRevenueComparison, VendorProfile};
use bazaar_commerce::CommerceError;
use bazaar_data::upload::{is_data_url, upload_image, ImageFile};
use bazaar_data::{FetchClient, FetchError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::{self, lock};
use crate::notice::Notifier;
use crate::optimistic::{MutationId, MutationState, Optimistic};
use crate::Result;

const UPLOAD_PATH: &str = "/upload";

/// Base product fields a vendor may edit. `None` fields are left out of the
/// request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hot: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorCatalogState {
    pub vendor: Option<VendorProfile>,
    pub products: Vec<Product>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Product editor for the signed-in vendor.
#[derive(Clone)]
pub struct VendorCatalogStore {
    client: FetchClient,
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<VendorCatalogState>>,
    mutations: Arc<Mutex<Optimistic<ProductId, Product>>>,
}

impl std::fmt::Debug for VendorCatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorCatalogStore")
            .field("products", &lock(&self.state).products.len())
            .finish()
    }
}

impl VendorCatalogStore {
    pub fn new(client: FetchClient, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            client,
            notifier,
            state: Arc::new(Mutex::new(VendorCatalogState::default())),
            mutations: Arc::new(Mutex::new(Optimistic::new())),
        }
    }

    pub fn state(&self) -> VendorCatalogState {
        lock(&self.state).clone()
    }

    pub fn products(&self) -> Vec<Product> {
        lock(&self.state).products.clone()
    }

    pub fn product(&self, id: &ProductId) -> Option<Product> {
        lock(&self.state).products.iter().find(|p| &p.id == id).cloned()
    }

    pub fn vendor(&self) -> Option<VendorProfile> {
        lock(&self.state).vendor.clone()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn is_approved(&self) -> bool {
        lock(&self.state)
            .vendor
            .as_ref()
            .is_some_and(|v| v.is_approved)
    }

    pub fn vendor_name(&self) -> String {
        lock(&self.state)
            .vendor
            .as_ref()
            .map(|v| v.store_name.clone())
            .unwrap_or_default()
    }

    pub fn revenue_this_month(&self) -> f64 {
        lock(&self.state)
            .vendor
            .as_ref()
            .map_or(0.0, |v| v.current_monthly_revenue)
    }

    pub fn revenue_comparison(&self) -> Vec<MonthlyRevenueComparison> {
        lock(&self.state)
            .vendor
            .as_ref()
            .map(|v| v.monthly_revenue_comparison.clone())
            .unwrap_or_default()
    }

    pub fn mutation_state(&self, id: &ProductId) -> MutationState {
        lock(&self.mutations).state(id)
    }

    /// `GET /vendor`, then the vendor's products sorted by creation time.
    pub async fn fetch_vendor(&self, dir: SortDirection) -> Result<()> {
        {
            let mut state = lock(&self.state);
            state.loading = true;
            state.error = None;
        }
        let result = self.load_vendor(dir).await;
        let mut state = lock(&self.state);
        state.loading = false;
        match result {
            Ok((vendor, products)) => {
                debug!(vendor = %vendor.store_name, products = products.len(), "vendor loaded");
                state.vendor = Some(vendor);
                state.products = products;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to load vendor");
                state.error = Some(api::error_text(&e, "Failed to load vendor"));
                Err(e.into())
            }
        }
    }

    async fn load_vendor(
        &self,
        dir: SortDirection,
    ) -> std::result::Result<(VendorProfile, Vec<Product>), FetchError> {
        let vendor: VendorProfile = self.client.get("/vendor").fetch().await?;
        if vendor.user_id.is_empty() {
            return Ok((vendor, Vec::new()));
        }
        let body: Value = self
            .client
            .get(format!("/products/vendor/{}", vendor.user_id))
            .fetch()
            .await?;
        let mut products = api::products_from(&body)?;
        sort_products_by_created(&mut products, dir);
        Ok((vendor, products))
    }

    /// Re-read one product from the server and replace the local copy.
    /// Unknown products are added and the list re-sorted newest first.
    pub async fn refresh_product(&self, id: &ProductId) -> Result<Product> {
        let product = api::fetch_product(&self.client, id).await?;
        self.store_product(product.clone());
        Ok(product)
    }

    fn store_product(&self, product: Product) {
        let mut state = lock(&self.state);
        match state.products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product,
            None => {
                state.products.push(product);
                sort_products_by_created(&mut state.products, SortDirection::Desc);
            }
        }
    }

    async fn refresh_quietly(&self, id: &ProductId) {
        if let Err(e) = self.refresh_product(id).await {
            warn!(product = %id, error = %e, "failed to refresh product");
        }
    }

    /// Recompute the product's stock and sold figures from its options and,
    /// with `persist`, write them back. A failed write is only logged.
    async fn sync_derived(&self, id: &ProductId, persist: bool) {
        let totals = {
            let mut state = lock(&self.state);
            let Some(product) = state.products.iter_mut().find(|p| &p.id == id) else {
                return;
            };
            product.recompute_aggregates();
            (product.stock, product.sold)
        };
        if !persist {
            return;
        }
        let sent = match self
            .client
            .put(format!("/products/{id}"))
            .json(&json!({ "stock": totals.0, "sold": totals.1 }))
        {
            Ok(request) => request.execute().await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            warn!(product = %id, error = %e, "failed to persist product aggregates");
        }
    }

    /// Upload an inline `data:image/...` URL and return the hosted URL.
    /// Other values are returned unchanged.
    async fn hosted_image(
        &self,
        image_url: &str,
        product_id: &ProductId,
        option_id: Option<&OptionId>,
    ) -> std::result::Result<String, FetchError> {
        if !is_data_url(image_url) {
            return Ok(image_url.to_string());
        }
        let file = ImageFile::from_data_url(image_url, "option-image")?;
        let mut fields = vec![("productId", product_id.as_str())];
        if let Some(option_id) = option_id {
            fields.push(("optionId", option_id.as_str()));
        }
        upload_image(&self.client, UPLOAD_PATH, file, &fields).await
    }

    fn snapshot(&self, id: &ProductId) -> Result<MutationId> {
        let product = self
            .product(id)
            .ok_or_else(|| CommerceError::ProductNotFound(id.to_string()))?;
        Ok(lock(&self.mutations).begin(id.clone(), product))
    }

    fn restore(&self, id: &ProductId, ticket: MutationId) {
        let snapshot = lock(&self.mutations).rollback(id, ticket);
        if let Some(product) = snapshot {
            self.store_product(product);
        }
    }

    fn edit_local(&self, id: &ProductId, edit: impl FnOnce(&mut Product)) {
        let mut state = lock(&self.state);
        if let Some(product) = state.products.iter_mut().find(|p| &p.id == id) {
            edit(product);
            product.recompute_aggregates();
        }
    }

    /// Add an option to a product.
    ///
    /// An inline image is uploaded first; if that fails nothing else is
    /// sent. The new option shows up at once under a temporary id.
    pub async fn add_option(&self, product_id: &ProductId, option: NewOption) -> Result<Product> {
        if self.product(product_id).is_none() {
            return Err(CommerceError::ProductNotFound(product_id.to_string()).into());
        }

        let mut option = option;
        match self.hosted_image(&option.image_url, product_id, None).await {
            Ok(url) => option.image_url = url,
            Err(e) => {
                warn!(product = %product_id, error = %e, "option image upload failed");
                self.notifier.error("Option image upload failed.");
                return Err(e.into());
            }
        }
        let payload = option.normalized();

        let ticket = self.snapshot(product_id)?;
        let pending = payload.to_pending_option();
        self.edit_local(product_id, |p| p.option.push(pending));

        let response = match self.client.post(format!("/products/{product_id}/options")).json(&payload) {
            Ok(request) => request.fetch::<Value>().await,
            Err(e) => Err(e),
        };
        match response {
            Ok(body) => {
                self.sync_derived(product_id, true).await;
                match body.get("product").filter(|p| p.is_object()) {
                    Some(raw) => self.store_product(normalize_product(raw)),
                    None => self.refresh_quietly(product_id).await,
                }
                lock(&self.mutations).commit(product_id, ticket);
                self.notifier.success("Option added successfully!");
                info!(product = %product_id, "option added");
                self.product(product_id)
                    .ok_or_else(|| CommerceError::ProductNotFound(product_id.to_string()).into())
            }
            Err(e) => {
                warn!(product = %product_id, error = %e, "failed to add option");
                self.restore(product_id, ticket);
                self.notifier.error("Failed to add option. Please try again!");
                Err(e.into())
            }
        }
    }

    /// Edit one option with `PATCH /products/:id/options/:optionId`.
    pub async fn update_option(
        &self,
        product_id: &ProductId,
        option_id: &OptionId,
        patch: OptionPatch,
    ) -> Result<Product> {
        let current = self
            .product(product_id)
            .ok_or_else(|| CommerceError::ProductNotFound(product_id.to_string()))?;
        if current.find_option(option_id).is_none() {
            return Err(CommerceError::OptionNotFound(option_id.to_string()).into());
        }

        let mut patch = patch.normalized();
        if let Some(url) = patch.image_url.take() {
            match self.hosted_image(&url, product_id, Some(option_id)).await {
                Ok(hosted) => patch.image_url = Some(hosted),
                Err(e) => {
                    warn!(product = %product_id, option = %option_id, error = %e, "option image upload failed");
                    self.notifier.error("Image upload failed. Update aborted.");
                    return Err(e.into());
                }
            }
        }

        let ticket = self.snapshot(product_id)?;
        self.edit_local(product_id, |p| {
            if let Some(opt) = p.find_option_mut(option_id) {
                patch.apply_to(opt);
            }
        });

        let path = format!("/products/{product_id}/options/{option_id}");
        let sent = match self.client.patch(path).json(&patch) {
            Ok(request) => request.execute().await.map(|_| ()),
            Err(e) => Err(e),
        };
        match sent {
            Ok(()) => {
                self.sync_derived(product_id, true).await;
                self.refresh_quietly(product_id).await;
                lock(&self.mutations).commit(product_id, ticket);
                self.notifier.success("Product option updated!");
                info!(product = %product_id, option = %option_id, "option updated");
                self.product(product_id)
                    .ok_or_else(|| CommerceError::ProductNotFound(product_id.to_string()).into())
            }
            Err(e) => {
                warn!(product = %product_id, option = %option_id, error = %e, "failed to update option");
                self.restore(product_id, ticket);
                self.notifier.error(&status_message("Product option update failed!", &e));
                Err(e.into())
            }
        }
    }

    /// Remove one option with `DELETE /products/:id/options/:optionId`.
    pub async fn delete_option(&self, product_id: &ProductId, option_id: &OptionId) -> Result<()> {
        let current = self
            .product(product_id)
            .ok_or_else(|| CommerceError::ProductNotFound(product_id.to_string()))?;
        if current.find_option(option_id).is_none() {
            return Err(CommerceError::OptionNotFound(option_id.to_string()).into());
        }

        let ticket = self.snapshot(product_id)?;
        self.edit_local(product_id, |p| p.option.retain(|o| &o.id != option_id));

        let sent = self
            .client
            .delete(format!("/products/{product_id}/options/{option_id}"))
            .execute()
            .await;
        match sent {
            Ok(_) => {
                self.sync_derived(product_id, true).await;
                self.refresh_quietly(product_id).await;
                lock(&self.mutations).commit(product_id, ticket);
                self.notifier.success("Product Successfully Deleted!");
                info!(product = %product_id, option = %option_id, "option deleted");
                Ok(())
            }
            Err(e) => {
                warn!(product = %product_id, option = %option_id, error = %e, "failed to delete option");
                self.restore(product_id, ticket);
                self.notifier.error("Product Delete Failed!");
                Err(e.into())
            }
        }
    }

    /// `PUT /products/:id` with the changed base fields, then re-read it.
    pub async fn update_base_product(&self, id: &ProductId, update: &ProductUpdate) -> Result<()> {
        let sent = match self.client.put(format!("/products/{id}")).json(update) {
            Ok(request) => request.execute().await,
            Err(e) => Err(e),
        };
        match sent {
            Ok(_) => {
                self.refresh_quietly(id).await;
                self.notifier.success("Product successfully updated!");
                Ok(())
            }
            Err(e) => {
                warn!(product = %id, error = %e, "product update failed");
                self.notifier.error(&status_message("Product update failed!", &e));
                Err(e.into())
            }
        }
    }

    /// `POST /products`, then reload the vendor's products.
    pub async fn create_product(&self, product: NewProduct) -> Result<()> {
        let mut product = product;
        product.option = product.option.into_iter().map(NewOption::normalized).collect();
        product.derive_from_options();
        self.client.post("/products").json(&product)?.execute().await?;
        info!(name = %product.name, "product created");
        self.fetch_vendor(SortDirection::Desc).await
    }

    /// `DELETE /products/:id`.
    pub async fn delete_product(&self, id: &ProductId) -> Result<()> {
        match self.client.delete(format!("/products/{id}")).execute().await {
            Ok(_) => {
                lock(&self.state).products.retain(|p| &p.id != id);
                self.notifier.success("Product Successfully Deleted!");
                Ok(())
            }
            Err(e) => {
                warn!(product = %id, error = %e, "failed to delete product");
                self.notifier.error("Product Delete Failed!");
                Err(e.into())
            }
        }
    }

    /// `PATCH /products/:id/:optionId/stock {delta}`; returns the server's
    /// response body.
    pub async fn adjust_stock(
        &self,
        product_id: &ProductId,
        option_id: &OptionId,
        delta: i64,
    ) -> Result<Value> {
        let body = self
            .client
            .patch(format!("/products/{product_id}/{option_id}/stock"))
            .json(&json!({ "delta": delta }))?
            .fetch::<Value>()
            .await
            .inspect_err(|e| warn!(product = %product_id, option = %option_id, error = %e, "error adjusting product stock"))?;
        Ok(body)
    }

    /// Re-sort products and each product's options by creation time.
    pub fn resort(&self, dir: SortDirection) {
        let mut state = lock(&self.state);
        sort_products_by_created(&mut state.products, dir);
        for product in &mut state.products {
            sort_options_by_created(&mut product.option, dir);
        }
    }

    pub fn clear(&self) {
        *lock(&self.state) = VendorCatalogState::default();
        lock(&self.mutations).clear();
    }
}

fn status_message(prefix: &str, error: &FetchError) -> String {
    match error.status() {
        Some(status) => format!("{prefix} {status}"),
        None => prefix.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeLog;
    use bazaar_data::mock::MockBackend;
    use bazaar_data::{FetchPolicy, Method};
    use std::time::Duration;

    const PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn raw_product(id: &str, created: &str, options: Value) -> Value {
        json!({
            "_id": id,
            "name": format!("Product {id}"),
            "price": 100,
            "stock": 99,
            "createdAt": created,
            "option": options,
        })
    }

    fn mock_vendor() -> MockBackend {
        let mock = MockBackend::new();
        mock.on(
            Method::Get,
            "/vendor",
            200,
            json!({"_id": "v1", "userId": "u1", "storeName": "Farm Fresh", "isApproved": true, "currentMonthlyRevenue": 1200.5}),
        );
        mock.on(
            Method::Get,
            "/products/vendor/u1",
            200,
            json!([
                raw_product("p1", "2024-01-01T00:00:00Z", json!([{"_id": "o1", "stock": 4, "sold": 1, "price": 50}])),
                raw_product("p2", "2024-03-01T00:00:00Z", json!([])),
            ]),
        );
        mock.on(Method::Put, "/products/:id", 200, json!({}));
        mock.on(
            Method::Get,
            "/products/p1",
            200,
            raw_product("p1", "2024-01-01T00:00:00Z", json!([
                {"_id": "o1", "stock": 4, "sold": 1, "price": 50, "createdAt": "2024-01-01T00:00:00Z"},
                {"_id": "o2", "stock": 6, "sold": 0, "price": 70, "label": "Large", "createdAt": "2024-02-01T00:00:00Z"},
            ])),
        );
        mock
    }

    async fn loaded(mock: &MockBackend) -> (VendorCatalogStore, NoticeLog) {
        let client = FetchClient::new(Arc::new(mock.clone()))
            .with_policy(FetchPolicy::single_attempt(Duration::from_secs(5)));
        let log = NoticeLog::new();
        let store = VendorCatalogStore::new(client, Arc::new(log.clone()));
        store.fetch_vendor(SortDirection::Desc).await.unwrap();
        (store, log)
    }

    fn p(id: &str) -> ProductId {
        ProductId::new(id)
    }

    #[tokio::test]
    async fn test_fetch_vendor_sorts_and_normalizes() {
        let mock = mock_vendor();
        let (store, _) = loaded(&mock).await;

        assert!(store.is_approved());
        assert_eq!(store.vendor_name(), "Farm Fresh");
        assert_eq!(store.revenue_this_month(), 1200.5);
        let products = store.products();
        assert_eq!(products[0].id, p("p2"));
        assert_eq!(products[1].stock, 4);
        assert!(products[1].is_option);
        assert!(!products[0].is_option);

        store.resort(SortDirection::Asc);
        assert_eq!(store.products()[0].id, p("p1"));
    }

    #[tokio::test]
    async fn test_vendor_without_user_has_no_products() {
        let mock = mock_vendor();
        mock.on(Method::Get, "/vendor", 200, json!({"storeName": "New"}));
        let (store, _) = loaded(&mock).await;
        assert!(store.products().is_empty());
        assert_eq!(mock.count(Method::Get, "/products/vendor/:id"), 0);
    }

    #[tokio::test]
    async fn test_fetch_vendor_failure_sets_error() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/vendor", 401, json!({"message": "Not a vendor"}));
        let client = FetchClient::new(Arc::new(mock.clone()));
        let store = VendorCatalogStore::new(client, Arc::new(NoticeLog::new()));
        assert!(store.fetch_vendor(SortDirection::Desc).await.is_err());
        assert_eq!(store.error().as_deref(), Some("Not a vendor"));
        assert!(!store.state().loading);
    }

    #[tokio::test]
    async fn test_add_option_commits_and_refreshes() {
        let mock = mock_vendor();
        mock.on(Method::Post, "/products/:id/options", 201, json!({"message": "ok"}));
        let (store, log) = loaded(&mock).await;

        let option = NewOption {
            price: 70.0,
            label: Some("  large".into()),
            stock: 6,
            ..Default::default()
        };
        let product = store.add_option(&p("p1"), option).await.unwrap();
        assert_eq!(product.option.len(), 2);
        assert_eq!(product.stock, 10);
        assert_eq!(store.mutation_state(&p("p1")), MutationState::Committed);

        let sent = mock.calls_to(Method::Post, "/products/:id/options")[0].body.clone().unwrap();
        assert_eq!(sent["label"], "Large");
        let persisted = mock.calls_to(Method::Put, "/products/:id")[0].body.clone().unwrap();
        assert_eq!(persisted, json!({"stock": 10, "sold": 1}));
        assert_eq!(log.notices()[0].message, "Option added successfully!");
    }

    #[tokio::test]
    async fn test_add_option_uses_product_in_response() {
        let mock = mock_vendor();
        mock.on(
            Method::Post,
            "/products/:id/options",
            201,
            json!({"product": raw_product("p1", "2024-01-01T00:00:00Z", json!([{"_id": "real", "stock": 2}]))}),
        );
        let (store, _) = loaded(&mock).await;
        let product = store.add_option(&p("p1"), NewOption::default()).await.unwrap();
        assert_eq!(product.option[0].id.as_str(), "real");
        assert_eq!(mock.count(Method::Get, "/products/p1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_add_option_is_shown_then_reverted() {
        let mock = mock_vendor();
        mock.fail(
            Method::Post,
            "/products/:id/options",
            FetchError::Connection("offline".into()),
        );
        let (store, log) = loaded(&mock).await;
        let before = store.product(&p("p1")).unwrap();

        let mock = mock.with_delay(Duration::from_millis(100));
        let task = {
            let store = store.clone();
            tokio::spawn(async move {
                let option = NewOption {
                    stock: 5,
                    ..Default::default()
                };
                store.add_option(&p("p1"), option).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let during = store.product(&p("p1")).unwrap();
        assert_eq!(during.option.len(), 2);
        assert!(during.option[1].id.is_temporary());
        assert_eq!(during.stock, 9);
        assert!(store.mutation_state(&p("p1")) == MutationState::Pending);

        assert!(task.await.unwrap().is_err());
        assert_eq!(store.product(&p("p1")).unwrap(), before);
        assert_eq!(store.mutation_state(&p("p1")), MutationState::RolledBack);
        assert_eq!(log.errors(), vec!["Failed to add option. Please try again!".to_string()]);
        assert_eq!(mock.count(Method::Put, "/products/:id"), 0);
    }

    #[tokio::test]
    async fn test_inline_image_failure_aborts_before_write() {
        let mock = mock_vendor();
        mock.on(Method::Post, "/upload", 200, json!({"ok": true}));
        let (store, log) = loaded(&mock).await;

        let option = NewOption {
            image_url: PNG.into(),
            ..Default::default()
        };
        let err = store.add_option(&p("p1"), option).await.unwrap_err();
        assert!(matches!(err, crate::SdkError::Fetch(FetchError::Upload(_))));
        assert_eq!(mock.count(Method::Post, "/products/:id/options"), 0);
        assert_eq!(store.product(&p("p1")).unwrap().option.len(), 1);
        assert_eq!(log.errors(), vec!["Option image upload failed.".to_string()]);
    }

    #[tokio::test]
    async fn test_update_option_uploads_inline_image() {
        let mock = mock_vendor();
        mock.on(Method::Post, "/upload", 200, json!({"secure_url": "https://cdn/x.png"}));
        mock.on(Method::Patch, "/products/:id/options/:option", 200, json!({}));
        let (store, _) = loaded(&mock).await;

        let patch = OptionPatch {
            image_url: Some(PNG.into()),
            label: Some("small".into()),
            ..Default::default()
        };
        store.update_option(&p("p1"), &OptionId::new("o1"), patch).await.unwrap();

        let upload = &mock.calls_to(Method::Post, "/upload")[0];
        assert_eq!(upload.parts, vec!["images", "productId", "optionId"]);
        let sent = mock.calls_to(Method::Patch, "/products/:id/options/:option")[0]
            .body
            .clone()
            .unwrap();
        assert_eq!(sent, json!({"imageUrl": "https://cdn/x.png", "label": "Small"}));
    }

    #[tokio::test]
    async fn test_update_option_failure_restores_snapshot() {
        let mock = mock_vendor();
        mock.on(Method::Patch, "/products/:id/options/:option", 422, json!({"message": "bad"}));
        let (store, log) = loaded(&mock).await;
        let before = store.product(&p("p1")).unwrap();

        let patch = OptionPatch {
            stock: Some(40),
            ..Default::default()
        };
        assert!(store.update_option(&p("p1"), &OptionId::new("o1"), patch).await.is_err());
        assert_eq!(store.product(&p("p1")).unwrap(), before);
        assert_eq!(log.errors(), vec!["Product option update failed! 422".to_string()]);

        let missing = store
            .update_option(&p("p1"), &OptionId::new("nope"), OptionPatch::default())
            .await
            .unwrap_err();
        assert!(missing.is_local());
    }

    #[tokio::test]
    async fn test_delete_option_and_product() {
        let mock = mock_vendor();
        mock.on(Method::Delete, "/products/:id/options/:option", 200, json!({}));
        mock.on(Method::Delete, "/products/:id", 200, json!({}));
        mock.on(Method::Get, "/products/p1", 200, raw_product("p1", "2024-01-01T00:00:00Z", json!([])));
        let (store, _) = loaded(&mock).await;

        store.delete_option(&p("p1"), &OptionId::new("o1")).await.unwrap();
        let product = store.product(&p("p1")).unwrap();
        assert!(product.option.is_empty());
        assert!(!product.is_option);

        store.delete_product(&p("p2")).await.unwrap();
        assert!(store.product(&p("p2")).is_none());
    }

    #[tokio::test]
    async fn test_create_product_derives_from_options() {
        let mock = mock_vendor();
        mock.on(Method::Post, "/products", 201, json!({}));
        let (store, _) = loaded(&mock).await;

        let product = NewProduct {
            name: "Honey".into(),
            option: vec![
                NewOption {
                    image_url: "a.png".into(),
                    stock: 2,
                    ..Default::default()
                },
                NewOption {
                    image_url: "b.png".into(),
                    stock: 3,
                    sold: 1,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        store.create_product(product).await.unwrap();

        let sent = mock.calls_to(Method::Post, "/products")[0].body.clone().unwrap();
        assert_eq!(sent["imageUrls"], json!(["a.png", "b.png"]));
        assert_eq!(sent["stock"], 5);
        assert_eq!(sent["sold"], 1);
        assert_eq!(mock.count(Method::Get, "/vendor"), 2);
    }

    #[tokio::test]
    async fn test_update_base_product_and_adjust_stock() {
        let mock = mock_vendor();
        mock.on(Method::Patch, "/products/:id/:option/stock", 200, json!({"stock": 7}));
        let (store, log) = loaded(&mock).await;

        let update = ProductUpdate {
            name: Some("Mangoes".into()),
            ..Default::default()
        };
        store.update_base_product(&p("p1"), &update).await.unwrap();
        let sent = mock.calls_to(Method::Put, "/products/:id")[0].body.clone().unwrap();
        assert_eq!(sent, json!({"name": "Mangoes"}));
        assert_eq!(store.product(&p("p1")).unwrap().option.len(), 2);
        assert_eq!(log.notices()[0].message, "Product successfully updated!");

        let body = store.adjust_stock(&p("p1"), &OptionId::new("o1"), -2).await.unwrap();
        assert_eq!(body["stock"], 7);

        store.clear();
        assert!(store.vendor().is_none());
        assert!(store.products().is_empty());
    }
}
