//! Product catalog store.
//!
//! Browsing is offset paginated: each page is appended and the cursor moves
//! forward by one page size until the server returns a short page. The
//! listing endpoint depends on the category and region filters:
//!
//! | category | region | endpoint |
//! |----------|--------|----------|
//! | `all`    | `all`  | `GET /products` |
//! | set      | `all`  | `GET /products/category/:category` |
//! | any      | set    | `GET /products/municipality/:region?category=` |

use std::sync::{Arc, Mutex};

use bazaar_commerce::catalog::{category_facets, Cursor, Product, ProductSort, ALL};
use bazaar_commerce::ids::ProductId;
use bazaar_commerce::vendor::Seller;
use bazaar_data::{FetchClient, FetchError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{self, lock};
use crate::config::CatalogConfig;
use crate::Result;

const FETCH_FAILED: &str = "Failed to fetch products.";
const SUGGESTION_LIMIT: u32 = 15;

/// Search-as-you-type entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub rating: Option<f64>,
}

impl Suggestion {
    fn from_raw(raw: &Value) -> Option<Self> {
        let text = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        let id = text("id").or_else(|| text("_id"))?;
        Some(Self {
            id,
            name: text("name").or_else(|| text("title")).unwrap_or_default(),
            price: raw.get("price").and_then(Value::as_f64).unwrap_or(0.0),
            image_url: raw
                .get("imageUrls")
                .and_then(|urls| urls.get(0))
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| text("imageUrl")),
            category: raw
                .get("categories")
                .and_then(|c| c.get(0))
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| text("category")),
            rating: raw
                .get("averageRating")
                .or_else(|| raw.get("rating"))
                .and_then(Value::as_f64),
        })
    }
}

/// Observable catalog state.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogState {
    pub products: Vec<Product>,
    pub featured: Vec<Product>,
    pub category: String,
    pub region: String,
    pub sort: ProductSort,
    pub cursor: Cursor,

    pub search_query: String,
    pub search_results: Vec<Product>,
    pub search_cursor: Cursor,
    pub suggestions: Vec<Suggestion>,

    pub product: Option<Product>,
    pub related: Vec<Product>,
    pub featured_vendors: Vec<Seller>,
    pub vendors_fetched: bool,

    pub loading: bool,
    pub searching: bool,
    pub error: Option<String>,
    /// Bumped when the listing filters change; pages for an older value
    /// are dropped.
    listing_generation: u64,
    search_generation: u64,
}

impl CatalogState {
    fn new(page_size: u32) -> Self {
        Self {
            products: Vec::new(),
            featured: Vec::new(),
            category: ALL.to_string(),
            region: ALL.to_string(),
            sort: ProductSort::None,
            cursor: Cursor::new(page_size),
            search_query: String::new(),
            search_results: Vec::new(),
            search_cursor: Cursor::new(page_size),
            suggestions: Vec::new(),
            product: None,
            related: Vec::new(),
            featured_vendors: Vec::new(),
            vendors_fetched: false,
            loading: false,
            searching: false,
            error: None,
            listing_generation: 0,
            search_generation: 0,
        }
    }

    fn listing_path(&self) -> (String, Vec<(&'static str, String)>) {
        let mut query = self.cursor.query().to_vec();
        let path = if !is_all(&self.region) {
            query.push(("category", self.category.clone()));
            format!("/products/municipality/{}", self.region)
        } else if !is_all(&self.category) {
            format!("/products/category/{}", self.category)
        } else {
            "/products".to_string()
        };
        (path, query)
    }

    fn reset_listing(&mut self) {
        self.products.clear();
        self.featured.clear();
        self.cursor.reset();
        self.listing_generation += 1;
        self.loading = false;
    }
}

fn is_all(filter: &str) -> bool {
    filter.is_empty() || filter.eq_ignore_ascii_case(ALL)
}

fn in_stock_batch(body: &Value) -> std::result::Result<Vec<Product>, FetchError> {
    let mut batch = api::products_from(body)?;
    for product in &mut batch {
        product.drop_out_of_stock_options();
    }
    Ok(batch)
}

/// Product browsing, search and product detail.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    client: FetchClient,
    config: CatalogConfig,
    state: Arc<Mutex<CatalogState>>,
}

impl CatalogStore {
    pub fn new(client: FetchClient, config: CatalogConfig) -> Self {
        let state = CatalogState::new(config.page_size);
        Self {
            client,
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> CatalogState {
        lock(&self.state).clone()
    }

    pub fn products(&self) -> Vec<Product> {
        lock(&self.state).products.clone()
    }

    pub fn featured(&self) -> Vec<Product> {
        lock(&self.state).featured.clone()
    }

    pub fn has_more(&self) -> bool {
        lock(&self.state).cursor.has_more
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    /// Categories present in the loaded products, plus `all`.
    pub fn categories(&self) -> Vec<String> {
        category_facets(&lock(&self.state).products)
    }

    /// Fetch the next page for the current filters.
    ///
    /// Returns the number of products received. Nothing is requested while a
    /// page is loading or after a short page. A page that lands after the
    /// filters changed is discarded and counts as 0.
    pub async fn fetch_next(&self) -> Result<usize> {
        let (path, query, first_page, generation) = {
            let mut state = lock(&self.state);
            if state.loading || !state.cursor.has_more {
                return Ok(0);
            }
            state.loading = true;
            state.error = None;
            let (path, query) = state.listing_path();
            (path, query, state.cursor.skip == 0, state.listing_generation)
        };

        let result = match self.client.get(path.as_str()).query(query).fetch::<Value>().await {
            Ok(body) => in_stock_batch(&body),
            Err(e) => Err(e),
        };

        let mut state = lock(&self.state);
        if state.listing_generation != generation {
            debug!(%path, "filters changed, dropping stale page");
            return Ok(0);
        }
        state.loading = false;
        match result {
            Ok(batch) => {
                let received = batch.len();
                state.cursor.advance(received);
                state.products.extend(batch);
                let sort = state.sort;
                sort.apply(&mut state.products);
                if first_page || state.featured.is_empty() {
                    state.featured = state
                        .products
                        .iter()
                        .take(self.config.featured_count)
                        .cloned()
                        .collect();
                }
                debug!(%path, received, has_more = state.cursor.has_more, "catalog page loaded");
                Ok(received)
            }
            Err(e) => {
                warn!(%path, error = %e, "failed to fetch products");
                state.error = Some(api::error_text(&e, FETCH_FAILED));
                Err(e.into())
            }
        }
    }

    /// Start over with the current filters.
    pub async fn refresh(&self) -> Result<usize> {
        lock(&self.state).reset_listing();
        self.fetch_next().await
    }

    /// Switch category. The listing is cleared and the first page fetched.
    pub async fn set_category(&self, category: &str) -> Result<usize> {
        {
            let mut state = lock(&self.state);
            state.category = normalized_filter(category);
            state.reset_listing();
        }
        self.fetch_next().await
    }

    /// Switch region. The listing is cleared and the first page fetched.
    pub async fn set_region(&self, region: &str) -> Result<usize> {
        {
            let mut state = lock(&self.state);
            state.region = normalized_filter(region);
            state.reset_listing();
        }
        self.fetch_next().await
    }

    /// Re-order the loaded products. Later pages are sorted on arrival.
    pub fn set_sort(&self, sort: ProductSort) {
        let mut state = lock(&self.state);
        state.sort = sort;
        sort.apply(&mut state.products);
        let featured_count = self.config.featured_count;
        state.featured = state.products.iter().take(featured_count).cloned().collect();
    }

    /// Paginated search with its own cursor.
    ///
    /// A different query, or `reset`, starts from the first page and
    /// discards any page still in flight for the previous one.
    pub async fn search(&self, query: &str, reset: bool) -> Result<usize> {
        let query = query.trim();
        let (params, generation) = {
            let mut state = lock(&self.state);
            if reset || state.search_query != query {
                state.search_query = query.to_string();
                state.search_results.clear();
                state.search_cursor.reset();
                state.search_generation += 1;
                state.searching = false;
            }
            if state.searching || !state.search_cursor.has_more {
                return Ok(0);
            }
            state.searching = true;
            state.error = None;
            let mut params = state.search_cursor.query().to_vec();
            params.push(("q", query.to_string()));
            (params, state.search_generation)
        };

        let result = match self.client.get("/products/search").query(params).fetch::<Value>().await {
            Ok(body) => in_stock_batch(&body),
            Err(e) => Err(e),
        };

        let mut state = lock(&self.state);
        if state.search_generation != generation {
            debug!(query, "search replaced, dropping stale results");
            return Ok(0);
        }
        state.searching = false;
        match result {
            Ok(batch) => {
                let received = batch.len();
                state.search_cursor.advance(received);
                state.search_results.extend(batch);
                Ok(received)
            }
            Err(e) => {
                warn!(query, error = %e, "product search failed");
                state.error = Some(api::error_text(&e, FETCH_FAILED));
                Err(e.into())
            }
        }
    }

    /// Suggestions for a search box. An empty query clears them without a
    /// request; a failed request also leaves them empty.
    pub async fn suggestions(&self, query: &str) -> Vec<Suggestion> {
        let query = query.trim();
        if query.is_empty() {
            lock(&self.state).suggestions.clear();
            return Vec::new();
        }

        let body = self
            .client
            .get("/products/search")
            .query([("q", query.to_string()), ("limit", SUGGESTION_LIMIT.to_string())])
            .fetch::<Value>()
            .await;
        let suggestions = match body {
            Ok(Value::Array(items)) => items.iter().filter_map(Suggestion::from_raw).collect(),
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!(query, error = %e, "search suggestions failed");
                Vec::new()
            }
        };
        lock(&self.state).suggestions = suggestions.clone();
        suggestions
    }

    /// `GET /products/:id`; the result becomes the current product.
    pub async fn product(&self, id: &ProductId) -> Result<Product> {
        lock(&self.state).product = None;
        match api::fetch_product(&self.client, id).await {
            Ok(product) => {
                lock(&self.state).product = Some(product.clone());
                Ok(product)
            }
            Err(e) => {
                warn!(product = %id, error = %e, "failed to fetch product");
                lock(&self.state).error = Some(api::error_text(&e, "Failed to fetch product."));
                Err(e.into())
            }
        }
    }

    /// `GET /products/:id/related`.
    pub async fn related(&self, id: &ProductId) -> Result<Vec<Product>> {
        lock(&self.state).related.clear();
        let body = self
            .client
            .get(format!("/products/{id}/related"))
            .fetch::<Value>()
            .await;
        match body.and_then(|b| api::products_from(&b)) {
            Ok(related) => {
                lock(&self.state).related = related.clone();
                Ok(related)
            }
            Err(e) => {
                warn!(product = %id, error = %e, "failed to fetch related products");
                lock(&self.state).error = Some(api::error_text(&e, FETCH_FAILED));
                Err(e.into())
            }
        }
    }

    /// `GET /vendor/featured`, fetched once per store.
    pub async fn featured_vendors(&self) -> Result<Vec<Seller>> {
        {
            let state = lock(&self.state);
            if state.vendors_fetched {
                return Ok(state.featured_vendors.clone());
            }
        }
        let vendors: Vec<Seller> = self
            .client
            .get("/vendor/featured")
            .fetch()
            .await
            .inspect_err(|e| warn!(error = %e, "failed to fetch featured vendors"))?;
        let mut state = lock(&self.state);
        state.featured_vendors = vendors.clone();
        state.vendors_fetched = true;
        Ok(vendors)
    }
}

fn normalized_filter(value: &str) -> String {
    let value = value.trim();
    if is_all(value) {
        ALL.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_data::mock::MockBackend;
    use bazaar_data::{FetchPolicy, Method};
    use serde_json::json;
    use std::time::Duration;

    fn page(prefix: &str, n: usize) -> Value {
        Value::Array(
            (0..n)
                .map(|i| {
                    json!({
                        "_id": format!("{prefix}{i}"),
                        "name": format!("Item {i}"),
                        "price": 10 + i,
                        "sold": i,
                        "categories": [if i % 2 == 0 { "fruit" } else { "dairy" }],
                        "option": [
                            {"_id": format!("{prefix}{i}a"), "stock": 0, "price": 5},
                            {"_id": format!("{prefix}{i}b"), "stock": 3, "price": 6},
                        ],
                    })
                })
                .collect(),
        )
    }

    fn store(mock: &MockBackend) -> CatalogStore {
        let client = FetchClient::new(Arc::new(mock.clone()))
            .with_policy(FetchPolicy::single_attempt(Duration::from_secs(5)));
        CatalogStore::new(client, CatalogConfig::default())
    }

    #[tokio::test]
    async fn test_short_page_stops_pagination() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/products", 200, page("p", 10));
        let catalog = store(&mock);

        assert_eq!(catalog.fetch_next().await.unwrap(), 10);
        assert!(!catalog.has_more());
        assert_eq!(catalog.fetch_next().await.unwrap(), 0);
        assert_eq!(mock.count(Method::Get, "/products"), 1);

        let call = &mock.calls()[0];
        assert_eq!(call.query_param("limit"), Some("15"));
        assert_eq!(call.query_param("skip"), Some("0"));
    }

    #[tokio::test]
    async fn test_full_pages_advance_cursor() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/products", 200, page("p", 15));
        let catalog = store(&mock);

        catalog.fetch_next().await.unwrap();
        catalog.fetch_next().await.unwrap();
        let state = catalog.state();
        assert_eq!(state.products.len(), 30);
        assert_eq!(state.cursor.skip, 30);
        assert!(state.cursor.has_more);
        assert_eq!(state.featured.len(), 8);
        assert_eq!(mock.calls()[1].query_param("skip"), Some("15"));
    }

    #[tokio::test]
    async fn test_out_of_stock_options_are_dropped() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/products", 200, page("p", 2));
        let catalog = store(&mock);
        catalog.fetch_next().await.unwrap();

        let products = catalog.products();
        assert!(products.iter().all(|p| p.option.len() == 1));
        assert_eq!(products[0].option[0].id.as_str(), "p0b");
    }

    #[tokio::test]
    async fn test_filters_choose_endpoint_and_reset() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/products", 200, page("p", 15));
        mock.on(Method::Get, "/products/category/:cat", 200, page("c", 4));
        mock.on(Method::Get, "/products/municipality/:region", 200, page("m", 3));
        let catalog = store(&mock);

        catalog.fetch_next().await.unwrap();
        catalog.set_category("fruit").await.unwrap();
        let state = catalog.state();
        assert_eq!(state.products.len(), 4);
        assert_eq!(state.cursor.skip, 15);
        assert!(!state.cursor.has_more);

        catalog.set_region("Boac").await.unwrap();
        assert_eq!(catalog.products().len(), 3);
        let call = mock.calls_to(Method::Get, "/products/municipality/:region")[0].clone();
        assert_eq!(call.path, "/products/municipality/Boac");
        assert_eq!(call.query_param("category"), Some("fruit"));

        catalog.set_region("All").await.unwrap();
        catalog.set_category("all").await.unwrap();
        assert_eq!(mock.count(Method::Get, "/products"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_change_drops_page_in_flight() {
        let mock = MockBackend::new();
        mock.on_delayed(Method::Get, "/products", Duration::from_millis(100), 200, page("p", 15));
        mock.on(Method::Get, "/products/category/:cat", 200, page("c", 4));
        let catalog = store(&mock);

        let first = tokio::spawn({
            let catalog = catalog.clone();
            async move { catalog.fetch_next().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(catalog.state().loading);

        assert_eq!(catalog.set_category("fruit").await.unwrap(), 4);
        assert_eq!(first.await.unwrap().unwrap(), 0);

        let state = catalog.state();
        assert!(state.products.iter().all(|p| p.id.as_str().starts_with('c')));
        assert_eq!(state.products.len(), 4);
        assert!(!state.cursor.has_more);
        assert!(!state.loading);
        assert_eq!(mock.count(Method::Get, "/products/category/:cat"), 1);
    }

    #[tokio::test]
    async fn test_error_keeps_products() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/products", 200, page("p", 15));
        let catalog = store(&mock);
        catalog.fetch_next().await.unwrap();

        mock.on(Method::Get, "/products", 503, json!({"message": "Maintenance"}));
        assert!(catalog.fetch_next().await.is_err());
        assert_eq!(catalog.products().len(), 15);
        assert_eq!(catalog.error().as_deref(), Some("Maintenance"));

        mock.on(Method::Get, "/products", 200, json!({"unexpected": true}));
        assert!(catalog.fetch_next().await.is_err());
        assert_eq!(catalog.products().len(), 15);
    }

    #[tokio::test]
    async fn test_sort_and_categories() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/products", 200, page("p", 5));
        let catalog = store(&mock);
        catalog.fetch_next().await.unwrap();

        catalog.set_sort(ProductSort::PriceDesc);
        let prices: Vec<f64> = catalog.products().iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![14.0, 13.0, 12.0, 11.0, 10.0]);
        assert_eq!(catalog.featured()[0].price, 14.0);
        assert_eq!(catalog.categories(), vec!["all", "dairy", "fruit"]);
    }

    #[tokio::test]
    async fn test_search_has_own_cursor() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/products/search", 200, page("s", 15));
        let catalog = store(&mock);

        catalog.search("mango", false).await.unwrap();
        catalog.search("mango", false).await.unwrap();
        let state = catalog.state();
        assert_eq!(state.search_results.len(), 30);
        assert_eq!(state.cursor.skip, 0);

        catalog.search("rice", false).await.unwrap();
        assert_eq!(catalog.state().search_results.len(), 15);
        let last = mock.calls().pop().unwrap();
        assert_eq!(last.query_param("q"), Some("rice"));
        assert_eq!(last.query_param("skip"), Some("0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_query_drops_results_in_flight() {
        let mock = MockBackend::new();
        mock.on_delayed(Method::Get, "/products/search", Duration::from_millis(100), 200, page("m", 15));
        let catalog = store(&mock);

        let first = tokio::spawn({
            let catalog = catalog.clone();
            async move { catalog.search("mango", false).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        mock.on(Method::Get, "/products/search", 200, page("r", 3));
        assert_eq!(catalog.search("rice", false).await.unwrap(), 3);
        assert_eq!(first.await.unwrap().unwrap(), 0);

        let state = catalog.state();
        assert_eq!(state.search_query, "rice");
        assert_eq!(state.search_results.len(), 3);
        assert!(state.search_results.iter().all(|p| p.id.as_str().starts_with('r')));
        assert!(!state.searching);
    }

    #[tokio::test]
    async fn test_suggestions() {
        let mock = MockBackend::new();
        mock.on(
            Method::Get,
            "/products/search",
            200,
            json!([
                {"_id": "p1", "name": "Mango", "price": 80, "imageUrls": ["m.png"], "categories": ["fruit"], "averageRating": 4.5},
                {"id": "p2", "title": "Mango jam", "price": 120},
                {"name": "no id"},
            ]),
        );
        let catalog = store(&mock);

        assert!(catalog.suggestions("   ").await.is_empty());
        assert_eq!(mock.calls().len(), 0);

        let found = catalog.suggestions("mango").await;
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].image_url.as_deref(), Some("m.png"));
        assert_eq!(found[0].category.as_deref(), Some("fruit"));
        assert_eq!(found[1].name, "Mango jam");
        assert_eq!(found[1].rating, None);
        assert_eq!(mock.calls()[0].query_param("limit"), Some("15"));
    }

    #[tokio::test]
    async fn test_product_detail_and_related() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/products/p1", 200, json!({"_id": "p1", "name": "Mango"}));
        mock.on(Method::Get, "/products/p1/related", 200, page("r", 3));
        let catalog = store(&mock);

        let product = catalog.product(&ProductId::new("p1")).await.unwrap();
        assert_eq!(product.name, "Mango");
        assert_eq!(catalog.state().product, Some(product));
        assert_eq!(catalog.related(&ProductId::new("p1")).await.unwrap().len(), 3);

        assert!(catalog.product(&ProductId::new("p9")).await.is_err());
        assert!(catalog.state().product.is_none());
    }

    #[tokio::test]
    async fn test_featured_vendors_fetched_once() {
        let mock = MockBackend::new();
        mock.on(
            Method::Get,
            "/vendor/featured",
            200,
            json!([{"storeName": "Farm Fresh", "followers": ["u1"]}]),
        );
        let catalog = store(&mock);
        assert_eq!(catalog.featured_vendors().await.unwrap()[0].store_name, "Farm Fresh");
        catalog.featured_vendors().await.unwrap();
        assert_eq!(mock.count(Method::Get, "/vendor/featured"), 1);
    }
}
