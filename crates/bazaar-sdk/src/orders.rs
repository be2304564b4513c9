//! Customer orders and delivery tracking.

use std::sync::{Arc, Mutex};

use bazaar_commerce::ids::OrderId;
use bazaar_commerce::orders::{CheckoutOrder, Order, OrderStatus};
use bazaar_commerce::tracking::{FixSource, RiderLocation, RiderTracker};
use bazaar_commerce::CommerceError;
use bazaar_data::{FetchClient, FetchError};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{error_text, lock, order_from};
use crate::notice::Notifier;
use crate::optimistic::{MutationState, Optimistic};
use crate::Result;

const FETCH_FAILED: &str = "Failed to fetch orders.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrdersState {
    pub orders: Vec<Order>,
    pub loading: bool,
    pub error: Option<String>,
    pub fetched: bool,
}

/// Orders placed by the signed-in customer.
#[derive(Clone)]
pub struct OrdersStore {
    client: FetchClient,
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<OrdersState>>,
    mutations: Arc<Mutex<Optimistic<OrderId, Order>>>,
    riders: Arc<Mutex<RiderTracker>>,
}

impl std::fmt::Debug for OrdersStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("OrdersStore")
            .field("orders", &state.orders.len())
            .field("fetched", &state.fetched)
            .finish()
    }
}

impl OrdersStore {
    pub fn new(client: FetchClient, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            client,
            notifier,
            state: Arc::new(Mutex::new(OrdersState::default())),
            mutations: Arc::new(Mutex::new(Optimistic::new())),
            riders: Arc::new(Mutex::new(RiderTracker::new())),
        }
    }

    pub fn state(&self) -> OrdersState {
        lock(&self.state).clone()
    }

    pub fn orders(&self) -> Vec<Order> {
        lock(&self.state).orders.clone()
    }

    pub fn order(&self, id: &OrderId) -> Option<Order> {
        lock(&self.state).orders.iter().find(|o| &o.id == id).cloned()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn total(&self) -> usize {
        lock(&self.state).orders.len()
    }

    pub fn by_status(&self, status: OrderStatus) -> Vec<Order> {
        lock(&self.state)
            .orders
            .iter()
            .filter(|o| o.status == status)
            .cloned()
            .collect()
    }

    pub fn mutation_state(&self, id: &OrderId) -> MutationState {
        lock(&self.mutations).state(id)
    }

    /// Load `GET /order` once per session. Returns whether a request was made.
    pub async fn fetch(&self) -> Result<bool> {
        {
            let mut state = lock(&self.state);
            if state.fetched || state.loading {
                return Ok(false);
            }
            state.loading = true;
            state.error = None;
        }

        let result: std::result::Result<Vec<Order>, FetchError> =
            match self.client.get("/order").fetch::<Value>().await {
                Ok(body) if body.is_array() => serde_json::from_value(body).map_err(Into::into),
                Ok(_) => Err(FetchError::InvalidResponse("expected an order list".into())),
                Err(e) => Err(e),
            };

        let mut state = lock(&self.state);
        state.loading = false;
        match result {
            Ok(orders) => {
                debug!(count = orders.len(), "orders loaded");
                state.orders = orders;
                state.fetched = true;
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch orders");
                state.error = Some(error_text(&e, FETCH_FAILED));
                Err(e.into())
            }
        }
    }

    pub async fn refresh(&self) -> Result<bool> {
        lock(&self.state).fetched = false;
        self.fetch().await
    }

    /// Place an order with `POST /order`.
    ///
    /// The created order is listed first when the server echoes it back,
    /// either bare or wrapped in `order`.
    pub async fn create(&self, order: &CheckoutOrder) -> Result<Option<Order>> {
        let body: Value = self
            .client
            .post("/order")
            .json(order)?
            .fetch()
            .await
            .inspect_err(|e| warn!(vendor = %order.vendor_id, error = %e, "failed to create order"))?;

        let created = order_from(body.get("order").unwrap_or(&body));
        match &created {
            Some(created) => {
                info!(order = %created.id, vendor = %order.vendor_id, "order created");
                lock(&self.state).orders.insert(0, created.clone());
            }
            None => debug!(vendor = %order.vendor_id, "order created without a document"),
        }
        Ok(created)
    }

    /// Cancel with `PUT /order/cancel/:id`.
    ///
    /// Only pending or paid orders can be cancelled. The order shows as
    /// cancelled at once and is restored if the server refuses.
    pub async fn cancel(&self, id: &OrderId) -> Result<()> {
        let current = self
            .order(id)
            .ok_or_else(|| CommerceError::OrderNotFound(id.to_string()))?;
        current.check_cancel()?;

        let ticket = lock(&self.mutations).begin(id.clone(), current);
        self.edit(id, |order| order.apply_status(OrderStatus::Cancelled));

        match self
            .client
            .put(format!("/order/cancel/{id}"))
            .fetch::<Value>()
            .await
        {
            Ok(body) => {
                lock(&self.mutations).commit(id, ticket);
                if let Some(order) = order_from(body.get("order").unwrap_or(&body)) {
                    self.edit(id, |slot| *slot = order);
                }
                info!(order = %id, "order cancelled");
                self.notifier.success("Order cancelled");
                Ok(())
            }
            Err(e) => {
                warn!(order = %id, error = %e, "order cancel failed");
                if let Some(snapshot) = lock(&self.mutations).rollback(id, ticket) {
                    self.edit(id, |slot| *slot = snapshot);
                }
                self.notifier
                    .error(&format!("Failed to cancel order: {}", e.user_message()));
                Err(e.into())
            }
        }
    }

    fn edit(&self, id: &OrderId, f: impl FnOnce(&mut Order)) {
        if let Some(order) = lock(&self.state).orders.iter_mut().find(|o| &o.id == id) {
            f(order);
        }
    }

    // Rider tracking

    /// Cache a live rider fix; older fixes than the cached one are ignored.
    pub fn record_rider(&self, order: &OrderId, fix: RiderLocation) {
        lock(&self.riders).record(order.clone(), fix);
    }

    pub fn forget_rider(&self, order: &OrderId) {
        lock(&self.riders).forget(order);
    }

    /// Where the rider is for `order`.
    ///
    /// A cached live fix wins. Otherwise the position is simulated `progress`
    /// of the way from `origin` to the order's delivery coordinates; `None`
    /// when there is neither a fix nor coordinates.
    pub fn rider_position(
        &self,
        order: &OrderId,
        origin: [f64; 2],
        progress: f64,
    ) -> Option<(RiderLocation, FixSource)> {
        let riders = lock(&self.riders);
        if let Some(fix) = riders.latest(order) {
            return Some((fix.clone(), FixSource::Live));
        }
        let destination = self
            .order(order)?
            .shipping_address
            .and_then(|a| a.coordinates)?;
        Some(riders.position(order, origin, destination, progress))
    }

    pub fn clear(&self) {
        *lock(&self.state) = OrdersState::default();
        lock(&self.mutations).clear();
        *lock(&self.riders) = RiderTracker::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeLog;
    use bazaar_commerce::address::Address;
    use bazaar_commerce::cart::{CartLine, GroupedCart, SelectionSet};
    use bazaar_commerce::ids::{ItemId, OptionId, ProductId, VendorId};
    use bazaar_commerce::orders::{PaymentMethod, PaymentStatus};
    use bazaar_data::mock::MockBackend;
    use bazaar_data::{FetchPolicy, Method};
    use serde_json::json;
    use std::time::Duration;

    fn store_with(mock: &MockBackend) -> (OrdersStore, NoticeLog) {
        let client = FetchClient::new(Arc::new(mock.clone()))
            .with_policy(FetchPolicy::single_attempt(Duration::from_secs(30)));
        let log = NoticeLog::new();
        (OrdersStore::new(client, Arc::new(log.clone())), log)
    }

    fn fixture() -> Value {
        json!([
            {"_id": "o1", "status": "pending", "paymentStatus": "Pending",
             "shippingAddress": {"city": "Iloilo", "coordinates": [10.0, 122.0]}},
            {"_id": "o2", "status": "paid", "paymentStatus": "Paid"},
            {"_id": "o3", "status": "shipped", "paymentStatus": "Paid"},
        ])
    }

    async fn loaded(mock: &MockBackend) -> (OrdersStore, NoticeLog) {
        mock.on(Method::Get, "/order", 200, fixture());
        let (store, log) = store_with(mock);
        assert!(store.fetch().await.unwrap());
        (store, log)
    }

    fn id(s: &str) -> OrderId {
        OrderId::new(s)
    }

    #[tokio::test]
    async fn test_fetch_once() {
        let mock = MockBackend::new();
        let (store, _) = loaded(&mock).await;
        assert_eq!(store.total(), 3);
        assert_eq!(store.by_status(OrderStatus::Paid).len(), 1);

        assert!(!store.fetch().await.unwrap());
        assert_eq!(mock.count(Method::Get, "/order"), 1);
        assert!(store.refresh().await.unwrap());
        assert_eq!(mock.count(Method::Get, "/order"), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_message() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/order", 500, json!({}));
        let (store, _) = store_with(&mock);
        assert!(store.fetch().await.is_err());
        assert_eq!(store.error().as_deref(), Some(FETCH_FAILED));
        assert!(!store.state().fetched);

        mock.on(Method::Get, "/order", 401, json!({"message": "Not authorized"}));
        assert!(store.fetch().await.is_err());
        assert_eq!(store.error().as_deref(), Some("Not authorized"));
    }

    #[tokio::test]
    async fn test_create_lists_wrapped_order() {
        let mock = MockBackend::new();
        let (store, _) = loaded(&mock).await;
        mock.on(
            Method::Post,
            "/order",
            201,
            json!({"order": {"_id": "o9", "status": "pending", "vendorId": "v1"}}),
        );

        let mut cart = GroupedCart::new();
        cart.insert_line(
            || Some("Farm".into()),
            50.0,
            CartLine {
                item_id: ItemId::new("p1-default"),
                product_id: ProductId::new("p1"),
                option_id: OptionId::new("p1"),
                vendor_id: VendorId::new("v1"),
                name: "Rice".into(),
                quantity: 2,
                price: 60.0,
                label: String::new(),
                image_url: None,
                shipping_fee: 50.0,
            },
        );
        let mut selection = SelectionSet::new();
        selection.toggle_all(&cart);
        let checkout = CheckoutOrder::from_group(
            &cart.groups[0],
            &selection,
            "Ana",
            Address::default(),
            PaymentMethod::Cod,
        )
        .unwrap();

        let created = store.create(&checkout).await.unwrap().unwrap();
        assert_eq!(created.id, id("o9"));
        assert_eq!(store.orders()[0].id, id("o9"));

        let body = mock.calls_to(Method::Post, "/order")[0].body.clone().unwrap();
        assert_eq!(body["subTotal"], 120.0);
        assert_eq!(body["items"][0]["productId"], "p1");
    }

    #[tokio::test]
    async fn test_cancel_paid_refunds() {
        let mock = MockBackend::new();
        let (store, log) = loaded(&mock).await;
        mock.on(Method::Put, "/order/cancel/:id", 200, json!({"message": "ok"}));

        store.cancel(&id("o2")).await.unwrap();
        let order = store.order(&id("o2")).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert_eq!(store.mutation_state(&id("o2")), MutationState::Committed);
        assert_eq!(log.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_rolls_back() {
        let mock = MockBackend::new();
        let (store, log) = loaded(&mock).await;
        let before = store.order(&id("o1")).unwrap();
        mock.on(Method::Put, "/order/cancel/:id", 409, json!({"message": "Already packed"}));

        assert!(store.cancel(&id("o1")).await.is_err());
        assert_eq!(store.order(&id("o1")).unwrap(), before);
        assert_eq!(store.mutation_state(&id("o1")), MutationState::RolledBack);
        assert_eq!(
            log.errors(),
            vec!["Failed to cancel order: Already packed".to_string()]
        );
    }

    #[tokio::test]
    async fn test_cancel_after_shipping_is_local_error() {
        let mock = MockBackend::new();
        let (store, _) = loaded(&mock).await;
        let err = store.cancel(&id("o3")).await.unwrap_err();
        assert!(err.is_local());
        assert_eq!(mock.count(Method::Put, "/order/cancel/:id"), 0);
    }

    #[tokio::test]
    async fn test_rider_position() {
        let mock = MockBackend::new();
        let (store, _) = loaded(&mock).await;

        let (sim, source) = store.rider_position(&id("o1"), [11.0, 123.0], 0.5).unwrap();
        assert_eq!(source, FixSource::Simulated);
        assert!((sim.latitude - 10.5).abs() < 1e-9);
        assert!(store.rider_position(&id("o2"), [11.0, 123.0], 0.5).is_none());

        store.record_rider(
            &id("o2"),
            RiderLocation {
                latitude: 10.7,
                longitude: 122.5,
                timestamp: "2024-05-01T10:00:00Z".into(),
                speed: None,
                heading: None,
            },
        );
        let (live, source) = store.rider_position(&id("o2"), [0.0, 0.0], 0.0).unwrap();
        assert_eq!(source, FixSource::Live);
        assert_eq!(live.latitude, 10.7);
    }
}
