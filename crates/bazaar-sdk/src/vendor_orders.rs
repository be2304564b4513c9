//! Vendor order management.
//!
//! Holds the vendor's orders, the table filters and the current page. The
//! filter, sort and paginate stages live in [`bazaar_commerce::orders`]; this
//! store adds fetching with a freshness window, superseding of in-flight
//! list requests, and optimistic status and shipping updates.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use bazaar_commerce::orders::{
    clamp_page, page_count, run_listing, Order, OrderPage, OrderQuery, OrderStatus, PaymentMethod,
    PaymentStatus, ShipPayload, StatusCounts,
};
use bazaar_commerce::ids::OrderId;
use bazaar_commerce::sort::SortDirection;
use bazaar_commerce::CommerceError;
use bazaar_data::sync::Supersede;
use bazaar_data::{FetchClient, FetchError};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{lock, order_from};
use crate::config::OrdersConfig;
use crate::notice::Notifier;
use crate::optimistic::{MutationId, MutationState, Optimistic};
use crate::Result;

/// Options for [`VendorOrdersStore::fetch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Fetch even while loading or inside the freshness window.
    pub force: bool,
    /// Leave `loading` and `error` alone.
    pub silent: bool,
    /// Ignore the freshness window.
    pub no_cache: bool,
}

impl FetchOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VendorOrdersState {
    pub orders: Vec<Order>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_fetched: Option<Instant>,
    pub query: OrderQuery,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
    pub updating: BTreeSet<OrderId>,
    fetch_seq: u64,
    /// Fetch that set `loading` and must clear it.
    loading_seq: u64,
}

impl VendorOrdersState {
    fn new(page_size: usize) -> Self {
        Self {
            orders: Vec::new(),
            loading: false,
            error: None,
            last_fetched: None,
            query: OrderQuery::default(),
            page: 1,
            page_size,
            updating: BTreeSet::new(),
            fetch_seq: 0,
            loading_seq: 0,
        }
    }

    fn find(&self, id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| &o.id == id)
    }

    fn replace(&mut self, order: Order) -> bool {
        match self.orders.iter_mut().find(|o| o.id == order.id) {
            Some(slot) => {
                *slot = order;
                true
            }
            None => false,
        }
    }

    fn listing(&self) -> OrderPage {
        run_listing(&self.orders, &self.query, self.page, self.page_size)
    }

    fn filtered_len(&self) -> usize {
        self.orders.iter().filter(|o| self.query.matches(o)).count()
    }
}

/// Orders of the signed-in vendor.
#[derive(Clone)]
pub struct VendorOrdersStore {
    client: FetchClient,
    config: OrdersConfig,
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<VendorOrdersState>>,
    mutations: Arc<Mutex<Optimistic<OrderId, Order>>>,
    list: Supersede,
}

impl std::fmt::Debug for VendorOrdersStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorOrdersStore")
            .field("config", &self.config)
            .field("orders", &lock(&self.state).orders.len())
            .finish()
    }
}

impl VendorOrdersStore {
    pub fn new(client: FetchClient, config: OrdersConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state: Arc::new(Mutex::new(VendorOrdersState::new(config.page_size))),
            client,
            config,
            notifier,
            mutations: Arc::new(Mutex::new(Optimistic::new())),
            list: Supersede::new(),
        }
    }

    pub fn state(&self) -> VendorOrdersState {
        lock(&self.state).clone()
    }

    pub fn orders(&self) -> Vec<Order> {
        lock(&self.state).orders.clone()
    }

    pub fn order(&self, id: &OrderId) -> Option<Order> {
        lock(&self.state).find(id).cloned()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).loading
    }

    pub fn is_updating(&self, id: &OrderId) -> bool {
        lock(&self.state).updating.contains(id)
    }

    pub fn mutation_state(&self, id: &OrderId) -> MutationState {
        lock(&self.mutations).state(id)
    }

    /// Load `GET /order/vendor`.
    ///
    /// Returns `Ok(false)` when the call was skipped (already loading, or the
    /// last success is inside the freshness window) or superseded by a newer
    /// fetch.
    pub async fn fetch(&self, opts: FetchOptions) -> Result<bool> {
        let seq = {
            let mut state = lock(&self.state);
            if state.loading && !opts.force {
                return Ok(false);
            }
            let fresh = state
                .last_fetched
                .is_some_and(|at| at.elapsed() < self.config.freshness());
            if fresh && !opts.force && !opts.no_cache {
                debug!("vendor orders still fresh");
                return Ok(false);
            }
            state.fetch_seq += 1;
            if !opts.silent {
                state.loading = true;
                state.loading_seq = state.fetch_seq;
                state.error = None;
            }
            state.fetch_seq
        };

        let result = self.list.run(load_orders(&self.client)).await;

        let mut state = lock(&self.state);
        if !opts.silent && state.loading_seq == seq {
            state.loading = false;
        }
        match result {
            Ok(orders) => {
                debug!(count = orders.len(), "vendor orders loaded");
                state.orders = orders;
                state.last_fetched = Some(Instant::now());
                state.page = 1;
                Ok(true)
            }
            Err(FetchError::Cancelled) => {
                debug!("vendor order fetch superseded");
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch vendor orders");
                state.error = Some(e.user_message());
                Err(e.into())
            }
        }
    }

    /// `GET /order/:id`; replaces the listed copy when there is one.
    pub async fn fetch_single(&self, id: &OrderId) -> Result<Option<Order>> {
        let body: Value = self
            .client
            .get(format!("/order/{id}"))
            .fetch()
            .await
            .inspect_err(|e| warn!(order = %id, error = %e, "failed to fetch order"))?;
        let Some(order) = order_from(&body) else {
            return Ok(None);
        };
        lock(&self.state).replace(order.clone());
        Ok(Some(order))
    }

    /// Statuses the vendor may move `order` into.
    pub fn allowed_transitions(&self, order: &Order) -> &'static [OrderStatus] {
        order.status.allowed_transitions()
    }

    /// Change an order's status.
    ///
    /// Disallowed moves fail before any request; moving to the current
    /// status does nothing. The change is shown at once and undone if the
    /// server rejects it.
    pub async fn update_status(&self, id: &OrderId, next: OrderStatus) -> Result<()> {
        let current = self
            .order(id)
            .ok_or_else(|| CommerceError::OrderNotFound(id.to_string()))?;
        if !current.check_transition(next)? {
            return Ok(());
        }

        let ticket = self.begin(id, current, |order| order.apply_status(next));

        let sent = match self
            .client
            .patch(format!("/order/{id}/status"))
            .json(&json!({ "status": next }))
        {
            Ok(request) => request.fetch::<Value>().await,
            Err(e) => Err(e),
        };
        match sent {
            Ok(body) => {
                self.settle(id, ticket, &body);
                self.notifier.success(&format!("Order update to {next}"));
                info!(order = %id, status = %next, "order status updated");
                Ok(())
            }
            Err(e) => {
                warn!(order = %id, status = %next, error = %e, "order status update failed");
                self.restore(id, ticket);
                self.notifier.error(&format!("Order failed to update to {next}"));
                Err(e.into())
            }
        }
    }

    /// Mark a paid order shipped with `PATCH /vendor/orders/:id/ship`.
    pub async fn ship(&self, id: &OrderId, payload: &ShipPayload) -> Result<()> {
        let current = self
            .order(id)
            .ok_or_else(|| CommerceError::OrderNotFound(id.to_string()))?;
        let now = chrono::Utc::now().to_rfc3339();
        let shipment = payload.validate(&current, &now)?;

        let ticket = self.begin(id, current, |order| order.apply_shipment(&shipment));

        let sent = match self
            .client
            .patch(format!("/vendor/orders/{id}/ship"))
            .json(&shipment)
        {
            Ok(request) => request.fetch::<Value>().await,
            Err(e) => Err(e),
        };
        match sent {
            Ok(body) => {
                self.settle(id, ticket, &body);
                self.notifier.success("Order marked as shipped");
                info!(order = %id, carrier = %shipment.carrier, "order shipped");
                Ok(())
            }
            Err(e) => {
                warn!(order = %id, error = %e, "failed to ship order");
                self.restore(id, ticket);
                self.notifier
                    .error(&format!("Failed to ship order: {}", e.user_message()));
                Err(e.into())
            }
        }
    }

    /// `POST /order/:id/agreement-message`. Blank messages are ignored.
    pub async fn add_agreement_message(&self, id: &OrderId, message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Ok(());
        }
        lock(&self.state).updating.insert(id.clone());
        let sent = match self
            .client
            .post(format!("/order/{id}/agreement-message"))
            .json(&json!({ "message": message }))
        {
            Ok(request) => request.execute().await.map(|_| ()),
            Err(e) => Err(e),
        };
        lock(&self.state).updating.remove(id);
        sent.map_err(|e| {
            let text = e.user_message();
            warn!(order = %id, error = %text, "failed to send agreement message");
            self.notifier.error(&format!("Failed to send message: {text}"));
            e.into()
        })
    }

    fn begin(&self, id: &OrderId, snapshot: Order, edit: impl FnOnce(&mut Order)) -> MutationId {
        let ticket = lock(&self.mutations).begin(id.clone(), snapshot);
        let mut state = lock(&self.state);
        state.updating.insert(id.clone());
        if let Some(order) = state.orders.iter_mut().find(|o| &o.id == id) {
            edit(order);
        }
        ticket
    }

    /// Adopt the server's record when the response is one.
    fn settle(&self, id: &OrderId, ticket: MutationId, body: &Value) {
        let still_pending = {
            let mut mutations = lock(&self.mutations);
            mutations.commit(id, ticket);
            mutations.is_pending(id)
        };
        let mut state = lock(&self.state);
        if !still_pending {
            state.updating.remove(id);
        }
        if let Some(order) = order_from(body) {
            state.replace(order);
        }
    }

    fn restore(&self, id: &OrderId, ticket: MutationId) {
        let (snapshot, still_pending) = {
            let mut mutations = lock(&self.mutations);
            (mutations.rollback(id, ticket), mutations.is_pending(id))
        };
        let mut state = lock(&self.state);
        if !still_pending {
            state.updating.remove(id);
        }
        if let Some(order) = snapshot {
            state.replace(order);
        }
    }

    // Listing

    /// Current page after filtering and sorting. The stored page is clamped
    /// into range.
    pub fn page(&self) -> OrderPage {
        let mut state = lock(&self.state);
        let listing = state.listing();
        state.page = listing.page;
        listing
    }

    pub fn page_count(&self) -> usize {
        let state = lock(&self.state);
        page_count(state.filtered_len(), state.page_size)
    }

    /// Orders on the current page that can be printed.
    pub fn printable_paged(&self) -> Vec<Order> {
        self.page()
            .items
            .into_iter()
            .filter(Order::can_print)
            .collect()
    }

    pub fn has_printable(&self) -> bool {
        !self.printable_paged().is_empty()
    }

    pub fn status_counts(&self) -> StatusCounts {
        StatusCounts::tally(&lock(&self.state).orders)
    }

    pub fn query(&self) -> OrderQuery {
        lock(&self.state).query.clone()
    }

    fn set_filter(&self, edit: impl FnOnce(&mut OrderQuery)) {
        let mut state = lock(&self.state);
        edit(&mut state.query);
        state.page = 1;
    }

    pub fn set_search(&self, search: &str) {
        self.set_filter(|q| q.search = search.to_string());
    }

    pub fn set_status(&self, status: Option<OrderStatus>) {
        self.set_filter(|q| q.status = status);
    }

    pub fn set_payment_method(&self, method: Option<PaymentMethod>) {
        self.set_filter(|q| q.payment_method = method);
    }

    pub fn set_payment_status(&self, status: Option<PaymentStatus>) {
        self.set_filter(|q| q.payment_status = status);
    }

    pub fn set_date_range(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        self.set_filter(|q| {
            q.date_from = from;
            q.date_to = to;
        });
    }

    /// Sorting keeps the current page.
    pub fn set_sort(&self, dir: SortDirection) {
        lock(&self.state).query.sort = dir;
    }

    /// Clear payment and date filters. Search and status tab are kept.
    pub fn reset_filters(&self) {
        self.set_filter(|q| {
            q.payment_method = None;
            q.payment_status = None;
            q.date_from = None;
            q.date_to = None;
        });
    }

    pub fn set_page(&self, page: usize) {
        let mut state = lock(&self.state);
        let len = state.filtered_len();
        state.page = clamp_page(page, len, state.page_size);
    }

    pub fn next_page(&self) {
        let mut state = lock(&self.state);
        let count = page_count(state.filtered_len(), state.page_size);
        if state.page < count {
            state.page += 1;
        }
    }

    pub fn prev_page(&self) {
        let mut state = lock(&self.state);
        if state.page > 1 {
            state.page -= 1;
        }
    }

    /// Forget loaded orders, filters and pending mutations.
    pub fn reset(&self) {
        self.list.cancel();
        *lock(&self.state) = VendorOrdersState::new(self.config.page_size);
        lock(&self.mutations).clear();
    }
}

async fn load_orders(client: &FetchClient) -> std::result::Result<Vec<Order>, FetchError> {
    let body: Value = client.get("/order/vendor").fetch().await?;
    if !body.is_array() {
        return Err(FetchError::InvalidResponse("expected an order list".into()));
    }
    Ok(serde_json::from_value(body)?)
}
