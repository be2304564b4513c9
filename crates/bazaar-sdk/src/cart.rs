//! Cart store.
//!
//! The server keeps a flat list of `{productId, optionId, quantity}`; the
//! store turns it into lines grouped by vendor. Quantity edits show up
//! locally at once and are sent to the server as one net delta per line once
//! the user stops clicking.

use std::sync::{Arc, Mutex};

use bazaar_commerce::cart::{
    CartLine, CartSummary, GroupedCart, SelectionSet, ServerCart, ServerCartItem, MIN_QUANTITY,
};
use bazaar_commerce::ids::{ItemId, OptionId, ProductId, VendorId};
use bazaar_commerce::vendor::Seller;
use bazaar_commerce::{CommerceError, Currency};
use bazaar_data::sync::{ConcurrencyGate, Debouncer, InFlight};
use bazaar_data::{FetchClient, FetchError};
use futures::future::join_all;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::api::{self, lock};
use crate::config::CartConfig;
use crate::Result;

/// Observable cart state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub view: GroupedCart,
    pub selection: SelectionSet,
    /// Set after a completed aggregation pass; cleared by `invalidate`.
    pub fetched: bool,
    pub loading: bool,
    pub error: Option<String>,
}

type SellerLookups = InFlight<VendorId, std::result::Result<Seller, FetchError>>;

/// Multi-vendor cart.
#[derive(Clone)]
pub struct CartStore {
    client: FetchClient,
    config: CartConfig,
    state: Arc<Mutex<CartState>>,
    passes: InFlight<(), std::result::Result<(), FetchError>>,
    updates: Debouncer<String>,
    gate: ConcurrencyGate,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("config", &self.config)
            .field("pending_updates", &self.updates.len())
            .finish()
    }
}

impl CartStore {
    pub fn new(client: FetchClient, config: CartConfig) -> Self {
        Self {
            gate: ConcurrencyGate::new(config.max_concurrency),
            updates: Debouncer::new(config.debounce()),
            client,
            config,
            state: Arc::new(Mutex::new(CartState::default())),
            passes: InFlight::collapsing(),
        }
    }

    pub fn state(&self) -> CartState {
        lock(&self.state).clone()
    }

    pub fn view(&self) -> GroupedCart {
        lock(&self.state).view.clone()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    /// Build the grouped view from the server cart.
    ///
    /// Runs once until [`invalidate`](Self::invalidate); concurrent calls
    /// share one pass. Lines whose product or vendor cannot be fetched are
    /// skipped. If `GET /cart` itself fails the previous view is kept and
    /// the error is recorded.
    pub async fn load(&self) -> Result<()> {
        if lock(&self.state).fetched {
            return Ok(());
        }
        let this = self.clone();
        self.passes
            .get_or_start((), move || async move { this.aggregate().await })
            .await
            .map_err(Into::into)
    }

    /// Forget the aggregation so the next `load` fetches again.
    pub fn invalidate(&self) {
        lock(&self.state).fetched = false;
    }

    /// Drop the local cart and any unsent quantity changes.
    pub fn reset(&self) {
        self.updates.cancel_all();
        *lock(&self.state) = CartState::default();
    }

    async fn aggregate(self) -> std::result::Result<(), FetchError> {
        {
            let mut state = lock(&self.state);
            state.loading = true;
            state.error = None;
        }

        let cart: ServerCart = match self.client.get("/cart").fetch().await {
            Ok(cart) => cart,
            Err(e) => {
                warn!(error = %e, "failed to fetch cart");
                let mut state = lock(&self.state);
                state.loading = false;
                state.error = Some(api::error_text(&e, "Failed to fetch cart"));
                return Err(e);
            }
        };

        let fee = cart.shipping_fee_or(self.config.default_shipping_fee);
        let sellers: SellerLookups = InFlight::memoizing();
        let resolved = join_all(
            cart.items
                .iter()
                .map(|item| self.gate.run(self.resolve_line(item, fee, &sellers))),
        )
        .await;

        let mut view = GroupedCart::new();
        for (line, shop_name) in resolved.into_iter().flatten() {
            view.insert_line(|| shop_name, fee, line);
        }
        debug!(
            entries = cart.items.len(),
            lines = view.line_count(),
            vendors = sellers.len(),
            "cart aggregated"
        );

        let mut state = lock(&self.state);
        state.selection.prune(&view);
        state.view = view;
        state.fetched = true;
        state.loading = false;
        Ok(())
    }

    async fn resolve_line(
        &self,
        item: &ServerCartItem,
        fee: f64,
        sellers: &SellerLookups,
    ) -> Option<(CartLine, Option<String>)> {
        let product = match api::fetch_product(&self.client, &item.product_id).await {
            Ok(product) => product,
            Err(e) => {
                warn!(product = %item.product_id, error = %e, "failed to process cart item");
                return None;
            }
        };
        let Some(vendor_id) = product.vendor_id.clone() else {
            warn!(product = %item.product_id, "cart item product has no vendor");
            return None;
        };

        let client = self.client.clone();
        let lookup = vendor_id.clone();
        let seller = sellers
            .get_or_start(vendor_id.clone(), move || async move {
                api::fetch_seller(&client, &lookup).await
            })
            .await;
        let seller = match seller {
            Ok(seller) => seller,
            Err(e) => {
                warn!(product = %item.product_id, vendor = %vendor_id, error = %e, "failed to fetch vendor for cart item");
                return None;
            }
        };

        let line = CartLine::resolve(item, &product, vendor_id, fee);
        Some((line, Some(seller.store_name)))
    }

    // Selection

    /// Toggle one line. Unknown ids are ignored and return `false`.
    pub fn toggle_item(&self, item_id: &ItemId) -> bool {
        let mut state = lock(&self.state);
        let CartState {
            view, selection, ..
        } = &mut *state;
        selection.toggle_item(view, item_id)
    }

    /// Select every line of a vendor, or clear them if all are selected.
    pub fn toggle_group(&self, shop_id: &VendorId) -> bool {
        let mut state = lock(&self.state);
        let CartState {
            view, selection, ..
        } = &mut *state;
        selection.toggle_group(view, shop_id)
    }

    pub fn toggle_all(&self) {
        let mut state = lock(&self.state);
        let CartState {
            view, selection, ..
        } = &mut *state;
        selection.toggle_all(view);
    }

    pub fn is_selected(&self, item_id: &ItemId) -> bool {
        lock(&self.state).selection.contains(item_id)
    }

    pub fn is_group_selected(&self, shop_id: &VendorId) -> bool {
        let state = lock(&self.state);
        state.selection.is_group_selected(&state.view, shop_id)
    }

    pub fn is_all_selected(&self) -> bool {
        let state = lock(&self.state);
        state.selection.is_all_selected(&state.view)
    }

    pub fn selected_count(&self) -> usize {
        lock(&self.state).selection.len()
    }

    /// Selected lines in selection order.
    pub fn selected_lines(&self) -> Vec<CartLine> {
        let state = lock(&self.state);
        state
            .selection
            .iter()
            .filter_map(|id| state.view.line(id).cloned())
            .collect()
    }

    // Quantity

    pub fn increment(
        &self,
        shop_id: &VendorId,
        product_id: &ProductId,
        option_id: &OptionId,
    ) -> Result<i64> {
        self.change_quantity(shop_id, product_id, option_id, 1)
    }

    pub fn decrement(
        &self,
        shop_id: &VendorId,
        product_id: &ProductId,
        option_id: &OptionId,
    ) -> Result<i64> {
        self.change_quantity(shop_id, product_id, option_id, -1)
    }

    /// Apply `delta` locally and schedule the server update.
    ///
    /// A change that would leave `1..=max_quantity` is rejected without any
    /// request. Changes to the same line are summed and sent as one
    /// `PUT /cart/update` after the debounce window. Must be called inside a
    /// tokio runtime.
    pub fn change_quantity(
        &self,
        shop_id: &VendorId,
        product_id: &ProductId,
        option_id: &OptionId,
        delta: i64,
    ) -> Result<i64> {
        let quantity = {
            let mut state = lock(&self.state);
            let line = state
                .view
                .line_by_option_mut(shop_id, option_id)
                .ok_or_else(|| CommerceError::ItemNotInCart(option_id.to_string()))?;
            match line.apply_delta(delta, self.config.max_quantity) {
                Ok(quantity) => quantity,
                Err(e) => {
                    if delta > 0 {
                        warn!(max = self.config.max_quantity, "maximum quantity reached, increment blocked");
                    } else {
                        warn!(min = MIN_QUANTITY, "minimum quantity reached, decrement blocked");
                    }
                    return Err(e.into());
                }
            }
        };

        let key = update_key(shop_id, option_id);
        let client = self.client.clone();
        let (product_id, option_id) = (product_id.clone(), option_id.clone());
        self.updates.push(key, delta, move |net| async move {
            match send_quantity(&client, &product_id, &option_id, net).await {
                Ok(()) => debug!(option = %option_id, delta = net, "cart quantity synced"),
                Err(e) => warn!(option = %option_id, delta = net, error = %e, "failed to update cart item quantity"),
            }
        });
        Ok(quantity)
    }

    /// Net delta waiting to be sent for a line.
    pub fn pending_delta(&self, shop_id: &VendorId, option_id: &OptionId) -> Option<i64> {
        self.updates.pending_delta(&update_key(shop_id, option_id))
    }

    /// Send every pending quantity update now.
    pub async fn flush_pending(&self) {
        self.updates.flush_all().await;
    }

    // Removal

    /// Remove one line on the server, then locally.
    ///
    /// A quantity change still waiting in the debounce window for the line is
    /// dropped first, so it is never sent for a removed line.
    pub async fn delete_item(&self, shop_id: &VendorId, item_id: &ItemId) -> Result<()> {
        let (product_id, option_id) = {
            let state = lock(&self.state);
            let line = state
                .view
                .group(shop_id)
                .and_then(|g| g.items.iter().find(|l| &l.item_id == item_id))
                .ok_or_else(|| CommerceError::ItemNotInCart(item_id.to_string()))?;
            (line.product_id.clone(), line.option_id.clone())
        };
        if self.updates.cancel(&update_key(shop_id, &option_id)) {
            debug!(item = %item_id, "dropped pending quantity update");
        }

        self.client
            .delete("/cart/remove")
            .json(&json!({ "productId": product_id, "optionId": option_id }))?
            .execute()
            .await
            .inspect_err(|e| warn!(item = %item_id, error = %e, "error deleting cart item"))?;

        let mut state = lock(&self.state);
        state.view.remove_line(shop_id, item_id);
        state.selection.remove(item_id);
        info!(item = %item_id, "cart item removed");
        Ok(())
    }

    /// Remove the selected lines locally. Returns how many were removed.
    pub fn delete_selected(&self) -> usize {
        let mut state = lock(&self.state);
        if state.selection.is_empty() {
            return 0;
        }
        let CartState {
            view, selection, ..
        } = &mut *state;
        let removed = view.remove_where(|l| selection.contains(&l.item_id));
        selection.clear();
        removed.len()
    }

    /// Empty the cart, but only when every line is selected.
    ///
    /// Lines are removed locally before `DELETE /cart/clear`; a failed call
    /// is logged. Returns whether anything was cleared.
    pub async fn clear(&self) -> bool {
        if !self.is_all_selected() {
            return false;
        }
        self.delete_selected();
        self.updates.cancel_all();
        if let Err(e) = self.client.delete("/cart/clear").execute().await {
            warn!(error = %e, "failed to clear cart");
        }
        true
    }

    // Adding

    /// `POST /cart/add`; the next `load` rebuilds the view.
    pub async fn add_to_cart(
        &self,
        product_id: &ProductId,
        option_id: Option<&OptionId>,
        quantity: i64,
    ) -> Result<()> {
        if !(MIN_QUANTITY..=self.config.max_quantity).contains(&quantity) {
            return Err(CommerceError::QuantityOutOfRange {
                requested: quantity,
                min: MIN_QUANTITY,
                max: self.config.max_quantity,
            }
            .into());
        }
        let item = ServerCartItem {
            product_id: product_id.clone(),
            option_id: option_id.cloned(),
            quantity,
        };
        self.client
            .post("/cart/add")
            .json(&json!({ "item": item }))?
            .execute()
            .await?;
        self.invalidate();
        info!(product = %product_id, quantity, "added to cart");
        Ok(())
    }

    // Totals

    pub fn summary(&self) -> CartSummary {
        let state = lock(&self.state);
        CartSummary::compute(&state.view, &state.selection, Currency::default())
    }

    pub fn line_count(&self) -> usize {
        lock(&self.state).view.line_count()
    }
}

fn update_key(shop_id: &VendorId, option_id: &OptionId) -> String {
    format!("{shop_id}-{option_id}")
}

async fn send_quantity(
    client: &FetchClient,
    product_id: &ProductId,
    option_id: &OptionId,
    delta: i64,
) -> std::result::Result<(), FetchError> {
    client
        .put("/cart/update")
        .json(&json!({
            "item": { "productId": product_id, "optionId": option_id, "quantity": delta }
        }))?
        .execute()
        .await
        .map(|_| ())
}
