//! Shared endpoint helpers.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bazaar_commerce::catalog::{normalize_product, Product};
use bazaar_commerce::ids::{ProductId, VendorId};
use bazaar_commerce::orders::Order;
use bazaar_commerce::vendor::Seller;
use bazaar_data::{FetchClient, FetchError};
use serde_json::Value;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Normalize a product document; documents without an id are rejected.
pub(crate) fn product_from(raw: &Value) -> Result<Product, FetchError> {
    if !raw.is_object() {
        return Err(FetchError::InvalidResponse("product is not an object".into()));
    }
    let product = normalize_product(raw);
    if product.id.is_empty() {
        return Err(FetchError::InvalidResponse("product has no _id".into()));
    }
    Ok(product)
}

/// Product list from a bare array or an object wrapping one under
/// `products` or `data`.
pub(crate) fn products_from(body: &Value) -> Result<Vec<Product>, FetchError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("products").or_else(|| map.get("data")) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(FetchError::InvalidResponse(
                    "expected a product list".into(),
                ))
            }
        },
        _ => {
            return Err(FetchError::InvalidResponse(
                "expected a product list".into(),
            ))
        }
    };
    Ok(items
        .iter()
        .filter_map(|raw| product_from(raw).ok())
        .collect())
}

/// An order document, if `body` is one.
pub(crate) fn order_from(body: &Value) -> Option<Order> {
    let has_id = body
        .get("_id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());
    if !has_id {
        return None;
    }
    serde_json::from_value(body.clone()).ok()
}

/// `GET /products/:id`.
pub(crate) async fn fetch_product(
    client: &FetchClient,
    id: &ProductId,
) -> Result<Product, FetchError> {
    let raw: Value = client.get(format!("/products/{id}")).fetch().await?;
    product_from(raw.get("product").unwrap_or(&raw))
}

/// `GET /vendor/:id/details`, which wraps the seller in `data`.
pub(crate) async fn fetch_seller(
    client: &FetchClient,
    vendor: &VendorId,
) -> Result<Seller, FetchError> {
    let body: Value = client
        .get(format!("/vendor/{vendor}/details"))
        .fetch()
        .await?;
    let data = body.get("data").cloned().unwrap_or(body);
    Ok(serde_json::from_value(data)?)
}

/// Server message from an error, for a store's error field.
pub(crate) fn error_text(error: &FetchError, fallback: &str) -> String {
    match error {
        FetchError::Http { message, .. } if !message.starts_with("HTTP ") => message.clone(),
        FetchError::Http { .. } => fallback.to_string(),
        other => other.user_message(),
    }
}
