//! Coercion of heterogeneous server documents into the canonical [`Product`].
//!
//! Product documents arrive in several shapes depending on the endpoint:
//! ids may be missing, numbers may be strings, `vendorId` may be populated
//! into an object and older documents carry `imgurl` instead of `imageUrls`.

use serde_json::Value;

use crate::catalog::{Product, ProductOption};
use crate::ids::{object_id_seconds, OptionId, ProductId, VendorId};
use crate::sort::SortDirection;

/// Build a canonical product from a raw JSON document.
///
/// Options are sorted newest first and the derived aggregates recomputed.
pub fn normalize_product(raw: &Value) -> Product {
    let image_urls = match raw.get("imageUrls").or_else(|| raw.get("imgurl")) {
        Some(Value::Array(items)) => items.iter().filter_map(as_nonempty_string).collect(),
        Some(other) => as_nonempty_string(other).into_iter().collect(),
        None => Vec::new(),
    };

    let categories = match raw.get("categories") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };

    let mut options: Vec<ProductOption> = match raw.get("option") {
        Some(Value::Array(items)) => items.iter().map(normalize_option).collect(),
        _ => Vec::new(),
    };
    sort_options_by_created(&mut options, SortDirection::Desc);

    let mut product = Product {
        id: ProductId::new(coerce_string(raw.get("_id"))),
        vendor_id: vendor_id_of(raw),
        store_name: raw.get("storeName").and_then(as_nonempty_string),
        name: coerce_string(raw.get("name")),
        description: coerce_string(raw.get("description")),
        price: coerce_f64(raw.get("price")),
        stock: coerce_i64(raw.get("stock")),
        sold: coerce_i64(raw.get("sold")),
        option: options,
        categories,
        image_urls,
        is_new: truthy(raw.get("isNew")),
        is_hot: truthy(raw.get("isHot")),
        is_approved: truthy(raw.get("isApproved")),
        is_option: truthy(raw.get("isOption")),
        average_rating: coerce_f64(raw.get("averageRating")),
        num_reviews: coerce_i64(raw.get("numReviews")),
        municipality: coerce_string(raw.get("municipality")),
        created_at: raw.get("createdAt").and_then(as_nonempty_string),
        updated_at: raw.get("updatedAt").and_then(as_nonempty_string),
    };
    product.recompute_aggregates();
    product
}

/// Build a canonical option from a raw JSON document.
pub fn normalize_option(raw: &Value) -> ProductOption {
    ProductOption {
        id: OptionId::new(coerce_string(raw.get("_id"))),
        image_url: coerce_string(raw.get("imageUrl")),
        price: coerce_f64(raw.get("price")),
        label: coerce_string(raw.get("label")),
        stock: coerce_i64(raw.get("stock")),
        sold: coerce_i64(raw.get("sold")),
        is_hot: truthy(raw.get("isHot")),
        created_at: raw.get("createdAt").and_then(as_nonempty_string),
        updated_at: raw.get("updatedAt").and_then(as_nonempty_string),
    }
}

/// Vendor id of a product document; `vendorId` may be a plain id or a
/// populated vendor object.
pub fn vendor_id_of(raw: &Value) -> Option<VendorId> {
    match raw.get("vendorId")? {
        Value::Object(map) => map.get("_id").and_then(as_nonempty_string),
        other => as_nonempty_string(other),
    }
    .map(VendorId::new)
}

/// Inferred creation time in milliseconds.
///
/// Falls back from `created_at` to `updated_at` to the seconds embedded in
/// the id, and finally to 0.
pub fn inferred_timestamp(created_at: Option<&str>, updated_at: Option<&str>, id: &str) -> i64 {
    created_at
        .and_then(parse_timestamp_millis)
        .or_else(|| updated_at.and_then(parse_timestamp_millis))
        .or_else(|| object_id_seconds(id).map(|s| s * 1000))
        .unwrap_or(0)
}

/// Parse an ISO-8601 timestamp into epoch milliseconds.
pub fn parse_timestamp_millis(s: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Sort options by inferred creation time.
pub fn sort_options_by_created(options: &mut [ProductOption], dir: SortDirection) {
    options.sort_by_cached_key(|o| {
        let ts = inferred_timestamp(o.created_at.as_deref(), o.updated_at.as_deref(), o.id.as_str());
        match dir {
            SortDirection::Asc => ts,
            SortDirection::Desc => -ts,
        }
    });
}

/// Sort products by inferred creation time.
pub fn sort_products_by_created(products: &mut [Product], dir: SortDirection) {
    products.sort_by_cached_key(|p| {
        let ts = inferred_timestamp(p.created_at.as_deref(), p.updated_at.as_deref(), p.id.as_str());
        match dir {
            SortDirection::Asc => ts,
            SortDirection::Desc => -ts,
        }
    });
}

fn as_nonempty_string(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn coerce_string(v: Option<&Value>) -> String {
    v.and_then(as_nonempty_string).unwrap_or_default()
}

fn coerce_f64(v: Option<&Value>) -> f64 {
    let n = match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    n.filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn coerce_i64(v: Option<&Value>) -> i64 {
    coerce_f64(v).round() as i64
}

fn truthy(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        _ => false,
    }
}
