//! Server cart payload and resolved cart lines.

use crate::catalog::Product;
use crate::error::CommerceError;
use crate::ids::{ItemId, OptionId, ProductId, VendorId};
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// Lowest quantity a line may hold.
pub const MIN_QUANTITY: i64 = 1;
/// Highest quantity a line may hold.
pub const MAX_QUANTITY: i64 = 50;
/// Shipping fee applied when the server cart carries none.
pub const DEFAULT_SHIPPING_FEE: f64 = 50.0;

/// Flat entry of `GET /cart`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerCartItem {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_id: Option<OptionId>,
    #[serde(default)]
    pub quantity: i64,
}

/// Body of `GET /cart`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerCart {
    #[serde(default)]
    pub items: Vec<ServerCartItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_fee: Option<f64>,
}

impl ServerCart {
    /// Shipping fee of the cart, or `default` when absent or zero.
    pub fn shipping_fee_or(&self, default: f64) -> f64 {
        self.shipping_fee
            .filter(|fee| fee.is_finite() && *fee > 0.0)
            .unwrap_or(default)
    }
}

/// A cart line resolved against its product document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub item_id: ItemId,
    pub product_id: ProductId,
    /// Matched option id, or the product id for products bought without one.
    pub option_id: OptionId,
    pub vendor_id: VendorId,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    pub label: String,
    pub image_url: Option<String>,
    pub shipping_fee: f64,
}

impl CartLine {
    /// Resolve a server cart entry against its product.
    ///
    /// A matching option supplies price, image and label; otherwise the base
    /// product price and first image are used with an empty label.
    pub fn resolve(
        item: &ServerCartItem,
        product: &Product,
        vendor_id: VendorId,
        shipping_fee: f64,
    ) -> Self {
        let option = item
            .option_id
            .as_ref()
            .and_then(|id| product.find_option(id));

        match option {
            Some(opt) => Self {
                item_id: ItemId::compose(&product.id, Some(&opt.id)),
                product_id: product.id.clone(),
                option_id: opt.id.clone(),
                vendor_id,
                name: product.name.clone(),
                quantity: item.quantity,
                price: if opt.price > 0.0 { opt.price } else { product.price },
                label: opt.label.clone(),
                image_url: Some(opt.image_url.clone())
                    .filter(|u| !u.is_empty())
                    .or_else(|| product.primary_image().map(String::from)),
                shipping_fee,
            },
            None => Self {
                item_id: ItemId::compose(&product.id, None),
                product_id: product.id.clone(),
                option_id: OptionId::new(product.id.as_str()),
                vendor_id,
                name: product.name.clone(),
                quantity: item.quantity,
                price: product.price,
                label: String::new(),
                image_url: product.primary_image().map(String::from),
                shipping_fee,
            },
        }
    }

    /// Quantity after applying `delta`, if it stays within
    /// `MIN_QUANTITY..=max`.
    pub fn quantity_after(&self, delta: i64, max: i64) -> Result<i64, CommerceError> {
        let requested = self.quantity.saturating_add(delta);
        if !(MIN_QUANTITY..=max).contains(&requested) {
            return Err(CommerceError::QuantityOutOfRange {
                requested,
                min: MIN_QUANTITY,
                max,
            });
        }
        Ok(requested)
    }

    /// Apply `delta` to the quantity. The line is unchanged on error.
    pub fn apply_delta(&mut self, delta: i64, max: i64) -> Result<i64, CommerceError> {
        let next = self.quantity_after(delta, max)?;
        self.quantity = next;
        Ok(next)
    }

    /// `price * quantity`.
    pub fn line_total(&self, currency: Currency) -> Money {
        Money::from_decimal(self.price, currency) * self.quantity.max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProductOption;

    fn product() -> Product {
        Product {
            id: ProductId::new("p1"),
            name: "Rice".into(),
            price: 40.0,
            image_urls: vec!["base.png".into()],
            option: vec![ProductOption {
                id: OptionId::new("o1"),
                price: 55.0,
                label: "5kg".into(),
                image_url: "opt.png".into(),
                stock: 3,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn entry(option: Option<&str>, quantity: i64) -> ServerCartItem {
        ServerCartItem {
            product_id: ProductId::new("p1"),
            option_id: option.map(OptionId::new),
            quantity,
        }
    }

    #[test]
    fn test_resolve_with_matching_option() {
        let line = CartLine::resolve(&entry(Some("o1"), 2), &product(), VendorId::new("v1"), 50.0);
        assert_eq!(line.item_id, "p1-o1");
        assert_eq!(line.option_id, "o1");
        assert_eq!(line.price, 55.0);
        assert_eq!(line.label, "5kg");
        assert_eq!(line.image_url.as_deref(), Some("opt.png"));
    }

    #[test]
    fn test_resolve_falls_back_to_base_product() {
        let line = CartLine::resolve(&entry(Some("gone"), 1), &product(), VendorId::new("v1"), 50.0);
        assert_eq!(line.item_id, "p1-default");
        assert_eq!(line.option_id, "p1");
        assert_eq!(line.price, 40.0);
        assert_eq!(line.label, "");
        assert_eq!(line.image_url.as_deref(), Some("base.png"));
    }

    #[test]
    fn test_apply_delta_bounds() {
        let mut line = CartLine::resolve(&entry(Some("o1"), 50), &product(), VendorId::new("v1"), 50.0);
        assert!(line.apply_delta(1, MAX_QUANTITY).is_err());
        assert_eq!(line.quantity, 50);

        line.quantity = 1;
        let err = line.apply_delta(-1, MAX_QUANTITY).unwrap_err();
        assert_eq!(
            err,
            CommerceError::QuantityOutOfRange {
                requested: 0,
                min: 1,
                max: 50
            }
        );
        assert_eq!(line.quantity, 1);
        assert_eq!(line.apply_delta(3, MAX_QUANTITY), Ok(4));
    }

    #[test]
    fn test_shipping_fee_default() {
        let cart: ServerCart = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert_eq!(cart.shipping_fee_or(DEFAULT_SHIPPING_FEE), 50.0);
        let cart: ServerCart = serde_json::from_str(r#"{"items":[],"shippingFee":80}"#).unwrap();
        assert_eq!(cart.shipping_fee_or(DEFAULT_SHIPPING_FEE), 80.0);
    }
}
