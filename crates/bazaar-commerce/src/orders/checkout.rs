//! Checkout request built from a vendor group.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::cart::{SelectionSet, VendorGroup};
use crate::error::CommerceError;
use crate::ids::VendorId;
use crate::money::{Currency, Money};
use crate::orders::{OrderItem, PaymentMethod};

/// Body of `POST /order`. One order is placed per vendor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOrder {
    pub vendor_id: VendorId,
    pub items: Vec<OrderItem>,
    /// Customer name.
    pub name: String,
    pub shipping_option: String,
    pub shipping_fee: f64,
    pub sub_total: f64,
    pub payment_method: PaymentMethod,
    pub shipping_address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement_details: Option<String>,
}

impl CheckoutOrder {
    /// Order for the selected lines of `group`.
    ///
    /// Fails when nothing in the group is selected or the customer name is
    /// blank.
    pub fn from_group(
        group: &VendorGroup,
        selection: &SelectionSet,
        name: &str,
        shipping_address: Address,
        payment_method: PaymentMethod,
    ) -> Result<Self, CommerceError> {
        if name.trim().is_empty() {
            return Err(CommerceError::Validation("Customer name is required".into()));
        }
        let items: Vec<OrderItem> = group
            .items
            .iter()
            .filter(|line| selection.contains(&line.item_id))
            .map(|line| OrderItem {
                id: None,
                img_url: line.image_url.clone(),
                label: Some(line.label.clone()).filter(|l| !l.is_empty()),
                quantity: line.quantity,
                product_id: Some(line.product_id.clone()),
                option_id: Some(line.option_id.clone()),
                price: line.price,
                name: line.name.clone(),
            })
            .collect();
        if items.is_empty() {
            return Err(CommerceError::Validation(format!(
                "No items selected from {}",
                group.shop_name
            )));
        }

        let currency = Currency::default();
        let sub_total = Money::sum(
            items
                .iter()
                .map(|i| Money::from_decimal(i.price, currency) * i.quantity),
            currency,
        );
        Ok(Self {
            vendor_id: group.shop_id.clone(),
            items,
            name: name.trim().to_string(),
            shipping_option: "standard".to_string(),
            shipping_fee: group.shipping_fee,
            sub_total: sub_total.to_decimal(),
            payment_method,
            shipping_address,
            agreement_details: None,
        })
    }

    pub fn with_agreement(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        self.agreement_details = Some(details).filter(|d| !d.trim().is_empty());
        self
    }
}
