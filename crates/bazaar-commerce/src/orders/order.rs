//! Order types and the client-side status machine.

use crate::address::Address;
use crate::catalog::parse_timestamp_millis;
use crate::error::CommerceError;
use crate::ids::{OptionId, OrderId, ProductId, UserId, VendorId};
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, awaiting payment.
    #[default]
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Check if order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Statuses a client may move an order into from this one.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Paid],
            OrderStatus::Paid => &[OrderStatus::Shipped, OrderStatus::Delivered],
            OrderStatus::Shipped => &[OrderStatus::Delivered, OrderStatus::Cancelled],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CommerceError::Validation(format!("unknown order status: {s}")))
    }
}

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ]
        .into_iter()
        .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| CommerceError::Validation(format!("unknown payment status: {s}")))
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Wallet,
    Gcash,
    Cod,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Gcash => "gcash",
            PaymentMethod::Cod => "cod",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wallet" => Ok(PaymentMethod::Wallet),
            "gcash" => Ok(PaymentMethod::Gcash),
            "cod" => Ok(PaymentMethod::Cod),
            other => Err(CommerceError::Validation(format!(
                "unknown payment method: {other}"
            ))),
        }
    }
}

/// A purchased line on an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderItem {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub img_url: Option<String>,
    pub label: Option<String>,
    pub quantity: i64,
    pub product_id: Option<ProductId>,
    pub option_id: Option<OptionId>,
    pub price: f64,
    pub name: String,
}

/// Who wrote an agreement message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Customer,
    Vendor,
}

/// Note exchanged between customer and vendor about an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgreementMessage {
    pub sender: Sender,
    pub message: String,
    pub timestamp: String,
}

/// An order as the API returns it.
///
/// Unknown fields are carried through `extra` so a snapshot restores the
/// record exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    /// Human-readable order number.
    pub order_id: Option<String>,
    pub customer_id: Option<UserId>,
    pub vendor_id: Option<VendorId>,
    #[serde(deserialize_with = "items_or_empty")]
    pub items: Vec<OrderItem>,
    /// Customer name.
    pub name: String,
    pub shipping_option: Option<String>,
    pub shipping_fee: f64,
    pub agreement_details: Option<String>,
    pub agreement_messages: Vec<AgreementMessage>,
    pub sub_total: f64,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_notes: Option<String>,
    pub status: OrderStatus,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Order {
    /// Creation time in epoch milliseconds, if parseable.
    pub fn created_millis(&self) -> Option<i64> {
        self.created_at.as_deref().and_then(parse_timestamp_millis)
    }

    /// Order number if present, else the document id.
    pub fn display_id(&self) -> &str {
        self.order_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(self.id.as_str())
    }

    /// Get total item count.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Subtotal plus shipping.
    pub fn grand_total(&self, currency: Currency) -> Money {
        Money::from_decimal(self.sub_total, currency) + Money::from_decimal(self.shipping_fee, currency)
    }

    /// Cancelled orders are never printed on packing slips.
    pub fn can_print(&self) -> bool {
        self.status != OrderStatus::Cancelled
    }

    /// Validate a client status change against the transition table.
    ///
    /// Returns `Ok(false)` when the order already has that status.
    pub fn check_transition(&self, next: OrderStatus) -> Result<bool, CommerceError> {
        if self.status == next {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(CommerceError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        Ok(true)
    }

    /// Customers may cancel until the order ships.
    pub fn check_cancel(&self) -> Result<(), CommerceError> {
        match self.status {
            OrderStatus::Pending | OrderStatus::Paid => Ok(()),
            from => Err(CommerceError::InvalidTransition {
                from,
                to: OrderStatus::Cancelled,
            }),
        }
    }

    /// Set the status along with its implied payment side effects.
    pub fn apply_status(&mut self, next: OrderStatus) {
        self.status = next;
        if next == OrderStatus::Paid {
            self.payment_status = PaymentStatus::Paid;
        }
        if next == OrderStatus::Cancelled && self.payment_status == PaymentStatus::Paid {
            self.payment_status = PaymentStatus::Refunded;
        }
    }

    /// Mark shipped with validated shipment details.
    pub fn apply_shipment(&mut self, shipment: &Shipment) {
        self.status = OrderStatus::Shipped;
        self.tracking_number = Some(shipment.tracking_number.clone());
        self.shipping_carrier = Some(shipment.carrier.clone());
        self.shipped_at = Some(shipment.ship_date.clone());
        if let Some(notes) = &shipment.notes {
            self.shipping_notes = Some(notes.clone());
        }
    }
}

/// Anything but an array of items reads as no items.
fn items_or_empty<'de, D>(deserializer: D) -> Result<Vec<OrderItem>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
        serde_json::Value::Array(_) => serde_json::from_value(raw).unwrap_or_default(),
        _ => Vec::new(),
    })
}

/// Shipment details as entered by the vendor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShipPayload {
    pub tracking_number: String,
    pub carrier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ShipPayload {
    /// Check the order can ship and trim the required fields.
    ///
    /// `now` fills in a missing ship date.
    pub fn validate(&self, order: &Order, now: &str) -> Result<Shipment, CommerceError> {
        if order.status != OrderStatus::Paid {
            return Err(CommerceError::Validation(
                "Only paid orders can be shipped".into(),
            ));
        }
        let tracking_number = self.tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(CommerceError::Validation(
                "Tracking number is required".into(),
            ));
        }
        let carrier = self.carrier.trim();
        if carrier.is_empty() {
            return Err(CommerceError::Validation("Carrier is required".into()));
        }
        Ok(Shipment {
            tracking_number: tracking_number.to_string(),
            carrier: carrier.to_string(),
            ship_date: self
                .ship_date
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| now.to_string()),
            notes: self.notes.clone().filter(|n| !n.is_empty()),
            status: OrderStatus::Shipped,
        })
    }
}

/// Validated shipment, also the request body of the ship call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub tracking_number: String,
    pub carrier: String,
    pub ship_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: OrderStatus, payment: PaymentStatus) -> Order {
        Order {
            id: OrderId::new("o1"),
            status,
            payment_status: payment,
            ..Default::default()
        }
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Shipped));
        assert!(Paid.can_transition_to(Delivered));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Shipped.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Cancelled));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Shipped));
        assert!(Cancelled.allowed_transitions().is_empty());
    }

    #[test]
    fn test_customer_cancel_window() {
        assert!(order(OrderStatus::Pending, PaymentStatus::Pending).check_cancel().is_ok());
        assert!(order(OrderStatus::Paid, PaymentStatus::Paid).check_cancel().is_ok());
        assert!(matches!(
            order(OrderStatus::Shipped, PaymentStatus::Paid).check_cancel(),
            Err(CommerceError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_check_transition() {
        let o = order(OrderStatus::Delivered, PaymentStatus::Paid);
        assert_eq!(o.check_transition(OrderStatus::Delivered), Ok(false));
        assert_eq!(
            o.check_transition(OrderStatus::Pending),
            Err(CommerceError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending
            })
        );
    }

    #[test]
    fn test_status_side_effects() {
        let mut o = order(OrderStatus::Pending, PaymentStatus::Pending);
        o.apply_status(OrderStatus::Paid);
        assert_eq!(o.payment_status, PaymentStatus::Paid);

        o.apply_status(OrderStatus::Cancelled);
        assert_eq!(o.payment_status, PaymentStatus::Refunded);

        let mut cod = order(OrderStatus::Shipped, PaymentStatus::Pending);
        cod.apply_status(OrderStatus::Cancelled);
        assert_eq!(cod.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_ship_payload_validation() {
        let paid = order(OrderStatus::Paid, PaymentStatus::Paid);
        let payload = ShipPayload {
            tracking_number: "  TRK1 ".into(),
            carrier: " LBC".into(),
            ..Default::default()
        };
        let shipment = payload.validate(&paid, "2024-05-01T00:00:00Z").unwrap();
        assert_eq!(shipment.tracking_number, "TRK1");
        assert_eq!(shipment.carrier, "LBC");
        assert_eq!(shipment.ship_date, "2024-05-01T00:00:00Z");

        let blank = ShipPayload {
            tracking_number: " ".into(),
            carrier: "LBC".into(),
            ..Default::default()
        };
        assert!(blank.validate(&paid, "now").is_err());

        let pending = order(OrderStatus::Pending, PaymentStatus::Pending);
        assert!(payload.validate(&pending, "now").is_err());
    }

    #[test]
    fn test_order_deserializes_sparse_and_keeps_extra_fields() {
        let o: Order = serde_json::from_str(
            r#"{"_id":"a1","status":"paid","paymentStatus":"Paid","paymentMethod":"gcash","riderId":"r9"}"#,
        )
        .unwrap();
        assert!(o.items.is_empty());
        assert_eq!(o.payment_method, PaymentMethod::Gcash);
        assert_eq!(o.extra.get("riderId").and_then(|v| v.as_str()), Some("r9"));
        let back = serde_json::to_value(&o).unwrap();
        assert_eq!(back["riderId"], "r9");
    }

    #[test]
    fn test_non_array_items_read_as_empty() {
        let o: Order = serde_json::from_str(r#"{"_id":"a1","items":null}"#).unwrap();
        assert!(o.items.is_empty());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
