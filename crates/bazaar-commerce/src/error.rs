//! Commerce error types.

use thiserror::Error;

use crate::orders::OrderStatus;

/// Errors raised by local validation before anything reaches the network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommerceError {
    /// Product not found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Option not found on a product.
    #[error("Option not found: {0}")]
    OptionNotFound(String),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Item not in cart.
    #[error("Item not in cart: {0}")]
    ItemNotInCart(String),

    /// Quantity change would leave the allowed range.
    #[error("Quantity {requested} outside allowed range {min}..={max}")]
    QuantityOutOfRange { requested: i64, min: i64, max: i64 },

    /// Order status change not in the transition table.
    #[error("Invalid order transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}
