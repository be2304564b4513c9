//! Checkout totals for the selected lines.

use crate::cart::{GroupedCart, SelectionSet};
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// Totals shown at checkout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CartSummary {
    /// Sum of `price * quantity` over selected lines.
    pub subtotal: Money,
    /// Each vendor group with a selected line contributes its fee once.
    pub shipping: Money,
    pub total: Money,
    pub selected_count: usize,
    pub line_count: usize,
}

impl CartSummary {
    pub fn compute(view: &GroupedCart, selection: &SelectionSet, currency: Currency) -> Self {
        let subtotal = Money::sum(
            view.lines()
                .filter(|l| selection.contains(&l.item_id))
                .map(|l| l.line_total(currency)),
            currency,
        );
        let shipping = Money::sum(
            view.groups
                .iter()
                .filter(|g| g.item_ids().any(|id| selection.contains(id)))
                .map(|g| Money::from_decimal(g.shipping_fee, currency)),
            currency,
        );
        Self {
            subtotal,
            shipping,
            total: subtotal + shipping,
            selected_count: selection.len(),
            line_count: view.line_count(),
        }
    }
}
