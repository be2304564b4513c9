//! Vendor-grouped cart view.

use crate::cart::CartLine;
use crate::ids::{ItemId, OptionId, VendorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback shop name when the vendor lookup yields none.
pub const DEFAULT_SHOP_NAME: &str = "Shop";

/// Cart lines bucketed by seller.
///
/// A group stored in a [`GroupedCart`] never has an empty item list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VendorGroup {
    pub shop_id: VendorId,
    pub shop_name: String,
    pub shipping_fee: f64,
    pub items: Vec<CartLine>,
    pub date: DateTime<Utc>,
}

impl VendorGroup {
    pub fn new(shop_id: VendorId, shop_name: Option<String>, shipping_fee: f64) -> Self {
        Self {
            shop_id,
            shop_name: shop_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SHOP_NAME.to_string()),
            shipping_fee,
            items: Vec::new(),
            date: Utc::now(),
        }
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter().map(|l| &l.item_id)
    }
}

/// The cart as shown at checkout: one group per vendor, in first-seen order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GroupedCart {
    pub groups: Vec<VendorGroup>,
}

impl GroupedCart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `line` to its vendor's group, creating the group if needed.
    ///
    /// A line with the same item id already in the group is replaced.
    pub fn insert_line(
        &mut self,
        shop_name: impl FnOnce() -> Option<String>,
        shipping_fee: f64,
        line: CartLine,
    ) {
        let idx = match self.groups.iter().position(|g| g.shop_id == line.vendor_id) {
            Some(idx) => idx,
            None => {
                self.groups.push(VendorGroup::new(
                    line.vendor_id.clone(),
                    shop_name(),
                    shipping_fee,
                ));
                self.groups.len() - 1
            }
        };
        let group = &mut self.groups[idx];
        group.items.retain(|l| l.item_id != line.item_id);
        group.items.insert(0, line);
    }

    pub fn group(&self, shop_id: &VendorId) -> Option<&VendorGroup> {
        self.groups.iter().find(|g| &g.shop_id == shop_id)
    }

    pub fn line(&self, item_id: &ItemId) -> Option<&CartLine> {
        self.lines().find(|l| &l.item_id == item_id)
    }

    /// Line of `shop_id` bought with `option_id`.
    pub fn line_by_option_mut(
        &mut self,
        shop_id: &VendorId,
        option_id: &OptionId,
    ) -> Option<&mut CartLine> {
        self.groups
            .iter_mut()
            .find(|g| &g.shop_id == shop_id)?
            .items
            .iter_mut()
            .find(|l| &l.option_id == option_id)
    }

    pub fn line_by_option(&self, shop_id: &VendorId, option_id: &OptionId) -> Option<&CartLine> {
        self.group(shop_id)?
            .items
            .iter()
            .find(|l| &l.option_id == option_id)
    }

    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.groups.iter().flat_map(|g| g.items.iter())
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.lines().map(|l| &l.item_id)
    }

    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.line(item_id).is_some()
    }

    pub fn line_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Remove one line; drops the group when it becomes empty.
    pub fn remove_line(&mut self, shop_id: &VendorId, item_id: &ItemId) -> Option<CartLine> {
        let gidx = self.groups.iter().position(|g| &g.shop_id == shop_id)?;
        let group = &mut self.groups[gidx];
        let lidx = group.items.iter().position(|l| &l.item_id == item_id)?;
        let removed = group.items.remove(lidx);
        if group.items.is_empty() {
            self.groups.remove(gidx);
        }
        Some(removed)
    }

    /// Remove every line matching `pred`; empty groups are dropped.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&CartLine) -> bool) -> Vec<CartLine> {
        let mut removed = Vec::new();
        for group in &mut self.groups {
            let (gone, kept): (Vec<_>, Vec<_>) =
                std::mem::take(&mut group.items).into_iter().partition(|l| pred(l));
            group.items = kept;
            removed.extend(gone);
        }
        self.groups.retain(|g| !g.items.is_empty());
        removed
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ProductId;

    fn line(vendor: &str, product: &str, option: &str) -> CartLine {
        CartLine {
            item_id: ItemId::new(format!("{product}-{option}")),
            product_id: ProductId::new(product),
            option_id: OptionId::new(option),
            vendor_id: VendorId::new(vendor),
            name: product.to_string(),
            quantity: 1,
            price: 10.0,
            label: String::new(),
            image_url: None,
            shipping_fee: 50.0,
        }
    }

    fn named(name: &str) -> impl FnOnce() -> Option<String> + '_ {
        move || Some(name.to_string())
    }

    #[test]
    fn test_groups_created_lazily_and_lines_prepended() {
        let mut cart = GroupedCart::new();
        cart.insert_line(named("Farm"), 50.0, line("v1", "p1", "a"));
        cart.insert_line(named("Farm"), 50.0, line("v1", "p1", "b"));
        cart.insert_line(|| None, 50.0, line("v2", "p2", "c"));

        assert_eq!(cart.groups.len(), 2);
        let v1 = cart.group(&VendorId::new("v1")).unwrap();
        assert_eq!(v1.shop_name, "Farm");
        let ids: Vec<&str> = v1.item_ids().map(ItemId::as_str).collect();
        assert_eq!(ids, vec!["p1-b", "p1-a"]);
        assert_eq!(cart.group(&VendorId::new("v2")).unwrap().shop_name, "Shop");
    }

    #[test]
    fn test_same_item_replaced_not_duplicated() {
        let mut cart = GroupedCart::new();
        cart.insert_line(|| None, 50.0, line("v1", "p1", "a"));
        let mut again = line("v1", "p1", "a");
        again.quantity = 4;
        cart.insert_line(|| None, 50.0, again);
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.line(&ItemId::new("p1-a")).unwrap().quantity, 4);
    }

    #[test]
    fn test_remove_last_line_drops_group() {
        let mut cart = GroupedCart::new();
        cart.insert_line(|| None, 50.0, line("v1", "p1", "a"));
        cart.insert_line(|| None, 50.0, line("v1", "p1", "b"));
        cart.insert_line(|| None, 50.0, line("v2", "p2", "c"));

        assert!(cart
            .remove_line(&VendorId::new("v2"), &ItemId::new("p2-c"))
            .is_some());
        assert!(cart.group(&VendorId::new("v2")).is_none());

        cart.remove_line(&VendorId::new("v1"), &ItemId::new("p1-a"));
        assert_eq!(cart.group(&VendorId::new("v1")).unwrap().items.len(), 1);
        assert!(cart
            .remove_line(&VendorId::new("v1"), &ItemId::new("missing"))
            .is_none());
    }

    #[test]
    fn test_remove_where() {
        let mut cart = GroupedCart::new();
        cart.insert_line(|| None, 50.0, line("v1", "p1", "a"));
        cart.insert_line(|| None, 50.0, line("v2", "p2", "c"));
        let removed = cart.remove_where(|l| l.vendor_id == "v2");
        assert_eq!(removed.len(), 1);
        assert_eq!(cart.groups.len(), 1);
    }
}
