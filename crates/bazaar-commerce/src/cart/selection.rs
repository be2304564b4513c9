//! Checkout selection over a [`GroupedCart`].

use crate::cart::GroupedCart;
use crate::ids::{ItemId, VendorId};
use serde::{Deserialize, Serialize};

/// Ordered set of selected item ids.
///
/// Every mutating operation takes the current view and refuses ids that do
/// not resolve to a line in it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct SelectionSet {
    ids: Vec<ItemId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemId> {
        self.ids.iter()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn remove(&mut self, id: &ItemId) {
        self.ids.retain(|i| i != id);
    }

    /// Toggle one line. Returns false, changing nothing, for unknown ids.
    pub fn toggle_item(&mut self, view: &GroupedCart, id: &ItemId) -> bool {
        if !view.contains(id) {
            return false;
        }
        if self.contains(id) {
            self.remove(id);
        } else {
            self.ids.push(id.clone());
        }
        true
    }

    /// Select every line of a group, or deselect them all if they already
    /// are. Returns false for unknown or empty groups.
    pub fn toggle_group(&mut self, view: &GroupedCart, shop_id: &VendorId) -> bool {
        let Some(group) = view.group(shop_id).filter(|g| !g.items.is_empty()) else {
            return false;
        };
        let group_ids: Vec<&ItemId> = group.item_ids().collect();
        if group_ids.iter().all(|id| self.contains(id)) {
            self.ids.retain(|id| !group_ids.contains(&id));
        } else {
            for id in group_ids {
                if !self.contains(id) {
                    self.ids.push(id.clone());
                }
            }
        }
        true
    }

    /// Select everything, or clear the selection if everything already is.
    pub fn toggle_all(&mut self, view: &GroupedCart) {
        if self.is_all_selected(view) {
            self.ids.clear();
        } else {
            self.ids = view.item_ids().cloned().collect();
        }
    }

    pub fn is_group_selected(&self, view: &GroupedCart, shop_id: &VendorId) -> bool {
        view.group(shop_id)
            .filter(|g| !g.items.is_empty())
            .is_some_and(|g| g.item_ids().all(|id| self.contains(id)))
    }

    /// True when the cart has lines and all of them are selected.
    pub fn is_all_selected(&self, view: &GroupedCart) -> bool {
        view.line_count() > 0 && view.item_ids().all(|id| self.contains(id))
    }

    /// Drop ids that no longer resolve to a line.
    pub fn prune(&mut self, view: &GroupedCart) {
        self.ids.retain(|id| view.contains(id));
    }
}
