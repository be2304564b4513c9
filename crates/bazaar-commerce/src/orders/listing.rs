//! Client-side order listing: filter, sort, paginate.
//!
//! Every stage is a pure function over the loaded order list.

use crate::orders::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::sort::SortDirection;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default orders per page.
pub const DEFAULT_PAGE_SIZE: usize = 12;

/// Filters of the vendor order table. `None` means "all".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
    /// Inclusive, from the start of the day (UTC).
    pub date_from: Option<NaiveDate>,
    /// Inclusive, to the end of the day (UTC).
    pub date_to: Option<NaiveDate>,
    /// Case-insensitive match on order number, customer name or tracking number.
    pub search: String,
    pub sort: SortDirection,
}

impl OrderQuery {
    fn bounds(&self) -> (Option<i64>, Option<i64>) {
        let from = self
            .date_from
            .and_then(|d| d.and_hms_milli_opt(0, 0, 0, 0))
            .map(|dt| dt.and_utc().timestamp_millis());
        let to = self
            .date_to
            .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
            .map(|dt| dt.and_utc().timestamp_millis());
        (from, to)
    }

    /// Whether `order` passes every filter.
    ///
    /// Orders without a readable creation time never match a date bound.
    pub fn matches(&self, order: &Order) -> bool {
        if self.status.is_some_and(|s| s != order.status) {
            return false;
        }
        if self.payment_method.is_some_and(|m| m != order.payment_method) {
            return false;
        }
        if self.payment_status.is_some_and(|s| s != order.payment_status) {
            return false;
        }

        let (from, to) = self.bounds();
        if from.is_some() || to.is_some() {
            let Some(t) = order.created_millis() else {
                return false;
            };
            if from.is_some_and(|f| t < f) || to.is_some_and(|e| t > e) {
                return false;
            }
        }

        let q = self.search.trim().to_lowercase();
        if !q.is_empty() {
            let hit = |s: Option<&str>| s.is_some_and(|s| s.to_lowercase().contains(&q));
            if !(hit(order.order_id.as_deref())
                || hit(Some(order.name.as_str()))
                || hit(order.tracking_number.as_deref()))
            {
                return false;
            }
        }
        true
    }

    pub fn is_filtered(&self) -> bool {
        self.status.is_some()
            || self.payment_method.is_some()
            || self.payment_status.is_some()
            || self.date_from.is_some()
            || self.date_to.is_some()
            || !self.search.trim().is_empty()
    }
}

/// Orders passing `query`, in input order.
pub fn filter_orders<'a>(orders: &'a [Order], query: &OrderQuery) -> Vec<&'a Order> {
    orders.iter().filter(|o| query.matches(o)).collect()
}

/// Sort by creation time; unreadable times sort as the epoch.
pub fn sort_orders(orders: &mut [&Order], dir: SortDirection) {
    orders.sort_by(|a, b| {
        let av = a.created_millis().unwrap_or(0);
        let bv = b.created_millis().unwrap_or(0);
        dir.apply(av.cmp(&bv))
    });
}

/// Number of pages, never less than one.
pub fn page_count(len: usize, page_size: usize) -> usize {
    let size = page_size.max(1);
    len.div_ceil(size).max(1)
}

/// Clamp a 1-based page into `1..=page_count`.
pub fn clamp_page(page: usize, len: usize, page_size: usize) -> usize {
    page.clamp(1, page_count(len, page_size))
}

/// One page of a sorted list.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Vec<T> {
    let size = page_size.max(1);
    let page = clamp_page(page, items.len(), size);
    items
        .iter()
        .skip((page - 1) * size)
        .take(size)
        .cloned()
        .collect()
}

/// Result of running the whole pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPage {
    pub items: Vec<Order>,
    /// Page actually shown, after clamping.
    pub page: usize,
    pub page_count: usize,
    /// Filtered length.
    pub total: usize,
}

/// Filter, sort and paginate in one go.
pub fn run_listing(orders: &[Order], query: &OrderQuery, page: usize, page_size: usize) -> OrderPage {
    let mut filtered = filter_orders(orders, query);
    sort_orders(&mut filtered, query.sort);
    let total = filtered.len();
    let page = clamp_page(page, total, page_size);
    OrderPage {
        items: paginate(&filtered, page, page_size)
            .into_iter()
            .cloned()
            .collect(),
        page,
        page_count: page_count(total, page_size),
        total,
    }
}

/// Per-status tally of the unfiltered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatusCounts {
    pub all: usize,
    pub pending: usize,
    pub paid: usize,
    pub shipped: usize,
    pub delivered: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn tally(orders: &[Order]) -> Self {
        let mut counts = StatusCounts {
            all: orders.len(),
            ..Default::default()
        };
        for o in orders {
            *counts.slot_mut(o.status) += 1;
        }
        counts
    }

    pub fn get(&self, status: OrderStatus) -> usize {
        match status {
            OrderStatus::Pending => self.pending,
            OrderStatus::Paid => self.paid,
            OrderStatus::Shipped => self.shipped,
            OrderStatus::Delivered => self.delivered,
            OrderStatus::Cancelled => self.cancelled,
        }
    }

    fn slot_mut(&mut self, status: OrderStatus) -> &mut usize {
        match status {
            OrderStatus::Pending => &mut self.pending,
            OrderStatus::Paid => &mut self.paid,
            OrderStatus::Shipped => &mut self.shipped,
            OrderStatus::Delivered => &mut self.delivered,
            OrderStatus::Cancelled => &mut self.cancelled,
        }
    }
}
