//! Orders module.
//!
//! Order documents, the status machine with its payment side effects, and
//! the listing pipeline used by the vendor order table.

mod checkout;
mod listing;
mod order;

pub use checkout::CheckoutOrder;
pub use listing::{
    clamp_page, filter_orders, page_count, paginate, run_listing, sort_orders, OrderPage,
    OrderQuery, StatusCounts, DEFAULT_PAGE_SIZE,
};
pub use order::{
    AgreementMessage, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, Sender,
    ShipPayload, Shipment,
};
