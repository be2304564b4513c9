//! Marketplace domain types and logic for Bazaar.
//!
//! Everything here is pure: no I/O, no clocks beyond stamping new records.
//!
//! - **Catalog**: products, options, document normalization, listing cursor, sorting
//! - **Cart**: resolved cart lines, vendor groups, selection, checkout totals
//! - **Orders**: order documents, status machine, filter/sort/paginate pipeline
//! - **Tracking**: rider position cache
//!
//! # Example
//!
//! ```rust
//! use bazaar_commerce::prelude::*;
//!
//! let line = CartLine {
//!     item_id: ItemId::new("p1-o1"),
//!     product_id: ProductId::new("p1"),
//!     option_id: OptionId::new("o1"),
//!     vendor_id: VendorId::new("v1"),
//!     name: "Mangoes".to_string(),
//!     quantity: 2,
//!     price: 120.0,
//!     label: "1kg".to_string(),
//!     image_url: None,
//!     shipping_fee: 50.0,
//! };
//!
//! let mut cart = GroupedCart::new();
//! cart.insert_line(|| Some("Farm Fresh".to_string()), 50.0, line);
//!
//! let mut selection = SelectionSet::new();
//! selection.toggle_all(&cart);
//!
//! let summary = CartSummary::compute(&cart, &selection, Currency::PHP);
//! assert_eq!(summary.total.amount_cents, 29000);
//! ```

pub mod address;
pub mod error;
pub mod ids;
pub mod money;
pub mod sort;

pub mod cart;
pub mod catalog;
pub mod orders;
pub mod tracking;
pub mod vendor;

pub use error::CommerceError;
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::address::Address;
    pub use crate::error::CommerceError;
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};
    pub use crate::sort::SortDirection;

    // Catalog
    pub use crate::catalog::{
        normalize_product, Cursor, NewOption, NewProduct, OptionPatch, Product, ProductOption,
        ProductSort,
    };

    // Cart
    pub use crate::cart::{
        CartLine, CartSummary, GroupedCart, SelectionSet, ServerCart, ServerCartItem, VendorGroup,
    };

    // Orders
    pub use crate::orders::{
        CheckoutOrder, Order, OrderItem, OrderPage, OrderQuery, OrderStatus, PaymentMethod,
        PaymentStatus, ShipPayload, StatusCounts,
    };

    // Tracking and vendors
    pub use crate::tracking::{RiderLocation, RiderTracker};
    pub use crate::vendor::{Seller, VendorProfile};
}
