//! Shopping cart module.
//!
//! Pure parts of the multi-vendor cart: resolving server entries into lines,
//! the vendor-grouped view, the checkout selection and totals.

mod line;
mod pricing;
mod selection;
mod view;

pub use line::{
    CartLine, ServerCart, ServerCartItem, DEFAULT_SHIPPING_FEE, MAX_QUANTITY, MIN_QUANTITY,
};
pub use pricing::CartSummary;
pub use selection::SelectionSet;
pub use view::{GroupedCart, VendorGroup, DEFAULT_SHOP_NAME};
