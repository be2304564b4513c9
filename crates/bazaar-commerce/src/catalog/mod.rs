//! Product catalog module.
//!
//! Contains the canonical product/option shapes, normalization of server
//! documents, listing cursors and client-side sorting.

mod cursor;
mod normalize;
mod product;
mod sort;

pub use cursor::{Cursor, DEFAULT_LIMIT};
pub use normalize::{
    inferred_timestamp, normalize_option, normalize_product, parse_timestamp_millis,
    sort_options_by_created, sort_products_by_created, vendor_id_of,
};
pub use product::{capitalize_first, NewOption, NewProduct, OptionPatch, Product, ProductOption};
pub use sort::{category_facets, ProductSort, ALL};
