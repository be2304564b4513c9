//! Client-side product sorting and category facets.
//!
//! Sorting only reorders what has been loaded so far; it never implies a
//! server-side re-sort.

use crate::catalog::Product;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Sort orders offered in the storefront listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProductSort {
    /// Server order.
    #[default]
    None,
    PriceAsc,
    PriceDesc,
    MostSold,
    BestRating,
}

impl ProductSort {
    pub fn display_name(&self) -> &'static str {
        match self {
            ProductSort::None => "Default",
            ProductSort::PriceAsc => "Price: Low to High",
            ProductSort::PriceDesc => "Price: High to Low",
            ProductSort::MostSold => "Most Sold",
            ProductSort::BestRating => "Best Rating",
        }
    }

    /// Reorder `products` in place. Stable, so ties keep server order.
    pub fn apply(&self, products: &mut [Product]) {
        let by_f64 = |a: f64, b: f64| a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        match self {
            ProductSort::None => {}
            ProductSort::PriceAsc => products.sort_by(|a, b| by_f64(a.price, b.price)),
            ProductSort::PriceDesc => products.sort_by(|a, b| by_f64(b.price, a.price)),
            ProductSort::MostSold => products.sort_by(|a, b| b.sold.cmp(&a.sold)),
            ProductSort::BestRating => {
                products.sort_by(|a, b| by_f64(b.average_rating, a.average_rating))
            }
        }
    }
}

impl FromStr for ProductSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', '_', ' ', ':'], "");
        match key.as_str() {
            "" | "none" | "default" => Ok(ProductSort::None),
            "priceasc" | "pricelowtohigh" => Ok(ProductSort::PriceAsc),
            "pricedesc" | "pricehightolow" => Ok(ProductSort::PriceDesc),
            "mostsold" | "sold" => Ok(ProductSort::MostSold),
            "bestrating" | "rating" => Ok(ProductSort::BestRating),
            _ => Err(format!("unknown sort: {s}")),
        }
    }
}

/// Sentinel for "no category/region filter".
pub const ALL: &str = "all";

/// Distinct categories across `products`, sorted, with [`ALL`] first.
pub fn category_facets(products: &[Product]) -> Vec<String> {
    let distinct: BTreeSet<&str> = products
        .iter()
        .flat_map(|p| p.categories.iter())
        .map(String::as_str)
        .filter(|c| !c.is_empty() && *c != ALL)
        .collect();
    std::iter::once(ALL.to_string())
        .chain(distinct.into_iter().map(String::from))
        .collect()
}
