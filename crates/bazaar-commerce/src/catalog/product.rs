//! Product and option types.

use crate::ids::{OptionId, ProductId, VendorId};
use serde::{Deserialize, Serialize};

/// A purchasable option of a product (size, colour, bundle...).
///
/// Options are owned by exactly one product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductOption {
    #[serde(rename = "_id")]
    pub id: OptionId,
    pub image_url: String,
    pub price: f64,
    pub label: String,
    pub stock: i64,
    pub sold: i64,
    pub is_hot: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ProductOption {
    /// Whether the option can currently be bought.
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// A product in the catalog, in canonical shape.
///
/// Build one from a server document with [`crate::catalog::normalize_product`];
/// the derived `stock`/`sold`/`is_option` fields are kept in sync with
/// [`Product::recompute_aggregates`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<VendorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i64,
    pub sold: i64,
    pub option: Vec<ProductOption>,
    pub categories: Vec<String>,
    pub image_urls: Vec<String>,
    pub is_new: bool,
    pub is_hot: bool,
    pub is_approved: bool,
    pub is_option: bool,
    pub average_rating: f64,
    pub num_reviews: i64,
    pub municipality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Product {
    /// Recompute `stock`, `sold` and `is_option` from the option list.
    ///
    /// Products without options keep their own stock figures.
    pub fn recompute_aggregates(&mut self) {
        if self.option.is_empty() {
            self.is_option = false;
            return;
        }
        self.stock = self.option.iter().map(|o| o.stock).sum();
        self.sold = self.option.iter().map(|o| o.sold).sum();
        self.is_option = true;
    }

    /// Find an option by id.
    pub fn find_option(&self, option_id: &OptionId) -> Option<&ProductOption> {
        self.option.iter().find(|o| &o.id == option_id)
    }

    /// Find an option by id, mutably.
    pub fn find_option_mut(&mut self, option_id: &OptionId) -> Option<&mut ProductOption> {
        self.option.iter_mut().find(|o| &o.id == option_id)
    }

    /// Drop options that have no stock left.
    pub fn drop_out_of_stock_options(&mut self) {
        self.option.retain(ProductOption::in_stock);
    }

    /// First product image, if any.
    pub fn primary_image(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }
}

/// Options payload sent when creating a product.
///
/// Parent `image_urls`, `stock` and `sold` are derived from the options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i64,
    pub sold: i64,
    pub categories: Vec<String>,
    pub image_urls: Vec<String>,
    pub option: Vec<NewOption>,
    pub municipality: String,
    pub is_new: bool,
    pub is_hot: bool,
}

impl NewProduct {
    /// Fill the parent's derived fields from its options.
    pub fn derive_from_options(&mut self) {
        if self.option.is_empty() {
            return;
        }
        self.image_urls = self
            .option
            .iter()
            .filter(|o| !o.image_url.is_empty())
            .map(|o| o.image_url.clone())
            .collect();
        self.stock = self.option.iter().map(|o| o.stock).sum();
        self.sold = self.option.iter().map(|o| o.sold).sum();
    }
}

/// A new or edited option before it reaches the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewOption {
    pub image_url: String,
    pub price: f64,
    pub label: Option<String>,
    pub stock: i64,
    pub sold: i64,
    pub is_hot: bool,
}

impl NewOption {
    /// Canonical form: trimmed image url, capitalised label, no negatives.
    pub fn normalized(mut self) -> Self {
        self.image_url = self.image_url.trim().to_string();
        self.label = self.label.as_deref().and_then(capitalize_first);
        self.stock = self.stock.max(0);
        self.sold = self.sold.max(0);
        if !self.price.is_finite() || self.price < 0.0 {
            self.price = 0.0;
        }
        self
    }

    /// Local stand-in used while the server call is in flight.
    pub fn to_pending_option(&self) -> ProductOption {
        let now = chrono::Utc::now().to_rfc3339();
        ProductOption {
            id: OptionId::temporary(),
            image_url: self.image_url.clone(),
            price: self.price,
            label: self.label.clone().unwrap_or_default(),
            stock: self.stock,
            sold: self.sold,
            is_hot: self.is_hot,
            created_at: Some(now.clone()),
            updated_at: Some(now),
        }
    }
}

/// Partial option edit. `None` fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OptionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hot: Option<bool>,
}

impl OptionPatch {
    /// Capitalise the label if one is being set.
    pub fn normalized(mut self) -> Self {
        if let Some(label) = self.label.take() {
            self.label = Some(capitalize_first(&label).unwrap_or_default());
        }
        self
    }

    /// Merge the patch into an option and stamp `updated_at`.
    pub fn apply_to(&self, option: &mut ProductOption) {
        if let Some(url) = &self.image_url {
            option.image_url = url.clone();
        }
        if let Some(price) = self.price {
            option.price = price;
        }
        if let Some(label) = &self.label {
            option.label = label.clone();
        }
        if let Some(stock) = self.stock {
            option.stock = stock;
        }
        if let Some(sold) = self.sold {
            option.sold = sold;
        }
        if let Some(hot) = self.is_hot {
            option.is_hot = hot;
        }
        option.updated_at = Some(chrono::Utc::now().to_rfc3339());
    }
}

/// Trim and upper-case the first character. Blank input gives `None`.
pub fn capitalize_first(s: &str) -> Option<String> {
    let trimmed = s.trim();
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, stock: i64, sold: i64) -> ProductOption {
        ProductOption {
            id: OptionId::new(id),
            stock,
            sold,
            ..Default::default()
        }
    }

    #[test]
    fn test_recompute_aggregates_sums_options() {
        let mut product = Product {
            stock: 999,
            sold: 999,
            option: vec![option("a", 3, 1), option("b", 4, 2)],
            ..Default::default()
        };
        product.recompute_aggregates();
        assert_eq!(product.stock, 7);
        assert_eq!(product.sold, 3);
        assert!(product.is_option);
    }

    #[test]
    fn test_recompute_aggregates_without_options() {
        let mut product = Product {
            stock: 5,
            is_option: true,
            ..Default::default()
        };
        product.recompute_aggregates();
        assert_eq!(product.stock, 5);
        assert!(!product.is_option);
    }

    #[test]
    fn test_drop_out_of_stock_options() {
        let mut product = Product {
            option: vec![option("a", 0, 1), option("b", 2, 0)],
            ..Default::default()
        };
        product.drop_out_of_stock_options();
        assert_eq!(product.option.len(), 1);
        assert_eq!(product.option[0].id, "b");
    }

    #[test]
    fn test_capitalize_first() {
        assert_eq!(capitalize_first("  large ").as_deref(), Some("Large"));
        assert_eq!(capitalize_first("   "), None);
    }

    #[test]
    fn test_new_product_derives_from_options() {
        let mut product = NewProduct {
            option: vec![
                NewOption {
                    image_url: "a.png".into(),
                    stock: 2,
                    sold: 1,
                    ..Default::default()
                },
                NewOption {
                    stock: 3,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        product.derive_from_options();
        assert_eq!(product.image_urls, vec!["a.png".to_string()]);
        assert_eq!(product.stock, 5);
        assert_eq!(product.sold, 1);
    }

    #[test]
    fn test_option_patch_apply() {
        let mut opt = option("a", 1, 0);
        OptionPatch {
            label: Some("red".into()),
            stock: Some(9),
            ..Default::default()
        }
        .normalized()
        .apply_to(&mut opt);
        assert_eq!(opt.label, "Red");
        assert_eq!(opt.stock, 9);
        assert!(opt.updated_at.is_some());
    }
}
