//! Vendor (seller) types.

use crate::address::Address;
use crate::ids::{UserId, VendorId};
use serde::{Deserialize, Serialize};

/// Public seller card, as returned by `GET /vendor/:id/details`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Seller {
    pub store_name: String,
    pub description: String,
    pub image_url: String,
    pub user_id: UserId,
    #[serde(deserialize_with = "follower_ids")]
    pub followers: Vec<UserId>,
    pub rating: f64,
    pub num_ratings: i64,
    pub total_products: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl Seller {
    pub fn follower_count(&self) -> usize {
        self.followers.len()
    }

    pub fn is_followed_by(&self, user: &UserId) -> bool {
        self.followers.contains(user)
    }

    /// Add or remove `user` from the follower list. Returns the new state.
    pub fn toggle_follower(&mut self, user: &UserId) -> bool {
        if let Some(pos) = self.followers.iter().position(|f| f == user) {
            self.followers.remove(pos);
            false
        } else {
            self.followers.push(user.clone());
            true
        }
    }
}

/// One month of the revenue chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MonthlyRevenueComparison {
    pub month: String,
    pub current_value: f64,
    pub previous_value: f64,
}

/// Wallet balances of a vendor account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AccountBalance {
    pub cash: f64,
    pub usdt: f64,
}

/// The signed-in vendor's own profile, as returned by `GET /vendor`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorProfile {
    #[serde(rename = "_id")]
    pub id: VendorId,
    pub user_id: UserId,
    pub store_name: String,
    pub description: Option<String>,
    pub address: Option<Address>,
    pub image_url: Option<String>,
    pub banner_url: Option<String>,
    pub is_approved: bool,
    pub documents_submitted: bool,
    #[serde(deserialize_with = "follower_ids")]
    pub followers: Vec<UserId>,
    pub rating: f64,
    pub num_ratings: i64,
    pub account_balance: AccountBalance,
    pub total_products: i64,
    pub total_orders: i64,
    pub total_revenue: f64,
    pub profile_views: i64,
    pub product_clicks: i64,
    pub current_monthly_revenue: f64,
    pub monthly_revenue_comparison: Vec<MonthlyRevenueComparison>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Followers come as plain ids or as populated `{_id, ...}` users.
fn follower_ids<'de, D>(deserializer: D) -> Result<Vec<UserId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde_json::Value;

    let raw = Value::deserialize(deserializer)?;
    let Value::Array(items) = raw else {
        return Ok(Vec::new());
    };
    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(id) => Some(id.as_str()),
            Value::Object(user) => user.get("_id").and_then(Value::as_str),
            _ => None,
        })
        .filter(|id| !id.is_empty())
        .map(UserId::new)
        .collect())
}
