//! User types.

use std::str::FromStr;

use bazaar_commerce::address::Address;
use bazaar_commerce::ids::UserId;
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular customer.
    #[default]
    User,
    /// Store owner with a dashboard.
    Vendor,
    Admin,
    /// Delivery rider.
    Rider,
}

impl Role {
    /// Get role as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Vendor => "vendor",
            Role::Admin => "admin",
            Role::Rider => "rider",
        }
    }

    /// Can manage products and orders of a store.
    pub fn can_sell(&self) -> bool {
        matches!(self, Role::Vendor | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "vendor" => Ok(Role::Vendor),
            "admin" => Ok(Role::Admin),
            "rider" => Ok(Role::Rider),
            other => Err(AuthError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Wallet {
    pub cash: f64,
}

/// Profile document from `/user/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub avatar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub address: Address,
    pub wallet: Wallet,
    pub role: Role,
    pub is_verified: bool,
    pub total_orders: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl User {
    /// Get display name, falling back to the email.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }

    pub fn wallet_balance(&self) -> f64 {
        self.wallet.cash
    }
}

/// Identity carried by the session check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub role: Role,
}

/// Body of `POST /user/register`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub otp: String,
    /// Extra fields forwarded as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("vendor".parse::<Role>().unwrap(), Role::Vendor);
        assert_eq!(
            "owner".parse::<Role>(),
            Err(AuthError::UnknownRole("owner".into()))
        );
        assert!(Role::Vendor.can_sell());
        assert!(!Role::Rider.can_sell());
    }

    #[test]
    fn test_user_document_defaults() {
        let user: User = serde_json::from_value(serde_json::json!({
            "_id": "u1",
            "name": "",
            "email": "ana@example.com",
            "role": "rider",
            "wallet": {"cash": 125.5}
        }))
        .unwrap();
        assert_eq!(user.display_name(), "ana@example.com");
        assert_eq!(user.wallet_balance(), 125.5);
        assert_eq!(user.role, Role::Rider);
        assert!(!user.is_verified);
    }

    #[test]
    fn test_registration_flattens_extra() {
        let mut reg = Registration {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password: "pw".into(),
            otp: "123456".into(),
            ..Default::default()
        };
        reg.extra
            .insert("phone".into(), serde_json::json!("0917"));
        let value = serde_json::to_value(&reg).unwrap();
        assert_eq!(value["phone"], "0917");
        assert_eq!(value["otp"], "123456");
    }
}
