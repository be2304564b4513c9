//! Newtype IDs for type-safe identifiers.
//!
//! The API hands out Mongo-style string ids everywhere; wrapping them keeps a
//! product id from being passed where an option id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate newtype ID structs.
macro_rules! define_id {
    ($name:ident) => {
        /// A unique identifier.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the id is empty (documents without an `_id`).
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Consume and return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

define_id!(ProductId);
define_id!(OptionId);
define_id!(VendorId);
define_id!(OrderId);
define_id!(UserId);
define_id!(ItemId);

impl OptionId {
    /// Placeholder id for an option that only exists locally until the
    /// server assigns a real one.
    pub fn temporary() -> Self {
        Self(format!("temp-{}", chrono::Utc::now().timestamp_millis()))
    }

    /// Whether this id was produced by [`OptionId::temporary`].
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with("temp-")
    }
}

impl ItemId {
    /// Compose the cart item id for a product/option pair.
    ///
    /// Lines without a matching option use the literal `default`.
    pub fn compose(product_id: &ProductId, option_id: Option<&OptionId>) -> Self {
        let option = option_id.map(OptionId::as_str).unwrap_or("default");
        Self(format!("{}-{}", product_id, option))
    }
}

/// Seconds encoded in the leading four bytes of an ObjectId-style hex id.
pub fn object_id_seconds(id: &str) -> Option<i64> {
    let head = id.get(..8)?;
    i64::from_str_radix(head, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id = ProductId::new("prod-123");
        assert_eq!(id.as_str(), "prod-123");
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = OrderId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        let back: OrderId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_item_id_compose() {
        let product = ProductId::new("p1");
        assert_eq!(
            ItemId::compose(&product, Some(&OptionId::new("o1"))).as_str(),
            "p1-o1"
        );
        assert_eq!(ItemId::compose(&product, None).as_str(), "p1-default");
    }

    #[test]
    fn test_temporary_option_id() {
        let id = OptionId::temporary();
        assert!(id.is_temporary());
        assert!(!OptionId::new("64b7f0c2aa").is_temporary());
    }

    #[test]
    fn test_object_id_seconds() {
        assert_eq!(object_id_seconds("64b7f0c2e4b0a1a2b3c4d5e6"), Some(0x64b7f0c2));
        assert_eq!(object_id_seconds("short"), None);
        assert_eq!(object_id_seconds("zzzzzzzzzzzz"), None);
    }
}
