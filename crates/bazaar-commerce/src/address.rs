//! Address types.

use serde::{Deserialize, Serialize};

/// A Philippine postal address as stored on users, vendors and orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub street: Option<String>,
    pub barangay: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub zip_code: Option<String>,
    /// `[latitude, longitude]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<[f64; 2]>,
}

impl Address {
    /// Format as single line, skipping blank and `N/A` parts.
    pub fn one_line(&self) -> String {
        [
            &self.street,
            &self.barangay,
            &self.city,
            &self.province,
            &self.zip_code,
        ]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "N/A")
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_skips_placeholders() {
        let addr = Address {
            street: Some("N/A".into()),
            barangay: Some("Poblacion".into()),
            city: Some("Tagum".into()),
            zip_code: Some(" ".into()),
            ..Default::default()
        };
        assert_eq!(addr.one_line(), "Poblacion, Tagum");
    }

    #[test]
    fn test_deserialize_partial() {
        let addr: Address =
            serde_json::from_str(r#"{"city":"Davao","coordinates":[7.07,125.6]}"#).unwrap();
        assert_eq!(addr.city.as_deref(), Some("Davao"));
        assert_eq!(addr.coordinates, Some([7.07, 125.6]));
    }
}
