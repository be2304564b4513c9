//! Client configuration.
//!
//! Loaded from TOML (or JSON, chosen by file extension) and then overridden by
//! `BAZAAR_*` environment variables.

use std::path::Path;
use std::time::Duration;

use bazaar_commerce::cart::{DEFAULT_SHIPPING_FEE, MAX_QUANTITY};
use bazaar_commerce::catalog::DEFAULT_LIMIT;
use bazaar_commerce::orders::DEFAULT_PAGE_SIZE;
use bazaar_data::{FetchPolicy, RetryPolicy, TimeoutConfig};
use bazaar_observability::LogConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse JSON config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub cart: CartConfig,
    pub catalog: CatalogConfig,
    pub orders: OrdersConfig,
    pub logging: LogConfig,
}

/// `[api]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Total time per request attempt.
    pub timeout_ms: u64,
    /// Extra attempts for idempotent requests.
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_ms: 15_000,
            max_retries: 2,
        }
    }
}

impl ApiConfig {
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy::new(
            TimeoutConfig::from_total(Duration::from_millis(self.timeout_ms)),
            RetryPolicy::new(self.max_retries),
        )
    }
}

/// `[cart]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartConfig {
    /// Lines resolved concurrently during aggregation.
    pub max_concurrency: usize,
    /// Quiet period before a quantity change is sent.
    pub debounce_ms: u64,
    pub default_shipping_fee: f64,
    pub max_quantity: i64,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            debounce_ms: 300,
            default_shipping_fee: DEFAULT_SHIPPING_FEE,
            max_quantity: MAX_QUANTITY,
        }
    }
}

impl CartConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// `[catalog]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub page_size: u32,
    pub featured_count: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_LIMIT,
            featured_count: 8,
        }
    }
}

/// `[orders]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdersConfig {
    pub page_size: usize,
    /// A vendor order list fetched more recently than this is reused.
    pub freshness_secs: u64,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            freshness_secs: 15,
        }
    }
}

impl OrdersConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }
}

fn is_json(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl ClientConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(path, &content)
    }

    /// Parse `content`, picking the format from `path`'s extension.
    pub fn parse(path: &str, content: &str) -> Result<Self, ConfigError> {
        if is_json(path) {
            serde_json::from_str(content).map_err(|source| ConfigError::Json {
                path: path.to_string(),
                source,
            })
        } else {
            toml::from_str(content).map_err(|source| ConfigError::Toml {
                path: path.to_string(),
                source,
            })
        }
    }

    /// Render in the format matching `path`.
    pub fn render(&self, path: &str) -> Result<String, ConfigError> {
        if is_json(path) {
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
        } else {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
        }
    }

    /// Apply `BAZAAR_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(std::env::vars())
    }

    /// Apply overrides from `(name, value)` pairs.
    ///
    /// Recognized names: `BAZAAR_API_BASE_URL`, `BAZAAR_API_TIMEOUT_MS`,
    /// `BAZAAR_API_MAX_RETRIES`, `BAZAAR_CART_DEBOUNCE_MS`,
    /// `BAZAAR_CART_MAX_CONCURRENCY`, `BAZAAR_CATALOG_PAGE_SIZE`,
    /// `BAZAAR_ORDERS_PAGE_SIZE`, `BAZAAR_LOG_LEVEL`, `BAZAAR_LOG_FORMAT`.
    pub fn apply_vars<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            match key {
                "BAZAAR_API_BASE_URL" => self.api.base_url = value.to_string(),
                "BAZAAR_API_TIMEOUT_MS" => self.api.timeout_ms = parse_var(key, value)?,
                "BAZAAR_API_MAX_RETRIES" => self.api.max_retries = parse_var(key, value)?,
                "BAZAAR_CART_DEBOUNCE_MS" => self.cart.debounce_ms = parse_var(key, value)?,
                "BAZAAR_CART_MAX_CONCURRENCY" => {
                    self.cart.max_concurrency = parse_var(key, value)?
                }
                "BAZAAR_CATALOG_PAGE_SIZE" => self.catalog.page_size = parse_var(key, value)?,
                "BAZAAR_ORDERS_PAGE_SIZE" => self.orders.page_size = parse_var(key, value)?,
                "BAZAAR_LOG_LEVEL" => self.logging.level = parse_var(key, value)?,
                "BAZAAR_LOG_FORMAT" => self.logging.format = parse_var(key, value)?,
                _ => {}
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_observability::{LogFormat, LogLevel};

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.cart.max_concurrency, 10);
        assert_eq!(config.cart.debounce(), Duration::from_millis(300));
        assert_eq!(config.cart.max_quantity, 50);
        assert_eq!(config.catalog.page_size, 15);
        assert_eq!(config.orders.page_size, 12);
        assert_eq!(config.orders.freshness(), Duration::from_secs(15));
    }

    #[test]
    fn test_parse_toml_partial() {
        let config = ClientConfig::parse(
            "bazaar.toml",
            r#"
            [api]
            base_url = "https://api.bazaar.test"

            [cart]
            debounce_ms = 500

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://api.bazaar.test");
        assert_eq!(config.api.timeout_ms, 15_000);
        assert_eq!(config.cart.debounce_ms, 500);
        assert_eq!(config.cart.max_concurrency, 10);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_parse_json_by_extension() {
        let config =
            ClientConfig::parse("conf/bazaar.JSON", r#"{"orders": {"page_size": 20}}"#).unwrap();
        assert_eq!(config.orders.page_size, 20);
        assert!(matches!(
            ClientConfig::parse("bazaar.toml", r#"{"orders": 1}"#),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    fn test_render_round_trips() {
        let config = ClientConfig::default();
        let text = config.render("bazaar.toml").unwrap();
        assert_eq!(ClientConfig::parse("bazaar.toml", &text).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ClientConfig::default();
        config
            .apply_vars([
                ("BAZAAR_API_BASE_URL", "https://staging.test"),
                ("BAZAAR_CART_DEBOUNCE_MS", "50"),
                ("BAZAAR_LOG_LEVEL", "debug"),
                ("HOME", "/root"),
            ])
            .unwrap();
        assert_eq!(config.api.base_url, "https://staging.test");
        assert_eq!(config.cart.debounce_ms, 50);
        assert_eq!(config.logging.level, LogLevel::Debug);

        let err = config
            .apply_vars([("BAZAAR_API_TIMEOUT_MS", "soon")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ClientConfig::load("/nonexistent/bazaar.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}
