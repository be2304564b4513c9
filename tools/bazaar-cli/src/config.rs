//! Locating and generating the client config file.

use std::path::{Path, PathBuf};

/// Looked up in this order in each directory.
pub const CONFIG_NAMES: [&str; 3] = ["bazaar.toml", ".bazaar.toml", "bazaar.json"];

/// First config file found in `start` or any parent directory.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        for name in CONFIG_NAMES {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Starter `bazaar.toml`.
pub fn generate_default_config(base_url: &str) -> String {
    format!(
        r#"# Bazaar client configuration

[api]
base_url = "{base_url}"
timeout_ms = 15000
max_retries = 2

[cart]
max_concurrency = 10
debounce_ms = 300
default_shipping_fee = 50.0
max_quantity = 50

[catalog]
page_size = 15
featured_count = 8

[orders]
page_size = 12
freshness_secs = 15

[logging]
level = "warn"
format = "human"
"#
    )
}
