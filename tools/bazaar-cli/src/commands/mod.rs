//! CLI command implementations.

pub mod cart;
pub mod config;
pub mod orders;
pub mod products;
pub mod session;

use clap::{Args, Subcommand};

/// Arguments for the login command.
#[derive(Args)]
pub struct LoginArgs {
    /// Account email (prompted if omitted).
    #[arg(short, long)]
    pub email: Option<String>,
}

/// Arguments for the products command.
#[derive(Args)]
pub struct ProductsArgs {
    /// Only this category.
    #[arg(short, long)]
    pub category: Option<String>,

    /// Only this municipality.
    #[arg(short, long)]
    pub region: Option<String>,

    /// Search instead of browsing.
    #[arg(short, long)]
    pub search: Option<String>,

    /// Sort: default, price-asc, price-desc, most-sold, rating.
    #[arg(long, default_value = "default")]
    pub sort: String,

    /// Pages to load.
    #[arg(short, long, default_value = "1")]
    pub pages: usize,
}

/// Arguments for the cart command.
#[derive(Args)]
pub struct CartArgs {
    #[command(subcommand)]
    pub command: Option<CartCommand>,
}

#[derive(Subcommand)]
pub enum CartCommand {
    /// Show the cart grouped by shop.
    Show,
    /// Add a product.
    Add {
        /// Product id.
        product: String,
        /// Option id.
        #[arg(short, long)]
        option: Option<String>,
        #[arg(short, long, default_value = "1")]
        quantity: i64,
    },
    /// Change a line's quantity by a signed amount.
    Quantity {
        /// Shop (vendor) id.
        shop: String,
        /// Product id.
        product: String,
        /// Option id, or the product id for products without options.
        option: String,
        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },
    /// Remove a line.
    Remove {
        /// Shop (vendor) id.
        shop: String,
        /// Item id as shown by `cart show`.
        item: String,
    },
    /// Empty the cart.
    Clear {
        /// Skip confirmation.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the orders command.
#[derive(Args)]
pub struct OrdersArgs {
    #[command(subcommand)]
    pub command: OrdersCommand,
}

#[derive(Subcommand)]
pub enum OrdersCommand {
    /// The vendor order table.
    List {
        /// Search id, customer or item name.
        #[arg(short, long)]
        search: Option<String>,
        /// Status tab.
        #[arg(long)]
        status: Option<String>,
        /// First day, YYYY-MM-DD.
        #[arg(long)]
        from: Option<String>,
        /// Last day, YYYY-MM-DD.
        #[arg(long)]
        to: Option<String>,
        #[arg(short, long, default_value = "1")]
        page: usize,
    },
    /// Move a vendor order to another status.
    Status {
        id: String,
        /// New status (prompted if omitted).
        status: Option<String>,
        #[arg(short, long)]
        yes: bool,
    },
    /// Mark a vendor order shipped.
    Ship {
        id: String,
        #[arg(long)]
        tracking: String,
        #[arg(long)]
        carrier: String,
        /// Ship date, RFC 3339 (defaults to now).
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Orders placed by the signed-in customer.
    Mine {
        #[arg(long)]
        status: Option<String>,
    },
    /// Cancel one of your orders.
    Cancel {
        id: String,
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration.
    Show,
    /// Get a config value.
    Get {
        /// Dot-separated key, e.g. `cart.debounce_ms`.
        key: String,
    },
    /// Set a value in the config file.
    Set { key: String, value: String },
    /// Write a starter bazaar.toml.
    Init {
        /// API base URL.
        #[arg(long, default_value = "http://localhost:5000/api")]
        base_url: String,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}
