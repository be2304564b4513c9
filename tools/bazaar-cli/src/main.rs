//! Bazaar CLI - command line client for the Bazaar marketplace.
//!
//! Commands:
//! - `bazaar session` - Show the current session
//! - `bazaar login` / `bazaar logout`
//! - `bazaar products` - Browse or search the catalog
//! - `bazaar cart` - Show and edit the cart
//! - `bazaar orders` - Vendor order table, status changes, shipping; your own orders
//! - `bazaar config` - Manage configuration

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{CartArgs, ConfigArgs, LoginArgs, OrdersArgs, ProductsArgs};

/// Bazaar CLI - browse, shop and manage a store from the terminal
#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether you are signed in
    Session,

    /// Sign in
    Login(LoginArgs),

    /// Sign out
    Logout,

    /// Browse or search products
    Products(ProductsArgs),

    /// Show and edit the cart
    Cart(CartArgs),

    /// Manage orders
    Orders(OrdersArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);
    let ctx = match context::Context::load(cli.config.as_deref(), output.clone(), cli.verbose) {
        Ok(ctx) => ctx,
        Err(e) => {
            output.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Session => commands::session::show(&ctx).await,
        Commands::Login(args) => commands::session::login(args, &ctx).await,
        Commands::Logout => commands::session::logout(&ctx).await,
        Commands::Products(args) => commands::products::run(args, &ctx).await,
        Commands::Cart(args) => commands::cart::run(args, &ctx).await,
        Commands::Orders(args) => commands::orders::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
