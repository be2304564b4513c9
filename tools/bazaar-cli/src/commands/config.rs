//! Configuration management commands.

use std::fs;
use std::str::FromStr;

use anyhow::{bail, Context as _, Result};
use bazaar_sdk::ClientConfig;
use serde_json::json;

use super::{ConfigArgs, ConfigCommand};
use crate::config::generate_default_config;
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Get { key } => get_config(&key, ctx),
        ConfigCommand::Set { key, value } => set_config(&key, &value, ctx),
        ConfigCommand::Init { base_url, force } => init_config(&base_url, force, ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }
    let rendered = ctx
        .config
        .render("bazaar.toml")
        .context("Failed to render configuration")?;
    println!("\n{rendered}");
    Ok(())
}

fn get_config(key: &str, ctx: &Context) -> Result<()> {
    let value = get_config_value(&ctx.config, key)?;
    if ctx.output.is_json() {
        ctx.output.json(&json!({ "key": key, "value": value }));
    } else {
        println!("{value}");
    }
    Ok(())
}

fn set_config(key: &str, value: &str, ctx: &Context) -> Result<()> {
    let Some(config_path) = &ctx.config_path else {
        bail!("No config file found. Run `bazaar config init` first.");
    };
    let path = config_path.to_string_lossy();

    // Environment overrides are not written back.
    let mut config = ClientConfig::load(&path)?;
    set_config_value(&mut config, key, value)?;
    fs::write(config_path, config.render(&path)?)
        .with_context(|| format!("Failed to write {path}"))?;

    ctx.output.success(&format!("Set {key} = {value}"));
    Ok(())
}

fn init_config(base_url: &str, force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("bazaar.toml");
    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }
    fs::write(&config_path, generate_default_config(base_url))?;
    ctx.output
        .success(&format!("Created: {}", config_path.display()));
    Ok(())
}

fn get_config_value(config: &ClientConfig, key: &str) -> Result<String> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["api", "base_url"] => Ok(config.api.base_url.clone()),
        ["api", "timeout_ms"] => Ok(config.api.timeout_ms.to_string()),
        ["api", "max_retries"] => Ok(config.api.max_retries.to_string()),
        ["cart", "max_concurrency"] => Ok(config.cart.max_concurrency.to_string()),
        ["cart", "debounce_ms"] => Ok(config.cart.debounce_ms.to_string()),
        ["cart", "default_shipping_fee"] => Ok(config.cart.default_shipping_fee.to_string()),
        ["cart", "max_quantity"] => Ok(config.cart.max_quantity.to_string()),
        ["catalog", "page_size"] => Ok(config.catalog.page_size.to_string()),
        ["catalog", "featured_count"] => Ok(config.catalog.featured_count.to_string()),
        ["orders", "page_size"] => Ok(config.orders.page_size.to_string()),
        ["orders", "freshness_secs"] => Ok(config.orders.freshness_secs.to_string()),
        ["logging", "level"] => Ok(config.logging.level.to_string()),
        ["logging", "format"] => Ok(format!("{:?}", config.logging.format).to_lowercase()),
        _ => bail!("Unknown config key: {}", key),
    }
}

fn set_config_value(config: &mut ClientConfig, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["api", "base_url"] => config.api.base_url = value.trim().to_string(),
        ["api", "timeout_ms"] => config.api.timeout_ms = parse(key, value)?,
        ["api", "max_retries"] => config.api.max_retries = parse(key, value)?,
        ["cart", "max_concurrency"] => config.cart.max_concurrency = parse(key, value)?,
        ["cart", "debounce_ms"] => config.cart.debounce_ms = parse(key, value)?,
        ["cart", "default_shipping_fee"] => config.cart.default_shipping_fee = parse(key, value)?,
        ["cart", "max_quantity"] => config.cart.max_quantity = parse(key, value)?,
        ["catalog", "page_size"] => config.catalog.page_size = parse(key, value)?,
        ["catalog", "featured_count"] => config.catalog.featured_count = parse(key, value)?,
        ["orders", "page_size"] => config.orders.page_size = parse(key, value)?,
        ["orders", "freshness_secs"] => config.orders.freshness_secs = parse(key, value)?,
        ["logging", "level"] => config.logging.level = parse(key, value)?,
        ["logging", "format"] => config.logging.format = parse(key, value)?,
        _ => bail!("Unknown config key: {}", key),
    }

    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    match value.trim().parse() {
        Ok(parsed) => Ok(parsed),
        Err(_) => bail!("Invalid value for {key}: {value}"),
    }
}
