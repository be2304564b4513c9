//! Order commands: the vendor order table and the customer's own orders.

use anyhow::{bail, Context as _, Result};
use bazaar_sdk::commerce::ids::OrderId;
use bazaar_sdk::commerce::money::Currency;
use bazaar_sdk::commerce::orders::{Order, OrderStatus, ShipPayload};
use bazaar_sdk::FetchOptions;
use chrono::NaiveDate;
use dialoguer::{Confirm, Select};
use serde_json::json;

use super::{OrdersArgs, OrdersCommand};
use crate::context::Context;
use crate::output::{status_badge, truncate};

const WIDTHS: [usize; 5] = [26, 22, 12, 12, 6];

pub async fn run(args: OrdersArgs, ctx: &Context) -> Result<()> {
    ctx.require_session().await?;
    match args.command {
        OrdersCommand::List {
            search,
            status,
            from,
            to,
            page,
        } => list(ctx, search, status, from, to, page).await,
        OrdersCommand::Status { id, status, yes } => update_status(ctx, id, status, yes).await,
        OrdersCommand::Ship {
            id,
            tracking,
            carrier,
            date,
            notes,
        } => {
            load_vendor_orders(ctx).await?;
            let payload = ShipPayload {
                tracking_number: tracking,
                carrier,
                ship_date: date,
                notes,
            };
            ctx.market
                .vendor_orders()
                .ship(&OrderId::new(id), &payload)
                .await?;
            Ok(())
        }
        OrdersCommand::Mine { status } => mine(ctx, status).await,
        OrdersCommand::Cancel { id, yes } => cancel(ctx, id, yes).await,
    }
}

async fn load_vendor_orders(ctx: &Context) -> Result<()> {
    let spinner = ctx.output.spinner("Loading orders...");
    let loaded = ctx.market.vendor_orders().fetch(FetchOptions::forced()).await;
    spinner.finish_and_clear();
    loaded?;
    Ok(())
}

fn parse_status(status: Option<&str>) -> Result<Option<OrderStatus>> {
    match status {
        None => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => Ok(Some(s.parse()?)),
    }
}

fn parse_day(day: Option<&str>, flag: &str) -> Result<Option<NaiveDate>> {
    day.map(|d| {
        NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .with_context(|| format!("--{flag} must be YYYY-MM-DD, got {d}"))
    })
    .transpose()
}

async fn list(
    ctx: &Context,
    search: Option<String>,
    status: Option<String>,
    from: Option<String>,
    to: Option<String>,
    page: usize,
) -> Result<()> {
    let status = parse_status(status.as_deref())?;
    let from = parse_day(from.as_deref(), "from")?;
    let to = parse_day(to.as_deref(), "to")?;

    load_vendor_orders(ctx).await?;
    let store = ctx.market.vendor_orders();
    store.set_search(search.as_deref().unwrap_or_default());
    store.set_status(status);
    store.set_date_range(from, to);
    store.set_page(page);
    let listing = store.page();

    if ctx.output.is_json() {
        ctx.output.json(&json!({
            "page": listing.page,
            "pageCount": listing.page_count,
            "total": listing.total,
            "orders": listing.items,
        }));
        return Ok(());
    }

    let counts = store.status_counts();
    ctx.output.header("Orders");
    ctx.output.kv(
        "tabs",
        &OrderStatus::ALL
            .iter()
            .map(|s| format!("{} {}", s.display_name(), counts.get(*s)))
            .collect::<Vec<_>>()
            .join("  "),
    );
    if listing.items.is_empty() {
        ctx.output.info("No orders match");
        return Ok(());
    }
    print_orders(ctx, &listing.items);
    ctx.output.info(&format!(
        "Page {} of {} ({} orders)",
        listing.page, listing.page_count, listing.total
    ));
    Ok(())
}

fn print_orders(ctx: &Context, orders: &[Order]) {
    ctx.output
        .table_row(&["ORDER", "CUSTOMER", "STATUS", "TOTAL", "ITEMS"], &WIDTHS);
    for order in orders {
        // Pad before styling so the escape codes don't skew the column.
        let status = format!("{:width$}", order.status.display_name(), width = WIDTHS[2]);
        let status = status.replacen(
            order.status.display_name(),
            &status_badge(order.status),
            1,
        );
        ctx.output.table_row(
            &[
                order.display_id(),
                &truncate(&order.name, WIDTHS[1]),
                &status,
                &order.grand_total(Currency::default()).display(),
                &order.item_count().to_string(),
            ],
            &WIDTHS,
        );
    }
}

async fn update_status(
    ctx: &Context,
    id: String,
    status: Option<String>,
    yes: bool,
) -> Result<()> {
    load_vendor_orders(ctx).await?;
    let store = ctx.market.vendor_orders();
    let id = OrderId::new(id);
    let Some(order) = store.order(&id) else {
        bail!("Order {id} not found");
    };

    let next = match parse_status(status.as_deref())? {
        Some(next) => next,
        None => {
            let allowed = store.allowed_transitions(&order);
            if allowed.is_empty() {
                bail!(
                    "Order {} is {} and cannot change status",
                    order.display_id(),
                    order.status.display_name()
                );
            }
            if ctx.output.is_json() {
                bail!("A status is required with --json");
            }
            let names: Vec<&str> = allowed.iter().map(|s| s.display_name()).collect();
            let choice = Select::new()
                .with_prompt(format!("Move {} to", order.display_id()))
                .items(&names[..])
                .default(0)
                .interact()?;
            allowed[choice]
        }
    };

    if !yes && !ctx.output.is_json() {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Change {} from {} to {}?",
                order.display_id(),
                order.status.display_name(),
                next.display_name()
            ))
            .default(true)
            .interact()?;
        if !confirmed {
            ctx.output.info("Cancelled");
            return Ok(());
        }
    }

    store.update_status(&id, next).await?;
    Ok(())
}

async fn mine(ctx: &Context, status: Option<String>) -> Result<()> {
    let status = parse_status(status.as_deref())?;
    let store = ctx.market.orders();
    let spinner = ctx.output.spinner("Loading your orders...");
    let loaded = store.fetch().await;
    spinner.finish_and_clear();
    loaded?;

    let orders = match status {
        Some(status) => store.by_status(status),
        None => store.orders(),
    };
    if ctx.output.is_json() {
        ctx.output.json(&orders);
        return Ok(());
    }
    ctx.output.header("Your orders");
    if orders.is_empty() {
        ctx.output.info("No orders yet");
        return Ok(());
    }
    print_orders(ctx, &orders);
    Ok(())
}

async fn cancel(ctx: &Context, id: String, yes: bool) -> Result<()> {
    let store = ctx.market.orders();
    store.fetch().await?;
    let id = OrderId::new(id);

    if !yes && !ctx.output.is_json() {
        let confirmed = Confirm::new()
            .with_prompt(format!("Cancel order {id}?"))
            .default(false)
            .interact()?;
        if !confirmed {
            ctx.output.info("Kept the order");
            return Ok(());
        }
    }

    store.cancel(&id).await?;
    Ok(())
}
