//! Cart commands.

use anyhow::Result;
use bazaar_sdk::commerce::cart::CartSummary;
use bazaar_sdk::commerce::ids::{ItemId, OptionId, ProductId, VendorId};
use bazaar_sdk::commerce::money::{Currency, Money};
use dialoguer::Confirm;
use serde_json::json;

use super::{CartArgs, CartCommand};
use crate::context::Context;
use crate::output::truncate;

pub async fn run(args: CartArgs, ctx: &Context) -> Result<()> {
    ctx.require_session().await?;
    match args.command.unwrap_or(CartCommand::Show) {
        CartCommand::Show => show(ctx).await,
        CartCommand::Add {
            product,
            option,
            quantity,
        } => {
            let option = option.map(OptionId::new);
            ctx.market
                .cart()
                .add_to_cart(&ProductId::new(product), option.as_ref(), quantity)
                .await?;
            ctx.output.success("Added to cart");
            Ok(())
        }
        CartCommand::Quantity {
            shop,
            product,
            option,
            delta,
        } => {
            let cart = ctx.market.cart();
            cart.load().await?;
            let quantity = cart.change_quantity(
                &VendorId::new(shop),
                &ProductId::new(product),
                &OptionId::new(option),
                delta,
            )?;
            cart.flush_pending().await;
            ctx.output.success(&format!("Quantity is now {quantity}"));
            Ok(())
        }
        CartCommand::Remove { shop, item } => {
            let cart = ctx.market.cart();
            cart.load().await?;
            cart.delete_item(&VendorId::new(shop), &ItemId::new(item))
                .await?;
            ctx.output.success("Item removed");
            Ok(())
        }
        CartCommand::Clear { yes } => clear(ctx, yes).await,
    }
}

async fn show(ctx: &Context) -> Result<()> {
    let cart = ctx.market.cart();
    let spinner = ctx.output.spinner("Loading cart...");
    let loaded = cart.load().await;
    spinner.finish_and_clear();
    loaded?;

    // Totals cover the selected lines, so show the whole cart.
    if !cart.is_all_selected() {
        cart.toggle_all();
    }
    let view = cart.view();
    let summary = cart.summary();

    if ctx.output.is_json() {
        ctx.output.json(&json!({
            "groups": view.groups.iter().map(|g| json!({
                "shopId": g.shop_id,
                "shopName": g.shop_name,
                "shippingFee": g.shipping_fee,
                "items": g.items.iter().map(|l| json!({
                    "itemId": l.item_id,
                    "productId": l.product_id,
                    "optionId": l.option_id,
                    "name": l.name,
                    "label": l.label,
                    "quantity": l.quantity,
                    "price": l.price,
                })).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
            "subtotal": summary.subtotal.to_decimal(),
            "shipping": summary.shipping.to_decimal(),
            "total": summary.total.to_decimal(),
        }));
        return Ok(());
    }

    if view.groups.is_empty() {
        ctx.output.info("Your cart is empty");
        return Ok(());
    }

    let widths = [24, 28, 12, 4, 10];
    for group in &view.groups {
        ctx.output
            .header(&format!("{} ({})", group.shop_name, group.shop_id));
        ctx.output
            .table_row(&["ITEM", "NAME", "OPTION", "QTY", "PRICE"], &widths);
        for line in &group.items {
            let price = Money::from_decimal(line.price, Currency::default()).display();
            ctx.output.table_row(
                &[
                    line.item_id.as_str(),
                    &truncate(&line.name, 28),
                    &truncate(&line.label, 12),
                    &line.quantity.to_string(),
                    &price,
                ],
                &widths,
            );
        }
    }
    print_summary(ctx, &summary);
    Ok(())
}

fn print_summary(ctx: &Context, summary: &CartSummary) {
    ctx.output.header("Summary");
    ctx.output.kv("items", &summary.line_count.to_string());
    ctx.output.kv("subtotal", &summary.subtotal.display());
    ctx.output.kv("shipping", &summary.shipping.display());
    ctx.output.kv("total", &summary.total.display());
}

async fn clear(ctx: &Context, yes: bool) -> Result<()> {
    let cart = ctx.market.cart();
    cart.load().await?;
    if cart.line_count() == 0 {
        ctx.output.info("Your cart is already empty");
        return Ok(());
    }

    if !yes && !ctx.output.is_json() {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove all {} items?", cart.line_count()))
            .default(false)
            .interact()?;
        if !confirmed {
            ctx.output.info("Cancelled");
            return Ok(());
        }
    }

    if !cart.is_all_selected() {
        cart.toggle_all();
    }
    if cart.clear().await {
        ctx.output.success("Cart cleared");
    }
    Ok(())
}
