//! Catalog browsing and search.

use anyhow::{anyhow, Result};
use bazaar_sdk::commerce::catalog::{Product, ProductSort};
use bazaar_sdk::commerce::money::{Currency, Money};

use super::ProductsArgs;
use crate::context::Context;
use crate::output::truncate;

pub async fn run(args: ProductsArgs, ctx: &Context) -> Result<()> {
    let sort: ProductSort = args.sort.parse().map_err(|e: String| anyhow!(e))?;
    let catalog = ctx.market.catalog();
    let pages = args.pages.max(1);

    let spinner = ctx.output.spinner("Loading products...");
    let products = match &args.search {
        Some(query) => {
            let mut loaded = catalog.search(query, true).await;
            for _ in 1..pages {
                if !matches!(loaded, Ok(n) if n > 0) {
                    break;
                }
                loaded = catalog.search(query, false).await;
            }
            spinner.finish_and_clear();
            loaded?;
            let mut results = catalog.state().search_results;
            sort.apply(&mut results);
            results
        }
        None => {
            catalog.set_sort(sort);
            let mut loaded = match (&args.category, &args.region) {
                (Some(category), region) => {
                    if let Some(region) = region {
                        catalog.set_region(region).await?;
                    }
                    catalog.set_category(category).await
                }
                (None, Some(region)) => catalog.set_region(region).await,
                (None, None) => catalog.fetch_next().await,
            };
            for _ in 1..pages {
                if !matches!(loaded, Ok(n) if n > 0) {
                    break;
                }
                loaded = catalog.fetch_next().await;
            }
            spinner.finish_and_clear();
            loaded?;
            catalog.products()
        }
    };

    if ctx.output.is_json() {
        ctx.output.json(&products);
        return Ok(());
    }

    let title = match &args.search {
        Some(query) => format!("Results for \"{query}\""),
        None => format!("Products ({})", sort.display_name()),
    };
    ctx.output.header(&title);
    if products.is_empty() {
        ctx.output.info("No products found");
        return Ok(());
    }

    let widths = [26, 32, 10, 6, 6];
    ctx.output
        .table_row(&["ID", "NAME", "PRICE", "SOLD", "RATING"], &widths);
    for product in &products {
        print_row(ctx, product, &widths);
    }

    if args.search.is_none() && catalog.has_more() {
        ctx.output
            .info(&format!("More available, try --pages {}", pages + 1));
    }
    Ok(())
}

fn print_row(ctx: &Context, product: &Product, widths: &[usize]) {
    let price = Money::from_decimal(product.price, Currency::default()).display();
    let rating = format!("{:.1}", product.average_rating);
    ctx.output.table_row(
        &[
            product.id.as_str(),
            &truncate(&product.name, 32),
            &price,
            &product.sold.to_string(),
            &rating,
        ],
        widths,
    );
}
