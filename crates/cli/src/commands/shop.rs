//! Storefront commands.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! elvora products --category Women --sort price-low
//!
//! # Fill the cart and check out
//! elvora cart add 12 --size M --quantity 2
//! elvora checkout --first-name Amina --last-name Berrada --email amina@mail.ma \
//!     --phone 0611223344 --address "12 rue Atlas" --city Rabat --postal-code 10000
//!
//! # Follow this device's orders
//! elvora orders --follow
//! ```

use std::io::Write;

use elvora_core::{Price, Product};
use elvora_storefront::checkout::CheckoutError;
use elvora_storefront::{
    BrowseFilter, CartStore, Catalog, CheckoutForm, DeviceId, LocalStore, OrderHistory,
    OrderSubmission,
};

use super::{Context, write_order_line, write_product_line};
use crate::error::CliError;

/// List catalog products admitted by `filter`.
pub async fn products(ctx: &Context, filter: &BrowseFilter) -> Result<(), CliError> {
    let catalog = Catalog::new(ctx.client.clone());
    catalog.fetch_all().await;
    let products = catalog.browse(filter);

    let mut out = std::io::stdout().lock();
    if products.is_empty() {
        writeln!(out, "No products.")?;
    }
    for product in &products {
        write_product_line(&mut out, product)?;
    }
    Ok(())
}

/// Show one product with its media and related products.
pub async fn product(ctx: &Context, id: &str) -> Result<(), CliError> {
    let catalog = Catalog::new(ctx.client.clone());
    catalog.fetch_all().await;
    let product = catalog
        .get_by_id(id)
        .ok_or_else(|| CliError::ProductNotFound(id.to_string()))?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{} ({})", product.name, product.price())?;
    writeln!(out, "Category: {}", product.category)?;
    if let Some(product_type) = &product.product_type {
        writeln!(out, "Type:     {product_type}")?;
    }
    writeln!(out, "Sizes:    {}", product.sizes.join(", "))?;
    if !product.description.is_empty() {
        writeln!(out, "\n{}\n", product.description)?;
    }
    for media in product.media() {
        writeln!(out, "  {}", media.url())?;
    }

    let related = catalog.related(&product);
    if !related.is_empty() {
        writeln!(out, "\nYou may also like:")?;
        for other in &related {
            write_product_line(&mut out, other)?;
        }
    }
    Ok(())
}

async fn find_product(ctx: &Context, id: &str) -> Result<Product, CliError> {
    let catalog = Catalog::new(ctx.client.clone());
    catalog.fetch_all().await;
    catalog
        .get_by_id(id)
        .ok_or_else(|| CliError::ProductNotFound(id.to_string()))
}

/// Add `quantity` of product `id` in `size` to the cart.
pub async fn cart_add(ctx: &Context, id: &str, size: &str, quantity: u32) -> Result<(), CliError> {
    let product = find_product(ctx, id).await?;
    let mut cart = CartStore::load(ctx.store.clone());
    cart.add(&product, size, quantity)?;
    cart_show(&cart)
}

/// Remove a cart line.
pub fn cart_remove(ctx: &Context, id: &str, size: &str) -> Result<(), CliError> {
    let mut cart = CartStore::load(ctx.store.clone());
    require_line(&cart, id, size)?;
    cart.remove(id, size);
    cart_show(&cart)
}

/// Set the quantity of a cart line. Quantities below one are ignored.
pub fn cart_set(ctx: &Context, id: &str, size: &str, quantity: u32) -> Result<(), CliError> {
    let mut cart = CartStore::load(ctx.store.clone());
    require_line(&cart, id, size)?;
    cart.update_quantity(id, size, quantity);
    cart_show(&cart)
}

/// Empty the cart.
pub fn cart_clear(ctx: &Context) -> Result<(), CliError> {
    let mut cart = CartStore::load(ctx.store.clone());
    cart.clear();
    cart_show(&cart)
}

/// Print the persisted cart.
pub fn cart(ctx: &Context) -> Result<(), CliError> {
    cart_show(&CartStore::load(ctx.store.clone()))
}

fn require_line<S: LocalStore>(cart: &CartStore<S>, id: &str, size: &str) -> Result<(), CliError> {
    if cart.lines().iter().any(|line| line.is(id, size)) {
        Ok(())
    } else {
        Err(CliError::NotInCart {
            product: id.to_string(),
            size: size.to_string(),
        })
    }
}

fn cart_show<S: LocalStore>(cart: &CartStore<S>) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    if cart.is_empty() {
        writeln!(out, "Your cart is empty.")?;
        return Ok(());
    }
    for line in cart.lines() {
        writeln!(
            out,
            "#{:<6} {:<32} {:<4} x{:<3} {:>12}",
            line.product_id,
            line.name,
            line.size,
            line.quantity,
            Price::mad(line.line_total()).to_string(),
        )?;
    }
    writeln!(
        out,
        "{} item(s), total {}",
        cart.item_count(),
        Price::mad(cart.total())
    )?;
    Ok(())
}

/// Submit the cart as an order.
pub async fn checkout(ctx: &Context, form: &CheckoutForm) -> Result<(), CliError> {
    let mut cart = CartStore::load(ctx.store.clone());
    let submission = OrderSubmission::new(ctx.client.clone());

    let confirmation = match submission.submit(&mut cart, form).await {
        Ok(confirmation) => confirmation,
        Err(CheckoutError::EmptyCart) => {
            let mut out = std::io::stdout().lock();
            writeln!(out, "Your cart is empty; nothing to check out.")?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut out = std::io::stdout().lock();
    writeln!(out, "Thank you! Order #{} placed.", confirmation.order_number)?;
    writeln!(
        out,
        "{} item(s), total {}. Payment on delivery.",
        confirmation.item_count,
        Price::mad(confirmation.total)
    )?;
    Ok(())
}

/// List this device's orders, optionally following their status live.
pub async fn orders(ctx: &Context, follow: bool) -> Result<(), CliError> {
    let device = DeviceId::current(&ctx.store);
    let history = OrderHistory::new(ctx.client.clone());
    let orders = history.my_orders(device.as_ref()).await;

    {
        let mut out = std::io::stdout().lock();
        if orders.is_empty() {
            writeln!(out, "No orders placed from this device.")?;
        }
        for order in &orders {
            write_order_line(&mut out, order)?;
        }
    }

    let (true, Some(device)) = (follow, device) else {
        return Ok(());
    };

    let mut changes = history.collection().changes();
    let watch = history.track(&device).await?;
    tracing::info!("Following order status, press Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let mut out = std::io::stdout().lock();
                writeln!(out, "--")?;
                for order in history.orders() {
                    write_order_line(&mut out, &order)?;
                }
            }
        }
    }
    watch.close().await;
    Ok(())
}
