//! Cart commands.
//!
//! Each invocation starts from an empty local cart, so every command loads
//! the server cart first and then goes through the synchronizer like any
//! long-lived front end would.

use shopfront_client::CartView;
use shopfront_core::{CartItemId, ProductId};

use super::{CliError, Context};

/// `shopfront cart show`
pub async fn show(ctx: &Context) -> Result<(), CliError> {
    ctx.require_user()?;
    let view = ctx.cart.refresh().await?;
    print_cart(&view);
    Ok(())
}

/// `shopfront cart add`
#[allow(clippy::print_stdout)]
pub async fn add(ctx: &Context, product_id: ProductId, quantity: u32) -> Result<(), CliError> {
    ctx.require_user()?;
    // Stock is checked locally against the freshest product we can get.
    ctx.api.invalidate_product(product_id).await;
    let product = ctx.api.get_product(product_id).await?;
    ctx.cart.observe_product(&product);
    ctx.cart.refresh().await?;

    let view = ctx.cart.add_item(product_id, quantity).await?;
    println!("Added {quantity} x {}", product.name);
    print_cart(&view);
    Ok(())
}

/// `shopfront cart set`
pub async fn set_quantity(
    ctx: &Context,
    item_id: CartItemId,
    quantity: u32,
) -> Result<(), CliError> {
    ctx.require_user()?;
    let current = ctx.cart.refresh().await?;
    if current.line(item_id).is_none() {
        return Err(CliError::Usage(format!("No cart line with id {item_id}")));
    }
    let view = ctx.cart.set_quantity(item_id, quantity).await?;
    print_cart(&view);
    Ok(())
}

/// `shopfront cart remove`
pub async fn remove(ctx: &Context, item_id: CartItemId) -> Result<(), CliError> {
    ctx.require_user()?;
    let current = ctx.cart.refresh().await?;
    if current.line(item_id).is_none() {
        return Err(CliError::Usage(format!("No cart line with id {item_id}")));
    }
    let view = ctx.cart.remove_item(item_id).await?;
    print_cart(&view);
    Ok(())
}

/// `shopfront cart clear`
pub async fn clear(ctx: &Context) -> Result<(), CliError> {
    ctx.require_user()?;
    ctx.cart.refresh().await?;
    let view = ctx.cart.clear().await?;
    print_cart(&view);
    Ok(())
}

#[allow(clippy::print_stdout)]
pub(crate) fn print_cart(view: &CartView) {
    if view.is_empty() {
        println!("Your cart is empty");
        return;
    }

    println!("{:>5}  {:<40}  {:>4}  {:>10}", "line", "product", "qty", "subtotal");
    for line in view.lines() {
        println!(
            "{:>5}  {:<40}  {:>4}  {:>10}",
            line.id,
            line.name,
            line.quantity,
            line.subtotal.to_string()
        );
    }
    println!("\n{} items, total {}", view.item_count(), view.total());
}
