//! Checkout and order history commands.

use shopfront_client::types::{CreateOrderRequest, Order, Page, non_empty};
use shopfront_core::{OrderId, PaymentMethod};

use super::{CliError, Context};

/// `shopfront checkout`
#[allow(clippy::print_stdout)]
pub async fn checkout(
    ctx: &Context,
    address: Option<String>,
    payment: PaymentMethod,
) -> Result<(), CliError> {
    let user = ctx.require_user()?;

    let shipping_address = address
        .as_deref()
        .and_then(|a| non_empty(Some(a)))
        .or_else(|| non_empty(user.address.as_deref()))
        .map(str::trim)
        .map(String::from)
        .ok_or_else(|| {
            CliError::Usage(
                "No shipping address. Pass --address or set one with `shopfront profile --address`"
                    .to_string(),
            )
        })?;

    let cart = ctx.cart.refresh().await?;
    if cart.is_empty() {
        return Err(CliError::Usage("Your cart is empty".to_string()));
    }

    let order = ctx
        .api
        .checkout(&CreateOrderRequest {
            shipping_address,
            payment_method: payment,
        })
        .await?;

    // The backend empties the cart as part of placing the order.
    if let Err(e) = ctx.cart.refresh().await {
        tracing::warn!(error = %e, "Cart refresh after checkout failed");
    }

    println!("Order {} placed", order.id);
    print_order(&order);
    Ok(())
}

/// `shopfront orders list`
pub async fn list(ctx: &Context, page: u32, limit: u32) -> Result<(), CliError> {
    ctx.require_user()?;
    let orders = ctx.api.list_orders(page, limit).await?;
    print_order_page(&orders);
    Ok(())
}

/// `shopfront orders show`
pub async fn show(ctx: &Context, id: OrderId) -> Result<(), CliError> {
    ctx.require_user()?;
    let order = ctx.api.get_order(id).await?;
    print_order(&order);
    Ok(())
}

#[allow(clippy::print_stdout)]
pub(crate) fn print_order_page(orders: &Page<Order>) {
    if orders.items.is_empty() {
        println!("No orders");
        return;
    }
    for order in &orders.items {
        let placed = order
            .created_at
            .map_or_else(String::new, |t| t.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "{:>6}  {:<10}  {:>10}  {placed}",
            order.id,
            order.status.to_string(),
            order.total_amount.to_string()
        );
    }
    println!("\nPage {} of {} ({} orders)", orders.page, orders.total_pages.max(1), orders.total);
}

#[allow(clippy::print_stdout)]
pub(crate) fn print_order(order: &Order) {
    println!("  status:   {}", order.status);
    println!("  ship to:  {}", order.shipping_address);
    println!("  payment:  {}", order.payment_method);
    for item in &order.order_items {
        let name = item
            .product
            .as_ref()
            .map_or_else(|| format!("product {}", item.product_id), |p| p.name.clone());
        println!(
            "  {:>4} x {:<40} {:>10}",
            item.quantity,
            name,
            item.line_total().to_string()
        );
    }
    println!("  total:    {}", order.total_amount);
}
