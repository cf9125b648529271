//! Catalog browsing commands.

use shopfront_client::types::{Product, ProductQuery};
use shopfront_core::ProductId;

use super::{CliError, Context};

/// `shopfront products list`
#[allow(clippy::print_stdout)]
pub async fn list_products(ctx: &Context, query: &ProductQuery) -> Result<(), CliError> {
    let page = ctx.api.list_products(query).await?;
    if page.items.is_empty() {
        println!("No products found");
        return Ok(());
    }

    for product in &page.items {
        println!("{}", product_row(product));
    }
    println!(
        "\nPage {} of {} ({} products)",
        page.page,
        page.total_pages.max(1),
        page.total
    );
    if page.has_next() {
        println!("More: --page {}", page.page.saturating_add(1));
    }
    Ok(())
}

/// `shopfront products show`
#[allow(clippy::print_stdout)]
pub async fn show_product(ctx: &Context, id: ProductId, refresh: bool) -> Result<(), CliError> {
    if refresh {
        ctx.api.invalidate_product(id).await;
    }
    let product = ctx.api.get_product(id).await?;
    ctx.cart.observe_product(&product);

    println!("{}", product.name);
    println!("  id:       {}", product.id);
    println!("  price:    {}", product.price);
    println!("  stock:    {}", stock_label(&product));
    match &product.category {
        Some(category) => println!("  category: {} ({})", category.name, category.id),
        None => println!("  category: {}", product.category_id),
    }
    if let Some(image) = product.image() {
        println!("  image:    {image}");
    }
    if !product.description.trim().is_empty() {
        println!("\n{}", product.description.trim());
    }
    Ok(())
}

/// `shopfront categories`
#[allow(clippy::print_stdout)]
pub async fn list_categories(ctx: &Context) -> Result<(), CliError> {
    let categories = ctx.api.list_categories().await?;
    if categories.is_empty() {
        println!("No categories");
    }
    for category in categories {
        match category.description.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(description) => println!("{:>5}  {}  - {description}", category.id, category.name),
            None => println!("{:>5}  {}", category.id, category.name),
        }
    }
    Ok(())
}

fn product_row(product: &Product) -> String {
    format!(
        "{:>5}  {:<40}  {:>10}  {}",
        product.id,
        product.name,
        product.price.to_string(),
        stock_label(product)
    )
}

fn stock_label(product: &Product) -> String {
    if product.in_stock() {
        format!("{} in stock", product.stock)
    } else {
        "out of stock".to_string()
    }
}
