//! Catalog and order management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a product
//! shopfront admin product create -n "Pineapple Mug" -p 12.50 -s 40 -c 2
//!
//! # Rename a category
//! shopfront admin category update 2 --name Kitchenware
//!
//! # Move an order along
//! shopfront admin orders status 42 shipped
//! ```
//!
//! The backend enforces the admin role; the local check only gives a
//! customer account a clearer message.

use rust_decimal::Decimal;

use shopfront_client::types::{CategoryInput, ProductInput, UpdateCategoryRequest};
use shopfront_core::{CategoryId, Money, OrderId, OrderStatus, ProductId};

use super::orders::{print_order, print_order_page};
use super::{CliError, Context};

/// Product fields as entered on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub image: Option<String>,
    pub category_id: CategoryId,
}

impl ProductDraft {
    /// Validate into a request body.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Usage` for a blank name or a non-positive price.
    pub fn validate(self) -> Result<ProductInput, CliError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CliError::Usage("Product name must not be empty".to_string()));
        }
        if self.price <= Decimal::ZERO {
            return Err(CliError::Usage(format!(
                "Price must be positive, got {}",
                self.price
            )));
        }
        if self.price.scale() > 2 {
            return Err(CliError::Usage(format!(
                "Price has more than two decimal places: {}",
                self.price
            )));
        }

        Ok(ProductInput {
            name: name.to_string(),
            description: self.description.trim().to_string(),
            price: Money::new(self.price),
            stock: self.stock,
            image: self.image.filter(|i| !i.trim().is_empty()),
            category_id: self.category_id,
        })
    }
}

/// `shopfront admin product create`
#[allow(clippy::print_stdout)]
pub async fn create_product(ctx: &Context, draft: ProductDraft) -> Result<(), CliError> {
    ctx.require_admin()?;
    let input = draft.validate()?;
    let product = ctx.api.create_product(&input).await?;
    println!("Created product {} ({})", product.id, product.name);
    Ok(())
}

/// `shopfront admin product update`
#[allow(clippy::print_stdout)]
pub async fn update_product(
    ctx: &Context,
    id: ProductId,
    draft: ProductDraft,
) -> Result<(), CliError> {
    ctx.require_admin()?;
    let input = draft.validate()?;
    let product = ctx.api.update_product(id, &input).await?;
    println!("Updated product {} ({})", product.id, product.name);
    Ok(())
}

/// `shopfront admin product delete`
#[allow(clippy::print_stdout)]
pub async fn delete_product(ctx: &Context, id: ProductId) -> Result<(), CliError> {
    ctx.require_admin()?;
    ctx.api.delete_product(id).await?;
    println!("Deleted product {id}");
    Ok(())
}

/// Trim a category body, dropping blank optional fields.
///
/// # Errors
///
/// Returns `CliError::Usage` for a blank name.
pub fn category_input(
    name: &str,
    description: Option<String>,
    image: Option<String>,
) -> Result<CategoryInput, CliError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::Usage("Category name must not be empty".to_string()));
    }
    Ok(CategoryInput {
        name: name.to_string(),
        description: non_blank(description),
        image: non_blank(image),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `shopfront admin category create`
#[allow(clippy::print_stdout)]
pub async fn create_category(ctx: &Context, input: CategoryInput) -> Result<(), CliError> {
    ctx.require_admin()?;
    let category = ctx.api.create_category(&input).await?;
    println!("Created category {} ({})", category.id, category.name);
    Ok(())
}

/// `shopfront admin category update`
#[allow(clippy::print_stdout)]
pub async fn update_category(
    ctx: &Context,
    id: CategoryId,
    update: UpdateCategoryRequest,
) -> Result<(), CliError> {
    let update = UpdateCategoryRequest {
        name: non_blank(update.name),
        description: non_blank(update.description),
        image: non_blank(update.image),
    };
    if update.is_empty() {
        return Err(CliError::Usage(
            "Nothing to update: pass --name, --description or --image".to_string(),
        ));
    }
    ctx.require_admin()?;
    let category = ctx.api.update_category(id, &update).await?;
    println!("Updated category {} ({})", category.id, category.name);
    Ok(())
}

/// `shopfront admin category delete`
#[allow(clippy::print_stdout)]
pub async fn delete_category(ctx: &Context, id: CategoryId) -> Result<(), CliError> {
    ctx.require_admin()?;
    ctx.api.delete_category(id).await?;
    println!("Deleted category {id}");
    Ok(())
}

/// `shopfront admin orders list`
pub async fn list_orders(
    ctx: &Context,
    page: u32,
    limit: u32,
    status: Option<OrderStatus>,
) -> Result<(), CliError> {
    ctx.require_admin()?;
    let orders = ctx.api.list_all_orders(page, limit, status).await?;
    print_order_page(&orders);
    Ok(())
}

/// `shopfront admin orders status`
#[allow(clippy::print_stdout)]
pub async fn set_order_status(
    ctx: &Context,
    id: OrderId,
    status: OrderStatus,
) -> Result<(), CliError> {
    ctx.require_admin()?;
    let order = ctx.api.update_order_status(id, status).await?;
    println!("Order {} is now {}", order.id, order.status);
    print_order(&order);
    Ok(())
}
