//! Wire types for the Shopfront REST API.
//!
//! These mirror the backend's snake_case JSON. Empty strings emitted by the
//! backend for unset optional fields are accepted and mapped through
//! [`non_empty`] by the accessors that care.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::{
    CartItemId, CategoryId, Email, Money, OrderId, OrderItemId, OrderStatus, PaymentMethod,
    ProductId, UserId, UserRole,
};

// =============================================================================
// Account Types
// =============================================================================

/// User profile returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend user ID.
    pub id: UserId,
    /// Login email.
    pub email: Email,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Default shipping address.
    #[serde(default)]
    pub address: Option<String>,
    /// Account role.
    #[serde(default)]
    pub role: UserRole,
    /// When the account was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Display name, falling back to the email when no name is set.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.to_string()
        } else {
            name.to_string()
        }
    }
}

/// Login request body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Login response body.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// Account registration request.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Partial profile update. Unset fields are left unchanged by the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

// =============================================================================
// Catalog Types
// =============================================================================

/// Product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Backend product ID.
    pub id: ProductId,
    /// Product name.
    pub name: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Current unit price.
    pub price: Money,
    /// Units in stock. Bounds the quantity a cart line may hold.
    pub stock: u32,
    /// Image URL or path.
    #[serde(default)]
    pub image: Option<String>,
    /// Owning category.
    pub category_id: CategoryId,
    /// Embedded category, when the backend preloads it.
    #[serde(default)]
    pub category: Option<Category>,
    /// When the product was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Image reference, ignoring the empty string the backend uses for "none".
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        non_empty(self.image.as_deref())
    }

    /// Whether at least one unit can be ordered.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Filters for product listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
    /// Restrict to one category.
    pub category_id: Option<CategoryId>,
    /// Case-insensitive name search.
    pub search: Option<String>,
}

impl ProductQuery {
    /// Query string pairs understood by `GET /products`.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.unwrap_or(1).to_string()),
            ("limit", self.limit.unwrap_or(10).to_string()),
        ];
        if let Some(category_id) = self.category_id {
            pairs.push(("category_id", category_id.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search", search.trim().to_string()));
        }
        pairs
    }
}

/// Admin category create body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Partial category update. Unset fields are left unchanged by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateCategoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl UpdateCategoryRequest {
    /// Whether the update would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.image.is_none()
    }
}

/// Admin product create/update body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub category_id: CategoryId,
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Whether a later page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

// =============================================================================
// Cart Types
// =============================================================================

/// A cart line as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Server-assigned line ID.
    pub id: CartItemId,
    /// Referenced product.
    pub product_id: ProductId,
    /// Units of the product in the cart.
    pub quantity: u32,
    /// `quantity × product.price` as computed by the server.
    pub subtotal: Money,
    /// Product snapshot at fetch time.
    pub product: Product,
}

/// `GET /cart` response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CartResponse {
    /// The backend emits `null` for an empty cart.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cart_items: Vec<CartItem>,
    #[serde(default)]
    pub total_amount: Money,
    #[serde(default)]
    pub total_items: u32,
}

/// `POST /cart/add` request body.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// `PUT /cart/item/{id}` request body.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

/// Envelope for endpoints answering `{ cart_item }`.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItemEnvelope {
    pub cart_item: CartItem,
}

// =============================================================================
// Order Types
// =============================================================================

/// A single order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price charged at checkout.
    pub price: Money,
    #[serde(default)]
    pub subtotal: Option<Money>,
    #[serde(default)]
    pub product: Option<Product>,
}

impl OrderItem {
    /// Line total, computing it when the backend omits it.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.subtotal.unwrap_or_else(|| self.price.times(self.quantity))
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub payment_method: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub order_items: Vec<OrderItem>,
}

/// Checkout request: turns the current cart into an order.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
}

/// Admin order status change.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Paged listing shape shared by `/products` and `/orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct PagedEnvelope<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_empty")]
    #[serde(alias = "products", alias = "orders")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total_pages: u32,
}

impl<T> From<PagedEnvelope<T>> for Page<T> {
    fn from(envelope: PagedEnvelope<T>) -> Self {
        Self {
            items: envelope.items,
            total: envelope.total,
            page: envelope.page,
            limit: envelope.limit,
            total_pages: envelope.total_pages,
        }
    }
}

const fn first_page() -> u32 {
    1
}

/// Treat JSON `null` as an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Map the backend's empty-string convention to `None`.
#[must_use]
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product_json() -> serde_json::Value {
        serde_json::json!({
            "id": 7,
            "name": "Pineapple",
            "description": "Fresh",
            "price": 10.0,
            "stock": 4,
            "image": "",
            "category_id": 2,
            "category": {
                "id": 2,
                "name": "Fruit",
                "description": "",
                "image": "",
                "created_at": "2024-01-01T00:00:00Z"
            },
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_cart_response_parses_backend_shape() {
        let body = serde_json::json!({
            "cart_items": [{
                "id": 3,
                "user_id": 1,
                "product_id": 7,
                "quantity": 2,
                "product": product_json(),
                "created_at": "2024-01-01T00:00:00Z",
                "subtotal": 20.0
            }],
            "total_amount": 20.0,
            "total_items": 2
        });

        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert_eq!(cart.cart_items.len(), 1);
        let line = &cart.cart_items[0];
        assert_eq!(line.id, CartItemId::new(3));
        assert_eq!(line.subtotal, Money::from_cents(2000));
        assert_eq!(line.product.image(), None);
        assert_eq!(cart.total_items, 2);
    }

    #[test]
    fn test_empty_cart_is_null() {
        let body = serde_json::json!({"cart_items": null, "total_amount": 0, "total_items": 0});
        let cart: CartResponse = serde_json::from_value(body).unwrap();
        assert!(cart.cart_items.is_empty());
    }

    #[test]
    fn test_paged_envelope_accepts_products_key() {
        let body = serde_json::json!({
            "products": [product_json()],
            "total": 11,
            "page": 1,
            "limit": 10,
            "total_pages": 2
        });
        let page: Page<Product> = serde_json::from_value::<PagedEnvelope<Product>>(body)
            .unwrap()
            .into();
        assert_eq!(page.items.len(), 1);
        assert!(page.has_next());
    }

    #[test]
    fn test_paged_envelope_null_orders_is_empty() {
        let body = serde_json::json!({
            "orders": null,
            "total": 0,
            "limit": 10,
            "total_pages": 0
        });
        let page: Page<Order> = serde_json::from_value::<PagedEnvelope<Order>>(body)
            .unwrap()
            .into();
        assert!(page.items.is_empty());
        assert_eq!(page.page, 1);
        assert!(!page.has_next());
    }

    #[test]
    fn test_product_query_pairs() {
        let query = ProductQuery {
            page: Some(2),
            limit: None,
            category_id: Some(CategoryId::new(3)),
            search: Some("  ".to_string()),
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("page", "2".to_string()),
                ("limit", "10".to_string()),
                ("category_id", "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_order_item_line_total_fallback() {
        let item = OrderItem {
            id: OrderItemId::new(1),
            product_id: ProductId::new(7),
            quantity: 3,
            price: Money::from_cents(250),
            subtotal: None,
            product: None,
        };
        assert_eq!(item.line_total(), Money::from_cents(750));
    }

    #[test]
    fn test_user_display_name() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": 1,
            "email": "ada@example.com",
            "first_name": "",
            "last_name": "",
            "role": "user"
        }))
        .unwrap();
        assert_eq!(user.display_name(), "ada@example.com");
    }
}
