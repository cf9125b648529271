//! In-memory store and route handlers for the mock backend.
//!
//! Response shapes follow the real backend: envelopes keyed by resource
//! (`{ product }`, `{ cart_item }`, `{ order }`), paged listings keyed by
//! collection name, `null` for an empty cart, and `{ error }` on failure.

use std::collections::{BTreeMap, HashMap};

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use serde_json::{Value, json};

use crate::MockBackend;

pub type Reply = (StatusCode, Json<Value>);

const CREATED_AT: &str = "2024-05-01T12:00:00Z";

const ORDER_STATUSES: [&str; 6] = [
    "pending",
    "confirmed",
    "processing",
    "shipped",
    "delivered",
    "cancelled",
];

// =============================================================================
// Records
// =============================================================================

pub struct UserRecord {
    pub id: u64,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    pub role: &'static str,
}

pub struct CategoryRecord {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub image: String,
}

pub struct ProductRecord {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: u32,
    pub category_id: u64,
}

pub struct CartRecord {
    pub id: u64,
    pub user_id: u64,
    pub product_id: u64,
    pub quantity: u32,
}

pub struct OrderItemRecord {
    pub id: u64,
    pub product_id: u64,
    pub quantity: u32,
    pub price: f64,
}

pub struct OrderRecord {
    pub id: u64,
    pub user_id: u64,
    pub status: String,
    pub shipping_address: String,
    pub payment_method: String,
    pub total: f64,
    pub items: Vec<OrderItemRecord>,
}

/// Backend state.
#[derive(Default)]
pub struct Store {
    pub users: Vec<UserRecord>,
    pub tokens: HashMap<String, u64>,
    pub categories: Vec<CategoryRecord>,
    pub products: BTreeMap<u64, ProductRecord>,
    pub cart: Vec<CartRecord>,
    pub orders: Vec<OrderRecord>,
    next_id: u64,
}

impl Store {
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn user_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn user(&self, id: u64) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.id == id)
    }

    fn issue_token(&mut self, user_id: u64) -> String {
        let token = format!("token-{}-{}", user_id, self.next_id());
        self.tokens.insert(token.clone(), user_id);
        token
    }

    /// Resolve the bearer token to a user id.
    fn authenticate(&self, headers: &HeaderMap) -> Result<u64, Reply> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| self.tokens.get(token).copied())
            .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
    }

    fn authenticate_admin(&self, headers: &HeaderMap) -> Result<u64, Reply> {
        let user_id = self.authenticate(headers)?;
        match self.user(user_id) {
            Some(user) if user.role == "admin" => Ok(user_id),
            _ => Err(error(StatusCode::FORBIDDEN, "Admin access required")),
        }
    }

    // =========================================================================
    // JSON
    // =========================================================================

    fn user_json(user: &UserRecord) -> Value {
        json!({
            "id": user.id,
            "email": user.email,
            "first_name": user.first_name,
            "last_name": user.last_name,
            "phone": user.phone,
            "address": user.address,
            "role": user.role,
            "created_at": CREATED_AT,
        })
    }

    fn category_json(category: &CategoryRecord) -> Value {
        json!({
            "id": category.id,
            "name": category.name,
            "description": category.description,
            "image": category.image,
            "created_at": CREATED_AT,
        })
    }

    fn product_json(&self, product: &ProductRecord) -> Value {
        let category = self
            .categories
            .iter()
            .find(|c| c.id == product.category_id)
            .map_or(Value::Null, Self::category_json);
        json!({
            "id": product.id,
            "name": product.name,
            "description": product.description,
            "price": product.price,
            "stock": product.stock,
            "image": "",
            "category_id": product.category_id,
            "category": category,
            "created_at": CREATED_AT,
        })
    }

    fn cart_item_json(&self, line: &CartRecord) -> Value {
        let product = self.products.get(&line.product_id);
        let price = product.map_or(0.0, |p| p.price);
        json!({
            "id": line.id,
            "product_id": line.product_id,
            "quantity": line.quantity,
            "subtotal": price * f64::from(line.quantity),
            "product": product.map_or(Value::Null, |p| self.product_json(p)),
        })
    }

    fn cart_json(&self, user_id: u64) -> Value {
        let lines: Vec<&CartRecord> = self.cart.iter().filter(|l| l.user_id == user_id).collect();
        let total_amount: f64 = lines
            .iter()
            .map(|l| {
                self.products
                    .get(&l.product_id)
                    .map_or(0.0, |p| p.price * f64::from(l.quantity))
            })
            .sum();
        let total_items: u32 = lines.iter().map(|l| l.quantity).sum();
        let items: Vec<Value> = lines.iter().map(|l| self.cart_item_json(l)).collect();

        json!({
            // The backend serializes an empty cart as null.
            "cart_items": if items.is_empty() { Value::Null } else { Value::Array(items) },
            "total_amount": total_amount,
            "total_items": total_items,
        })
    }

    fn order_json(&self, order: &OrderRecord) -> Value {
        let items: Vec<Value> = order
            .items
            .iter()
            .map(|item| {
                json!({
                    "id": item.id,
                    "product_id": item.product_id,
                    "quantity": item.quantity,
                    "price": item.price,
                    "product": self
                        .products
                        .get(&item.product_id)
                        .map_or(Value::Null, |p| self.product_json(p)),
                })
            })
            .collect();
        json!({
            "id": order.id,
            "user_id": order.user_id,
            "total_amount": order.total,
            "status": order.status,
            "shipping_address": order.shipping_address,
            "payment_method": order.payment_method,
            "created_at": CREATED_AT,
            "order_items": items,
        })
    }

    fn order_page(&self, orders: &[&OrderRecord], params: &HashMap<String, String>) -> Value {
        let (page, limit) = paging(params);
        let items: Vec<Value> = orders
            .iter()
            .skip(((page - 1) * limit) as usize)
            .take(limit as usize)
            .map(|o| self.order_json(o))
            .collect();
        paged("orders", items, orders.len() as u64, page, limit)
    }
}

fn ok(body: Value) -> Reply {
    (StatusCode::OK, Json(body))
}

fn created(body: Value) -> Reply {
    (StatusCode::CREATED, Json(body))
}

pub fn error(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "error": message })))
}

fn paging(params: &HashMap<String, String>) -> (u64, u64) {
    let page = params
        .get("page")
        .and_then(|p| p.parse::<u64>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1);
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<u64>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(10);
    (page, limit)
}

fn paged(key: &str, items: Vec<Value>, total: u64, page: u64, limit: u64) -> Value {
    let mut body = json!({
        "total": total,
        "page": page,
        "limit": limit,
        "total_pages": total.div_ceil(limit),
    });
    if let Some(object) = body.as_object_mut() {
        object.insert(key.to_string(), Value::Array(items));
    }
    body
}

fn string_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(String::from)
}

fn quantity_field(body: &Value) -> Option<u32> {
    body.get("quantity")
        .and_then(Value::as_u64)
        .and_then(|q| u32::try_from(q).ok())
}

// =============================================================================
// Health & Auth
// =============================================================================

pub async fn health() -> Reply {
    ok(json!({ "status": "ok" }))
}

pub async fn register(State(mock): State<MockBackend>, Json(body): Json<Value>) -> Reply {
    let mut store = mock.store.lock();
    let (Some(email), Some(password)) =
        (string_field(&body, "email"), string_field(&body, "password"))
    else {
        return error(StatusCode::BAD_REQUEST, "email and password are required");
    };
    if password.len() < 6 {
        return error(StatusCode::BAD_REQUEST, "Password must be at least 6 characters");
    }
    if store.user_by_email(&email).is_some() {
        return error(StatusCode::CONFLICT, "User already exists");
    }

    let id = store.next_id();
    let user = UserRecord {
        id,
        email,
        password,
        first_name: string_field(&body, "first_name").unwrap_or_default(),
        last_name: string_field(&body, "last_name").unwrap_or_default(),
        phone: string_field(&body, "phone").unwrap_or_default(),
        address: string_field(&body, "address").unwrap_or_default(),
        role: "user",
    };
    let user_json = Store::user_json(&user);
    store.users.push(user);
    let token = store.issue_token(id);

    created(json!({
        "message": "User registered successfully",
        "user": user_json,
        "token": token,
    }))
}

pub async fn login(State(mock): State<MockBackend>, Json(body): Json<Value>) -> Reply {
    let mut store = mock.store.lock();
    let email = string_field(&body, "email").unwrap_or_default();
    let password = string_field(&body, "password").unwrap_or_default();

    let Some(user) = store
        .user_by_email(&email)
        .filter(|u| u.password == password)
    else {
        return error(StatusCode::UNAUTHORIZED, "Invalid email or password");
    };
    let (id, user_json) = (user.id, Store::user_json(user));
    let token = store.issue_token(id);

    ok(json!({
        "message": "Login successful",
        "user": user_json,
        "token": token,
    }))
}

pub async fn logout(State(mock): State<MockBackend>, headers: HeaderMap) -> Reply {
    let mut store = mock.store.lock();
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        store.tokens.remove(token);
    }
    ok(json!({ "message": "Logged out" }))
}

pub async fn profile(State(mock): State<MockBackend>, headers: HeaderMap) -> Reply {
    let store = mock.store.lock();
    let user_id = match store.authenticate(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    store.user(user_id).map_or_else(
        || error(StatusCode::NOT_FOUND, "User not found"),
        |u| ok(json!({ "user": Store::user_json(u) })),
    )
}

pub async fn update_profile(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = mock.store.lock();
    let user_id = match store.authenticate(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let Some(user) = store.users.iter_mut().find(|u| u.id == user_id) else {
        return error(StatusCode::NOT_FOUND, "User not found");
    };
    if let Some(v) = string_field(&body, "first_name") {
        user.first_name = v;
    }
    if let Some(v) = string_field(&body, "last_name") {
        user.last_name = v;
    }
    if let Some(v) = string_field(&body, "phone") {
        user.phone = v;
    }
    if let Some(v) = string_field(&body, "address") {
        user.address = v;
    }
    ok(json!({
        "message": "Profile updated successfully",
        "user": Store::user_json(user),
    }))
}

// =============================================================================
// Catalog
// =============================================================================

pub async fn list_products(
    State(mock): State<MockBackend>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    let store = mock.store.lock();
    let (page, limit) = paging(&params);
    let category = params.get("category_id").and_then(|c| c.parse::<u64>().ok());
    let search = params.get("search").map(|s| s.to_lowercase());

    let matching: Vec<&ProductRecord> = store
        .products
        .values()
        .filter(|p| category.is_none_or(|c| p.category_id == c))
        .filter(|p| {
            search
                .as_deref()
                .is_none_or(|s| p.name.to_lowercase().contains(s))
        })
        .collect();
    let items: Vec<Value> = matching
        .iter()
        .skip(((page - 1) * limit) as usize)
        .take(limit as usize)
        .map(|p| store.product_json(p))
        .collect();

    ok(paged("products", items, matching.len() as u64, page, limit))
}

pub async fn get_product(State(mock): State<MockBackend>, Path(id): Path<u64>) -> Reply {
    let store = mock.store.lock();
    store.products.get(&id).map_or_else(
        || error(StatusCode::NOT_FOUND, "Product not found"),
        |p| ok(json!({ "product": store.product_json(p) })),
    )
}

fn product_from_body(id: u64, body: &Value) -> Result<ProductRecord, Reply> {
    let name = string_field(body, "name")
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "name is required"))?;
    let price = body
        .get("price")
        .and_then(Value::as_f64)
        .filter(|p| *p > 0.0)
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "price must be positive"))?;
    let category_id = body
        .get("category_id")
        .and_then(Value::as_u64)
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "category_id is required"))?;
    let stock = body
        .get("stock")
        .and_then(Value::as_u64)
        .and_then(|s| u32::try_from(s).ok())
        .unwrap_or(0);

    Ok(ProductRecord {
        id,
        name,
        description: string_field(body, "description").unwrap_or_default(),
        price,
        stock,
        category_id,
    })
}

pub async fn create_product(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = mock.store.lock();
    if let Err(reply) = store.authenticate_admin(&headers) {
        return reply;
    }
    let id = store.next_id();
    let product = match product_from_body(id, &body) {
        Ok(p) => p,
        Err(reply) => return reply,
    };
    let json = store.product_json(&product);
    store.products.insert(id, product);
    created(json!({ "message": "Product created successfully", "product": json }))
}

pub async fn update_product(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = mock.store.lock();
    if let Err(reply) = store.authenticate_admin(&headers) {
        return reply;
    }
    if !store.products.contains_key(&id) {
        return error(StatusCode::NOT_FOUND, "Product not found");
    }
    let product = match product_from_body(id, &body) {
        Ok(p) => p,
        Err(reply) => return reply,
    };
    let json = store.product_json(&product);
    store.products.insert(id, product);
    ok(json!({ "message": "Product updated successfully", "product": json }))
}

pub async fn delete_product(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply {
    let mut store = mock.store.lock();
    if let Err(reply) = store.authenticate_admin(&headers) {
        return reply;
    }
    if store.products.remove(&id).is_none() {
        return error(StatusCode::NOT_FOUND, "Product not found");
    }
    store.cart.retain(|l| l.product_id != id);
    ok(json!({ "message": "Product deleted successfully" }))
}

pub async fn list_categories(State(mock): State<MockBackend>) -> Reply {
    let store = mock.store.lock();
    let categories: Vec<Value> = store.categories.iter().map(Store::category_json).collect();
    ok(json!({ "categories": categories }))
}

pub async fn get_category(State(mock): State<MockBackend>, Path(id): Path<u64>) -> Reply {
    let store = mock.store.lock();
    store.categories.iter().find(|c| c.id == id).map_or_else(
        || error(StatusCode::NOT_FOUND, "Category not found"),
        |c| ok(json!({ "category": Store::category_json(c) })),
    )
}

pub async fn create_category(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = mock.store.lock();
    if let Err(reply) = store.authenticate_admin(&headers) {
        return reply;
    }
    let Some(name) = string_field(&body, "name").filter(|n| !n.trim().is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "name is required");
    };
    if store.categories.iter().any(|c| c.name == name) {
        return error(StatusCode::CONFLICT, "Category already exists");
    }
    let category = CategoryRecord {
        id: store.next_id(),
        name,
        description: string_field(&body, "description").unwrap_or_default(),
        image: string_field(&body, "image").unwrap_or_default(),
    };
    let json = Store::category_json(&category);
    store.categories.push(category);
    created(json!({ "message": "Category created successfully", "category": json }))
}

pub async fn update_category(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = mock.store.lock();
    if let Err(reply) = store.authenticate_admin(&headers) {
        return reply;
    }
    let name = string_field(&body, "name").filter(|n| !n.is_empty());
    if let Some(name) = &name
        && store.categories.iter().any(|c| c.id != id && &c.name == name)
    {
        return error(StatusCode::CONFLICT, "Category name already exists");
    }
    let Some(category) = store.categories.iter_mut().find(|c| c.id == id) else {
        return error(StatusCode::NOT_FOUND, "Category not found");
    };
    // Empty fields leave the stored value alone.
    if let Some(name) = name {
        category.name = name;
    }
    if let Some(description) = string_field(&body, "description").filter(|d| !d.is_empty()) {
        category.description = description;
    }
    if let Some(image) = string_field(&body, "image").filter(|i| !i.is_empty()) {
        category.image = image;
    }
    let json = Store::category_json(category);
    ok(json!({ "message": "Category updated successfully", "category": json }))
}

pub async fn delete_category(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply {
    let mut store = mock.store.lock();
    if let Err(reply) = store.authenticate_admin(&headers) {
        return reply;
    }
    if !store.categories.iter().any(|c| c.id == id) {
        return error(StatusCode::NOT_FOUND, "Category not found");
    }
    if store.products.values().any(|p| p.category_id == id) {
        return error(StatusCode::CONFLICT, "Cannot delete category with existing products");
    }
    store.categories.retain(|c| c.id != id);
    ok(json!({ "message": "Category deleted successfully" }))
}

// =============================================================================
// Cart
// =============================================================================

pub async fn fetch_cart(State(mock): State<MockBackend>, headers: HeaderMap) -> Reply {
    let store = mock.store.lock();
    match store.authenticate(&headers) {
        Ok(user_id) => ok(store.cart_json(user_id)),
        Err(reply) => reply,
    }
}

pub async fn add_to_cart(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = mock.store.lock();
    let user_id = match store.authenticate(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let Some(quantity) = quantity_field(&body).filter(|q| *q >= 1) else {
        return error(StatusCode::BAD_REQUEST, "quantity must be at least 1");
    };
    let Some(product_id) = body.get("product_id").and_then(Value::as_u64) else {
        return error(StatusCode::BAD_REQUEST, "product_id is required");
    };
    let Some(stock) = store.products.get(&product_id).map(|p| p.stock) else {
        return error(StatusCode::NOT_FOUND, "Product not found");
    };
    if stock < quantity {
        return error(StatusCode::BAD_REQUEST, "Insufficient stock");
    }

    if let Some(pos) = store
        .cart
        .iter()
        .position(|l| l.user_id == user_id && l.product_id == product_id)
    {
        let Some(line) = store.cart.get_mut(pos) else {
            return error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update cart item");
        };
        let merged = line.quantity + quantity;
        if stock < merged {
            return error(
                StatusCode::BAD_REQUEST,
                "Insufficient stock for requested quantity",
            );
        }
        line.quantity = merged;
        let json = store.cart.get(pos).map(|l| store.cart_item_json(l));
        return ok(json!({ "message": "Cart item updated successfully", "cart_item": json }));
    }

    let id = store.next_id();
    let line = CartRecord {
        id,
        user_id,
        product_id,
        quantity,
    };
    let json = store.cart_item_json(&line);
    store.cart.push(line);
    created(json!({ "message": "Item added to cart successfully", "cart_item": json }))
}

pub async fn update_cart_item(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = mock.store.lock();
    let user_id = match store.authenticate(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let Some(quantity) = quantity_field(&body).filter(|q| *q >= 1) else {
        return error(StatusCode::BAD_REQUEST, "quantity must be at least 1");
    };
    let Some(pos) = store
        .cart
        .iter()
        .position(|l| l.id == id && l.user_id == user_id)
    else {
        return error(StatusCode::NOT_FOUND, "Cart item not found");
    };
    let stock = store
        .cart
        .get(pos)
        .and_then(|l| store.products.get(&l.product_id))
        .map_or(0, |p| p.stock);
    if stock < quantity {
        return error(StatusCode::BAD_REQUEST, "Insufficient stock");
    }
    if let Some(line) = store.cart.get_mut(pos) {
        line.quantity = quantity;
    }
    let json = store.cart.get(pos).map(|l| store.cart_item_json(l));
    ok(json!({ "message": "Cart item updated successfully", "cart_item": json }))
}

pub async fn remove_cart_item(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply {
    let mut store = mock.store.lock();
    let user_id = match store.authenticate(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let before = store.cart.len();
    store.cart.retain(|l| !(l.id == id && l.user_id == user_id));
    if store.cart.len() == before {
        return error(StatusCode::NOT_FOUND, "Cart item not found");
    }
    ok(json!({ "message": "Item removed from cart successfully" }))
}

pub async fn clear_cart(State(mock): State<MockBackend>, headers: HeaderMap) -> Reply {
    let mut store = mock.store.lock();
    let user_id = match store.authenticate(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    store.cart.retain(|l| l.user_id != user_id);
    ok(json!({ "message": "Cart cleared successfully" }))
}

// =============================================================================
// Orders
// =============================================================================

pub async fn create_order(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = mock.store.lock();
    let user_id = match store.authenticate(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let (Some(shipping_address), Some(payment_method)) = (
        string_field(&body, "shipping_address"),
        string_field(&body, "payment_method"),
    ) else {
        return error(
            StatusCode::BAD_REQUEST,
            "shipping_address and payment_method are required",
        );
    };

    let lines: Vec<(u64, u32)> = store
        .cart
        .iter()
        .filter(|l| l.user_id == user_id)
        .map(|l| (l.product_id, l.quantity))
        .collect();
    if lines.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Cart is empty");
    }

    let mut total = 0.0;
    let mut priced = Vec::with_capacity(lines.len());
    for (product_id, quantity) in lines {
        let Some(product) = store.products.get(&product_id) else {
            return error(StatusCode::NOT_FOUND, "Product not found");
        };
        if product.stock < quantity {
            return error(
                StatusCode::BAD_REQUEST,
                &format!("Insufficient stock for product: {}", product.name),
            );
        }
        total += product.price * f64::from(quantity);
        priced.push((product_id, quantity, product.price));
    }

    let mut items = Vec::with_capacity(priced.len());
    for (product_id, quantity, price) in priced {
        if let Some(product) = store.products.get_mut(&product_id) {
            product.stock -= quantity;
        }
        items.push(OrderItemRecord {
            id: store.next_id(),
            product_id,
            quantity,
            price,
        });
    }
    store.cart.retain(|l| l.user_id != user_id);

    let order = OrderRecord {
        id: store.next_id(),
        user_id,
        status: "pending".to_string(),
        shipping_address,
        payment_method,
        total,
        items,
    };
    let json = store.order_json(&order);
    store.orders.push(order);
    created(json!({ "message": "Order created successfully", "order": json }))
}

pub async fn list_orders(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    let store = mock.store.lock();
    let user_id = match store.authenticate(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let own: Vec<&OrderRecord> = store.orders.iter().filter(|o| o.user_id == user_id).collect();
    ok(store.order_page(&own, &params))
}

pub async fn get_order(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply {
    let store = mock.store.lock();
    let user_id = match store.authenticate(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    store
        .orders
        .iter()
        .find(|o| o.id == id && o.user_id == user_id)
        .map_or_else(
            || error(StatusCode::NOT_FOUND, "Order not found"),
            |o| ok(json!({ "order": store.order_json(o) })),
        )
}

pub async fn list_all_orders(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    let store = mock.store.lock();
    if let Err(reply) = store.authenticate_admin(&headers) {
        return reply;
    }
    let status = params.get("status");
    let matching: Vec<&OrderRecord> = store
        .orders
        .iter()
        .filter(|o| status.is_none_or(|s| &o.status == s))
        .collect();
    ok(store.order_page(&matching, &params))
}

pub async fn update_order_status(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = mock.store.lock();
    if let Err(reply) = store.authenticate_admin(&headers) {
        return reply;
    }
    let Some(status) =
        string_field(&body, "status").filter(|s| ORDER_STATUSES.contains(&s.as_str()))
    else {
        return error(StatusCode::BAD_REQUEST, "Invalid order status");
    };
    let Some(pos) = store.orders.iter().position(|o| o.id == id) else {
        return error(StatusCode::NOT_FOUND, "Order not found");
    };

    // Cancelling returns the stock.
    let restock: Vec<(u64, u32)> = match store.orders.get(pos) {
        Some(order) if status == "cancelled" && order.status != "cancelled" => order
            .items
            .iter()
            .map(|i| (i.product_id, i.quantity))
            .collect(),
        _ => Vec::new(),
    };
    for (product_id, quantity) in restock {
        if let Some(product) = store.products.get_mut(&product_id) {
            product.stock += quantity;
        }
    }
    if let Some(order) = store.orders.get_mut(pos) {
        order.status = status;
    }
    let json = store.orders.get(pos).map(|o| store.order_json(o));
    ok(json!({ "message": "Order status updated successfully", "order": json }))
}
