//! Integration tests for Shopfront.
//!
//! Spins up an in-process mock of the Shopfront REST backend with `axum` on a
//! random local port and drives the real [`ApiClient`] against it.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Fault Injection
//!
//! [`MockBackend::fail_next`] answers the next matching request with a given
//! status, and [`MockBackend::delay_next`] holds it back before handling it
//! normally. [`MockBackend::hits`] counts requests per route so tests can
//! assert that something was (or was not) sent.

mod backend;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::json;
use tokio::task::JoinHandle;
use url::Url;

use shopfront_client::{ApiClient, ApiConfig, CartSynchronizer, SessionState};

use backend::{CartRecord, CategoryRecord, ProductRecord, Store, UserRecord};

const PREFIX: &str = "/api/v1";

/// Seeded shopper account.
pub const SHOPPER_EMAIL: &str = "ada@example.com";
pub const SHOPPER_PASSWORD: &str = "correct horse";
pub const SHOPPER_ADDRESS: &str = "1 Main St";

/// Seeded admin account.
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin battery";

/// Seeded products.
pub const SOLD_OUT: u64 = 5;
pub const MUG: u64 = 7;
pub const DRIED_PINEAPPLE: u64 = 8;

/// Seeded categories.
pub const FRUIT: u64 = 1;
pub const KITCHEN: u64 = 2;

enum Fault {
    Reject {
        status: StatusCode,
        message: Option<String>,
    },
    Delay(Duration),
}

struct PendingFault {
    method: Method,
    path: String,
    fault: Fault,
}

#[derive(Default)]
struct Traffic {
    faults: Vec<PendingFault>,
    hits: HashMap<String, usize>,
}

// =============================================================================
// MockBackend
// =============================================================================

/// Shared handle to the mock backend's state.
#[derive(Clone)]
pub struct MockBackend {
    store: Arc<Mutex<Store>>,
    traffic: Arc<Mutex<Traffic>>,
}

impl MockBackend {
    /// A backend with two users, two categories and three products.
    #[must_use]
    pub fn seeded() -> Self {
        let mut store = Store::default();
        // Skip past the seeded ids.
        for _ in 0..100 {
            store.next_id();
        }

        store.users.push(UserRecord {
            id: 1,
            email: SHOPPER_EMAIL.to_string(),
            password: SHOPPER_PASSWORD.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: String::new(),
            address: SHOPPER_ADDRESS.to_string(),
            role: "user",
        });
        store.users.push(UserRecord {
            id: 2,
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            phone: String::new(),
            address: String::new(),
            role: "admin",
        });

        store.categories.push(CategoryRecord {
            id: FRUIT,
            name: "Fruit".to_string(),
            description: "Fresh and dried".to_string(),
            image: String::new(),
        });
        store.categories.push(CategoryRecord {
            id: KITCHEN,
            name: "Kitchen".to_string(),
            description: String::new(),
            image: String::new(),
        });

        for (id, name, price, stock, category_id) in [
            (SOLD_OUT, "Golden Pineapple", 4.5, 0, FRUIT),
            (MUG, "Pineapple Mug", 10.0, 10, KITCHEN),
            (DRIED_PINEAPPLE, "Dried Pineapple", 3.25, 100, FRUIT),
        ] {
            store.products.insert(
                id,
                ProductRecord {
                    id,
                    name: name.to_string(),
                    description: String::new(),
                    price,
                    stock,
                    category_id,
                },
            );
        }

        Self {
            store: Arc::new(Mutex::new(store)),
            traffic: Arc::new(Mutex::new(Traffic::default())),
        }
    }

    /// Answer the next `method path` request with `status` and an
    /// `{ "error": message }` body (or `{}` without a message).
    pub fn fail_next(&self, method: Method, path: &str, status: StatusCode, message: Option<&str>) {
        self.push_fault(
            method,
            path,
            Fault::Reject {
                status,
                message: message.map(String::from),
            },
        );
    }

    /// Hold the next `method path` request for `delay`, then handle it.
    pub fn delay_next(&self, method: Method, path: &str, delay: Duration) {
        self.push_fault(method, path, Fault::Delay(delay));
    }

    /// Number of `method path` requests received so far.
    #[must_use]
    pub fn hits(&self, method: &Method, path: &str) -> usize {
        self.traffic
            .lock()
            .hits
            .get(&format!("{method} {path}"))
            .copied()
            .unwrap_or(0)
    }

    /// Forget every issued token, as if the server restarted.
    pub fn revoke_all_tokens(&self) {
        self.store.lock().tokens.clear();
    }

    /// Put a line straight into a user's server-side cart.
    pub fn seed_cart(&self, email: &str, product_id: u64, quantity: u32) {
        let mut store = self.store.lock();
        let Some(user_id) = store.user_by_email(email).map(|u| u.id) else {
            return;
        };
        let id = store.next_id();
        store.cart.push(CartRecord {
            id,
            user_id,
            product_id,
            quantity,
        });
    }

    /// `(product_id, quantity)` for each line of a user's server-side cart.
    #[must_use]
    pub fn cart_of(&self, email: &str) -> Vec<(u64, u32)> {
        let store = self.store.lock();
        let Some(user_id) = store.user_by_email(email).map(|u| u.id) else {
            return Vec::new();
        };
        store
            .cart
            .iter()
            .filter(|l| l.user_id == user_id)
            .map(|l| (l.product_id, l.quantity))
            .collect()
    }

    /// Current stock of a product.
    #[must_use]
    pub fn stock_of(&self, product_id: u64) -> Option<u32> {
        self.store.lock().products.get(&product_id).map(|p| p.stock)
    }

    /// Change a product's stock behind the client's back.
    pub fn set_stock(&self, product_id: u64, stock: u32) {
        if let Some(product) = self.store.lock().products.get_mut(&product_id) {
            product.stock = stock;
        }
    }

    fn push_fault(&self, method: Method, path: &str, fault: Fault) {
        self.traffic.lock().faults.push(PendingFault {
            method,
            path: path.to_string(),
            fault,
        });
    }

    /// Count the request and take the first fault registered for it.
    fn record(&self, method: &Method, path: &str) -> Option<Fault> {
        let mut traffic = self.traffic.lock();
        *traffic.hits.entry(format!("{method} {path}")).or_default() += 1;
        let pos = traffic
            .faults
            .iter()
            .position(|f| f.method == *method && f.path == path)?;
        Some(traffic.faults.remove(pos).fault)
    }
}

async fn intercept(State(mock): State<MockBackend>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    let path = path.strip_prefix(PREFIX).unwrap_or(path).to_string();

    match mock.record(request.method(), &path) {
        Some(Fault::Reject { status, message }) => {
            let body = message.map_or_else(|| json!({}), |m| json!({ "error": m }));
            return (status, Json(body)).into_response();
        }
        Some(Fault::Delay(delay)) => tokio::time::sleep(delay).await,
        None => {}
    }
    next.run(request).await
}

/// Routes of the mock backend, nested under `/api/v1`.
pub fn router(mock: MockBackend) -> Router {
    let api = Router::new()
        .route("/health", get(backend::health))
        .route("/auth/register", post(backend::register))
        .route("/auth/login", post(backend::login))
        .route("/auth/logout", post(backend::logout))
        .route(
            "/auth/profile",
            get(backend::profile).put(backend::update_profile),
        )
        .route(
            "/products",
            get(backend::list_products).post(backend::create_product),
        )
        .route(
            "/products/{id}",
            get(backend::get_product)
                .put(backend::update_product)
                .delete(backend::delete_product),
        )
        .route(
            "/categories",
            get(backend::list_categories).post(backend::create_category),
        )
        .route(
            "/categories/{id}",
            get(backend::get_category)
                .put(backend::update_category)
                .delete(backend::delete_category),
        )
        .route("/cart", get(backend::fetch_cart))
        .route("/cart/add", post(backend::add_to_cart))
        .route(
            "/cart/item/{id}",
            put(backend::update_cart_item).delete(backend::remove_cart_item),
        )
        .route("/cart/clear", delete(backend::clear_cart))
        .route(
            "/orders",
            get(backend::list_orders).post(backend::create_order),
        )
        .route("/orders/all", get(backend::list_all_orders))
        .route("/orders/{id}", get(backend::get_order))
        .route("/orders/{id}/status", put(backend::update_order_status));

    Router::new()
        .nest(PREFIX, api)
        .layer(middleware::from_fn_with_state(mock.clone(), intercept))
        .with_state(mock)
}

// =============================================================================
// MockServer
// =============================================================================

/// A running mock backend. Shut down on drop.
pub struct MockServer {
    pub backend: MockBackend,
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Start a seeded backend on a random local port.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let backend = MockBackend::seeded();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Mock backend has no address");

        let app = router(backend.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            backend,
            addr,
            handle,
        }
    }

    /// Client settings pointing at this server.
    ///
    /// # Panics
    ///
    /// Panics if the bound address does not form a URL.
    #[must_use]
    pub fn api_config(&self) -> ApiConfig {
        let url = Url::parse(&format!("http://{}", self.addr)).expect("Invalid mock backend URL");
        let mut config = ApiConfig::new(url);
        config.request_timeout = Duration::from_secs(5);
        config
    }

    /// An API client with a fresh in-memory session.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn client(&self) -> ApiClient {
        let session = Arc::new(SessionState::in_memory());
        ApiClient::new(&self.api_config(), session).expect("Failed to build API client")
    }

    /// A cart synchronizer over a fresh client.
    #[must_use]
    pub fn cart(&self) -> Arc<CartSynchronizer<ApiClient>> {
        let api = self.client();
        let session = Arc::clone(api.session());
        Arc::new(CartSynchronizer::new(api, session))
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
