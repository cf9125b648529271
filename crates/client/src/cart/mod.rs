//! Cart synchronizer.
//!
//! Keeps a local copy of the signed-in user's cart in agreement with the
//! backend while giving immediate feedback:
//!
//! - `set_quantity`, `remove_item` and `clear` apply locally first, then send
//!   the change; a failure restores the exact pre-change snapshot
//! - `add_item` validates against known stock, then waits for the server
//! - every confirmed change is followed by a full `refresh`
//!
//! Mutations are serialized. Refreshes may overlap; each takes a ticket and
//! a response older than the last local write is dropped. All state is
//! stamped with the session epoch, so signing out (or the backend rejecting
//! the token) empties the cart and voids whatever was in flight.

mod error;
mod state;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use shopfront_core::{CartItemId, ProductId};

pub use error::CartError;
pub use state::{CartLine, CartPhase, CartView};

use crate::api::ApiError;
use crate::session::{SessionEvent, SessionState};
use crate::types::{AddToCartRequest, CartItem, CartResponse, Product};
use state::CartState;

/// Result alias for cart operations.
pub type CartResult<T> = Result<T, CartError>;

/// Backend cart endpoints. Implemented by [`crate::ApiClient`].
pub trait CartBackend: Send + Sync {
    /// `GET /cart`
    fn fetch_cart(&self) -> impl Future<Output = Result<CartResponse, ApiError>> + Send;

    /// `POST /cart/add`
    fn add_item(
        &self,
        request: AddToCartRequest,
    ) -> impl Future<Output = Result<CartItem, ApiError>> + Send;

    /// `PUT /cart/item/{id}`
    fn update_item(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `DELETE /cart/item/{id}`
    fn remove_item(&self, item_id: CartItemId)
    -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `DELETE /cart/clear`
    fn clear_cart(&self) -> impl Future<Output = Result<(), ApiError>> + Send;
}

// =============================================================================
// CartSynchronizer
// =============================================================================

/// Owns the local cart and mediates every change to it.
pub struct CartSynchronizer<B> {
    backend: B,
    session: Arc<SessionState>,
    state: Mutex<CartState>,
    /// Held for the whole of each mutation.
    mutations: tokio::sync::Mutex<()>,
    tickets: AtomicU64,
}

impl<B: CartBackend> CartSynchronizer<B> {
    pub fn new(backend: B, session: Arc<SessionState>) -> Self {
        let epoch = session.epoch();
        Self {
            backend,
            session,
            state: Mutex::new(CartState::new(epoch)),
            mutations: tokio::sync::Mutex::new(()),
            tickets: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub const fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Current cart contents.
    #[must_use]
    pub fn view(&self) -> CartView {
        self.lock_state().view()
    }

    #[must_use]
    pub fn phase(&self) -> CartPhase {
        self.lock_state().phase()
    }

    /// Record a product's stock so `add_item` can reject impossible
    /// quantities without a round trip.
    pub fn observe_product(&self, product: &Product) {
        self.state.lock().observe(product);
    }

    /// Replace the local cart with the server's.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Unauthenticated` without a session,
    /// `CartError::SessionChanged` if the session changed while fetching, or
    /// the mapped backend error.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> CartResult<CartView> {
        let epoch = self.require_session()?;
        let ticket = self.next_ticket();
        {
            let mut state = self.lock_state();
            if state.epoch() == epoch {
                state.mark_loading();
            }
        }

        let result = self.backend.fetch_cart().await;
        let result = self.reject_stale(epoch, result)?;

        let mut state = self.lock_state();
        if state.epoch() != epoch {
            debug!("Discarding cart fetched for a previous session");
            return Err(CartError::SessionChanged);
        }
        match result {
            Ok(cart) => {
                if state.is_stale(ticket) {
                    debug!(ticket, "Discarding out-of-order cart response");
                } else {
                    state.replace(cart.cart_items, ticket);
                }
                Ok(state.view())
            }
            Err(err) => {
                state.abandon_loading();
                drop(state);
                Err(self.fail(epoch, err))
            }
        }
    }

    /// Add `quantity` units of a product.
    ///
    /// Not optimistic: the line appears once the server confirms it and the
    /// follow-up refresh lands.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` (nothing sent) if `quantity` is
    /// zero or the cart would exceed the product's known stock, otherwise the
    /// backend's reason or `CartError::AddFailed`.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_item(&self, product_id: ProductId, quantity: u32) -> CartResult<CartView> {
        if quantity == 0 {
            return Err(CartError::invalid_quantity(quantity, None));
        }
        let epoch = self.require_session()?;
        {
            let state = self.lock_state();
            if let Some(stock) = state.known_stock(product_id) {
                let wanted = state.quantity_of(product_id).saturating_add(quantity);
                if wanted > stock {
                    return Err(CartError::invalid_quantity(wanted, Some(stock)));
                }
            }
        }

        let guard = self.mutations.lock().await;
        self.ensure_epoch(epoch)?;

        let result = self
            .backend
            .add_item(AddToCartRequest {
                product_id,
                quantity,
            })
            .await;
        let result = self.reject_stale(epoch, result)?;

        self.ensure_epoch(epoch)?;
        match result {
            Ok(item) => {
                self.state.lock().observe(&item.product);
                drop(guard);
                self.confirm().await
            }
            Err(err) => Err(CartError::from_add(err)),
        }
    }

    /// Change a line's quantity, optimistically.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` (nothing sent) for zero, or the
    /// mapped backend error after rolling back.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn set_quantity(&self, item_id: CartItemId, quantity: u32) -> CartResult<CartView> {
        if quantity == 0 {
            return Err(CartError::invalid_quantity(quantity, None));
        }
        self.mutate(
            move |state| state.set_quantity(item_id, quantity),
            || self.backend.update_item(item_id, quantity),
        )
        .await
    }

    /// Remove a line, optimistically.
    ///
    /// # Errors
    ///
    /// Returns the mapped backend error after rolling back.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_item(&self, item_id: CartItemId) -> CartResult<CartView> {
        self.mutate(
            move |state| state.remove(item_id),
            || self.backend.remove_item(item_id),
        )
        .await
    }

    /// Empty the cart, optimistically.
    ///
    /// # Errors
    ///
    /// Returns the mapped backend error after rolling back.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> CartResult<CartView> {
        self.mutate(CartState::clear_lines, || self.backend.clear_cart())
            .await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Lock the state, first resetting it if it belongs to an older session.
    fn lock_state(&self) -> MutexGuard<'_, CartState> {
        let epoch = self.session.epoch();
        let mut state = self.state.lock();
        if state.epoch() != epoch {
            debug!(from = state.epoch(), to = epoch, "Session changed, resetting cart");
            state.reset(epoch);
        }
        state
    }

    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn require_session(&self) -> CartResult<u64> {
        self.session
            .active_epoch()
            .ok_or(CartError::Unauthenticated)
    }

    fn ensure_epoch(&self, epoch: u64) -> CartResult<()> {
        if self.lock_state().epoch() == epoch {
            Ok(())
        } else {
            debug!("Session changed during cart operation, discarding outcome");
            Err(CartError::SessionChanged)
        }
    }

    /// Surface a rejected token as `StaleSession` before any epoch check.
    /// The client may already have cleared the session, which would
    /// otherwise read as `SessionChanged`.
    fn reject_stale<T>(
        &self,
        epoch: u64,
        result: Result<T, ApiError>,
    ) -> CartResult<Result<T, ApiError>> {
        match result {
            Err(ApiError::Unauthorized) => Err(self.fail(epoch, ApiError::Unauthorized)),
            other => Ok(other),
        }
    }

    /// Map a backend failure, clearing the session if it was rejected.
    fn fail(&self, epoch: u64, err: ApiError) -> CartError {
        if matches!(err, ApiError::Unauthorized) {
            self.session.invalidate(epoch);
        }
        let err = CartError::from(err);
        warn!(error = %err, "Cart operation failed");
        err
    }

    /// Snapshot, apply locally, send, then commit or roll back.
    async fn mutate<F, S, Fut>(&self, apply: F, send: S) -> CartResult<CartView>
    where
        F: FnOnce(&mut CartState) + Send,
        S: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<(), ApiError>> + Send,
    {
        let epoch = self.require_session()?;
        let guard = self.mutations.lock().await;

        let snapshot = {
            let mut state = self.lock_state();
            if state.epoch() != epoch {
                return Err(CartError::SessionChanged);
            }
            let snapshot = state.snapshot();
            apply(&mut state);
            state.begin_mutation(self.next_ticket());
            snapshot
        };

        let result = self.reject_stale(epoch, send().await)?;

        {
            let mut state = self.lock_state();
            if state.epoch() != epoch {
                debug!("Session changed during cart mutation, discarding outcome");
                return Err(CartError::SessionChanged);
            }
            match result {
                Ok(()) => state.finish_mutation(self.next_ticket()),
                Err(err) => {
                    state.restore(snapshot, self.next_ticket());
                    drop(state);
                    return Err(self.fail(epoch, err));
                }
            }
        }

        drop(guard);
        self.confirm().await
    }

    /// Refresh after a confirmed change. The change itself succeeded, so a
    /// failed refresh only matters if it lost the session.
    async fn confirm(&self) -> CartResult<CartView> {
        match self.refresh().await {
            Ok(view) => Ok(view),
            Err(err) if err.is_session_loss() => Err(err),
            Err(err) => {
                warn!(error = %err, "Cart refresh after change failed, keeping local state");
                Ok(self.view())
            }
        }
    }
}

impl<B: CartBackend + 'static> CartSynchronizer<B> {
    /// Follow session transitions: load the cart when a session is
    /// established, drop it when the session ends.
    ///
    /// The task stops once the synchronizer is dropped.
    pub fn watch_session(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.session.subscribe();
        let cart: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let event = events.recv().await;
                let Some(cart) = cart.upgrade() else {
                    break;
                };
                match event {
                    Ok(SessionEvent::Established { user, epoch }) => {
                        if cart.session.epoch() != epoch {
                            continue;
                        }
                        debug!(user_id = %user.id, "Session established, loading cart");
                        if let Err(e) = cart.refresh().await {
                            warn!(error = %e, "Failed to load cart for new session");
                        }
                    }
                    Ok(SessionEvent::Cleared { .. }) => {
                        debug!(phase = %cart.phase(), "Session cleared, cart reset");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed session events, resynchronizing cart");
                        if cart.session.is_authenticated()
                            && let Err(e) = cart.refresh().await
                        {
                            warn!(error = %e, "Failed to resynchronize cart");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use secrecy::SecretString;
    use tokio::sync::oneshot;

    use shopfront_core::{CategoryId, Email, Money, UserId, UserRole};

    use super::*;
    use crate::types::User;

    // =========================================================================
    // Fake backend
    // =========================================================================

    enum Outcome {
        Proceed,
        Reject(Option<&'static str>),
        Network,
        Unauthorized,
    }

    impl Outcome {
        fn into_result(self) -> Result<(), ApiError> {
            match self {
                Self::Proceed => Ok(()),
                Self::Reject(message) => Err(ApiError::Status {
                    status: 400,
                    message: message.map(ToString::to_string),
                }),
                Self::Network => Err(ApiError::Http(
                    reqwest::Client::new().get("http://").build().unwrap_err(),
                )),
                Self::Unauthorized => Err(ApiError::Unauthorized),
            }
        }
    }

    struct Hold {
        started: oneshot::Sender<()>,
        release: oneshot::Receiver<Outcome>,
    }

    /// In-memory cart server. Responses can be delayed or failed per call.
    #[derive(Default)]
    struct FakeBackend {
        items: Mutex<Vec<CartItem>>,
        products: Mutex<HashMap<ProductId, Product>>,
        next_id: AtomicU64,
        calls: AtomicUsize,
        hold: Mutex<Option<Hold>>,
        fail_next: Mutex<Option<Outcome>>,
    }

    impl FakeBackend {
        fn with_products(products: Vec<Product>) -> Self {
            let backend = Self {
                next_id: AtomicU64::new(100),
                ..Self::default()
            };
            backend
                .products
                .lock()
                .extend(products.into_iter().map(|p| (p.id, p)));
            backend
        }

        /// Seed a line directly on the "server".
        fn seed(&self, id: u64, product_id: u64, quantity: u32) {
            let product = self.products.lock()[&ProductId::new(product_id)].clone();
            self.items.lock().push(CartItem {
                id: CartItemId::new(id),
                product_id: product.id,
                quantity,
                subtotal: product.price.times(quantity),
                product,
            });
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn fail_next(&self, outcome: Outcome) {
            *self.fail_next.lock() = Some(outcome);
        }

        /// Park the next call until released.
        fn hold_next(&self) -> (oneshot::Receiver<()>, oneshot::Sender<Outcome>) {
            let (started_tx, started_rx) = oneshot::channel();
            let (release_tx, release_rx) = oneshot::channel();
            *self.hold.lock() = Some(Hold {
                started: started_tx,
                release: release_rx,
            });
            (started_rx, release_tx)
        }

        async fn gate(&self) -> Result<(), ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failure = self.fail_next.lock().take();
            if let Some(outcome) = failure {
                return outcome.into_result();
            }
            let hold = self.hold.lock().take();
            match hold {
                Some(Hold { started, release }) => {
                    let _ = started.send(());
                    release.await.unwrap_or(Outcome::Proceed).into_result()
                }
                None => Ok(()),
            }
        }
    }

    impl CartBackend for FakeBackend {
        async fn fetch_cart(&self) -> Result<CartResponse, ApiError> {
            // Read before waiting, so a delayed response carries old data.
            let items = self.items.lock().clone();
            self.gate().await?;
            Ok(CartResponse {
                total_amount: items.iter().map(|i| &i.subtotal).sum(),
                total_items: items.iter().map(|i| i.quantity).sum(),
                cart_items: items,
            })
        }

        async fn add_item(&self, request: AddToCartRequest) -> Result<CartItem, ApiError> {
            self.gate().await?;
            let product = self
                .products
                .lock()
                .get(&request.product_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

            let mut items = self.items.lock();
            if let Some(line) = items.iter_mut().find(|i| i.product_id == product.id) {
                line.quantity += request.quantity;
                line.subtotal = product.price.times(line.quantity);
                return Ok(line.clone());
            }
            let line = CartItem {
                id: CartItemId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
                product_id: product.id,
                quantity: request.quantity,
                subtotal: product.price.times(request.quantity),
                product,
            };
            items.push(line.clone());
            Ok(line)
        }

        async fn update_item(&self, item_id: CartItemId, quantity: u32) -> Result<(), ApiError> {
            self.gate().await?;
            let mut items = self.items.lock();
            let line = items
                .iter_mut()
                .find(|i| i.id == item_id)
                .ok_or_else(|| ApiError::NotFound("Cart item not found".to_string()))?;
            line.quantity = quantity;
            line.subtotal = line.product.price.times(quantity);
            Ok(())
        }

        async fn remove_item(&self, item_id: CartItemId) -> Result<(), ApiError> {
            self.gate().await?;
            self.items.lock().retain(|i| i.id != item_id);
            Ok(())
        }

        async fn clear_cart(&self) -> Result<(), ApiError> {
            self.gate().await?;
            self.items.lock().clear();
            Ok(())
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn product(id: u64, cents: i64, stock: u32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Money::from_cents(cents),
            stock,
            image: None,
            category_id: CategoryId::new(1),
            category: None,
            created_at: None,
        }
    }

    fn user(id: u64) -> User {
        User {
            id: UserId::new(id),
            email: Email::parse(&format!("user{id}@example.com")).unwrap(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            address: None,
            role: UserRole::User,
            created_at: None,
        }
    }

    fn sign_in(session: &SessionState, id: u64) {
        session
            .install(user(id), SecretString::from(format!("token-{id}")))
            .unwrap();
    }

    /// Signed-in synchronizer over a catalog of product 7 (10.00, stock 10),
    /// product 8 (2.50, stock 3) and product 5 (out of stock).
    fn setup() -> Arc<CartSynchronizer<FakeBackend>> {
        let backend = FakeBackend::with_products(vec![
            product(7, 1000, 10),
            product(8, 250, 3),
            product(5, 500, 0),
        ]);
        let session = Arc::new(SessionState::in_memory());
        sign_in(&session, 1);
        Arc::new(CartSynchronizer::new(backend, session))
    }

    fn assert_totals_consistent(view: &CartView) {
        let quantity: u32 = view.lines().iter().map(|l| l.quantity).sum();
        let total: Money = view.lines().iter().map(|l| l.subtotal).sum();
        assert_eq!(view.item_count(), quantity);
        assert_eq!(view.total(), total);
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    // =========================================================================
    // Tests
    // =========================================================================

    #[tokio::test]
    async fn test_operations_require_session() {
        let backend = FakeBackend::with_products(vec![product(7, 1000, 10)]);
        let cart = CartSynchronizer::new(backend, Arc::new(SessionState::in_memory()));

        let id = CartItemId::new(1);
        assert_eq!(cart.refresh().await, Err(CartError::Unauthenticated));
        assert_eq!(
            cart.add_item(ProductId::new(7), 1).await,
            Err(CartError::Unauthenticated)
        );
        assert_eq!(cart.set_quantity(id, 2).await, Err(CartError::Unauthenticated));
        assert_eq!(cart.remove_item(id).await, Err(CartError::Unauthenticated));
        assert_eq!(cart.clear().await, Err(CartError::Unauthenticated));
        assert_eq!(cart.backend().calls(), 0);
        assert_eq!(cart.phase(), CartPhase::Empty);
    }

    #[tokio::test]
    async fn test_refresh_loads_server_cart() {
        let cart = setup();
        cart.backend().seed(1, 7, 2);

        let view = cart.refresh().await.unwrap();

        assert_eq!(view.phase(), CartPhase::Ready);
        assert_eq!(view.item_count(), 2);
        assert_eq!(view.total(), Money::from_cents(2000));
        // Repeating it changes nothing.
        assert_eq!(cart.refresh().await.unwrap(), view);
    }

    #[tokio::test]
    async fn test_totals_stay_consistent_across_mutations() {
        let cart = setup();

        let view = cart.add_item(ProductId::new(7), 1).await.unwrap();
        assert_totals_consistent(&view);
        let view = cart.add_item(ProductId::new(8), 2).await.unwrap();
        assert_totals_consistent(&view);
        assert_eq!(view.item_count(), 3);
        assert_eq!(view.total(), Money::from_cents(1500));

        let line = view.line_for_product(ProductId::new(7)).unwrap().id;
        let view = cart.set_quantity(line, 4).await.unwrap();
        assert_totals_consistent(&view);
        assert_eq!(view.total(), Money::from_cents(4500));

        let view = cart.remove_item(line).await.unwrap();
        assert_totals_consistent(&view);
        assert_eq!(view.item_count(), 2);
        assert_eq!(view.phase(), CartPhase::Ready);
    }

    #[tokio::test]
    async fn test_set_quantity_is_optimistic_and_rolls_back() {
        let cart = setup();
        cart.backend().seed(1, 7, 2);
        let before = cart.refresh().await.unwrap();
        let (started, release) = cart.backend().hold_next();

        let task = tokio::spawn({
            let cart = Arc::clone(&cart);
            async move { cart.set_quantity(CartItemId::new(1), 3).await }
        });
        started.await.unwrap();

        let pending = cart.view();
        let line = pending.line(CartItemId::new(1)).unwrap();
        assert_eq!(pending.phase(), CartPhase::Mutating);
        assert_eq!(line.quantity, 3);
        assert_eq!(line.subtotal, Money::from_cents(3000));
        assert_eq!(pending.total(), Money::from_cents(3000));

        let _ = release.send(Outcome::Reject(Some("Insufficient stock")));
        let result = task.await.unwrap();

        assert_eq!(
            result,
            Err(CartError::ServerRejected("Insufficient stock".to_string()))
        );
        assert_eq!(cart.view(), before);
        let line = cart.view().line(CartItemId::new(1)).cloned().unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.subtotal, Money::from_cents(2000));
    }

    #[tokio::test]
    async fn test_network_failure_rolls_back() {
        let cart = setup();
        cart.backend().seed(1, 7, 2);
        cart.backend().seed(2, 8, 1);
        let before = cart.refresh().await.unwrap();

        cart.backend().fail_next(Outcome::Network);
        let err = cart.set_quantity(CartItemId::new(1), 5).await.unwrap_err();
        assert!(matches!(err, CartError::Network(_)));
        assert_eq!(cart.view(), before);

        cart.backend().fail_next(Outcome::Network);
        assert!(cart.remove_item(CartItemId::new(2)).await.is_err());
        assert_eq!(cart.view(), before);

        cart.backend().fail_next(Outcome::Reject(None));
        assert!(cart.clear().await.is_err());
        assert_eq!(cart.view(), before);
    }

    #[tokio::test]
    async fn test_clear_then_refresh_is_empty() {
        let cart = setup();
        cart.backend().seed(1, 7, 2);
        cart.refresh().await.unwrap();

        cart.clear().await.unwrap();
        let view = cart.refresh().await.unwrap();

        assert!(view.is_empty());
        assert_eq!(view.item_count(), 0);
        assert_eq!(view.total(), Money::ZERO);
        assert_eq!(view.phase(), CartPhase::Ready);
    }

    #[tokio::test]
    async fn test_sign_out_during_mutation_empties_cart() {
        for outcome in [Outcome::Proceed, Outcome::Reject(Some("nope"))] {
            let cart = setup();
            cart.backend().seed(1, 7, 2);
            cart.refresh().await.unwrap();
            let (started, release) = cart.backend().hold_next();

            let task = tokio::spawn({
                let cart = Arc::clone(&cart);
                async move { cart.set_quantity(CartItemId::new(1), 3).await }
            });
            started.await.unwrap();

            cart.session().clear();
            let _ = release.send(outcome);

            assert_eq!(task.await.unwrap(), Err(CartError::SessionChanged));
            let view = cart.view();
            assert!(view.is_empty());
            assert_eq!(view.phase(), CartPhase::Empty);
        }
    }

    #[tokio::test]
    async fn test_add_rejects_quantity_beyond_known_stock() {
        let cart = setup();
        cart.observe_product(&product(5, 500, 0));

        assert_eq!(
            cart.add_item(ProductId::new(5), 1).await,
            Err(CartError::invalid_quantity(1, Some(0)))
        );
        assert_eq!(
            cart.add_item(ProductId::new(7), 0).await,
            Err(CartError::invalid_quantity(0, None))
        );
        assert_eq!(cart.backend().calls(), 0);

        // Stock learned from the cart itself: 2 of 3 already present.
        cart.backend().seed(1, 8, 2);
        cart.refresh().await.unwrap();
        let calls = cart.backend().calls();
        assert_eq!(
            cart.add_item(ProductId::new(8), 2).await,
            Err(CartError::invalid_quantity(4, Some(3)))
        );
        assert_eq!(cart.backend().calls(), calls);
    }

    #[tokio::test]
    async fn test_add_failure_reasons() {
        let cart = setup();

        cart.backend().fail_next(Outcome::Reject(Some("Insufficient stock")));
        assert_eq!(
            cart.add_item(ProductId::new(7), 1).await,
            Err(CartError::ServerRejected("Insufficient stock".to_string()))
        );

        cart.backend().fail_next(Outcome::Reject(None));
        assert_eq!(
            cart.add_item(ProductId::new(7), 1).await,
            Err(CartError::AddFailed)
        );
        assert!(cart.view().is_empty());
    }

    #[tokio::test]
    async fn test_slow_refresh_never_overwrites_newer_one() {
        let cart = setup();
        let (started, release) = cart.backend().hold_next();

        let slow = tokio::spawn({
            let cart = Arc::clone(&cart);
            async move { cart.refresh().await }
        });
        started.await.unwrap();

        // The server cart changes; a later refresh sees it first.
        cart.backend().seed(1, 7, 2);
        let fresh = cart.refresh().await.unwrap();
        assert_eq!(fresh.item_count(), 2);

        let _ = release.send(Outcome::Proceed);
        let stale = slow.await.unwrap().unwrap();

        assert_eq!(stale.item_count(), 2);
        assert_eq!(cart.view(), fresh);
    }

    #[tokio::test]
    async fn test_refresh_started_before_mutation_is_ignored() {
        let cart = setup();
        cart.backend().seed(1, 7, 2);
        cart.refresh().await.unwrap();
        let (started, release) = cart.backend().hold_next();

        let slow = tokio::spawn({
            let cart = Arc::clone(&cart);
            async move { cart.refresh().await }
        });
        started.await.unwrap();

        let view = cart.remove_item(CartItemId::new(1)).await.unwrap();
        assert!(view.is_empty());

        let _ = release.send(Outcome::Proceed);
        slow.await.unwrap().unwrap();
        assert!(cart.view().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_during_mutation_keeps_optimistic_lines() {
        let cart = setup();
        cart.backend().seed(1, 7, 2);
        cart.refresh().await.unwrap();
        let (started, release) = cart.backend().hold_next();

        let task = tokio::spawn({
            let cart = Arc::clone(&cart);
            async move { cart.set_quantity(CartItemId::new(1), 3).await }
        });
        started.await.unwrap();

        // The server still reports the old quantity.
        let view = cart.refresh().await.unwrap();
        assert_eq!(view.phase(), CartPhase::Mutating);
        assert_eq!(view.line(CartItemId::new(1)).unwrap().quantity, 3);
        assert_eq!(view.total(), Money::from_cents(3000));

        let _ = release.send(Outcome::Proceed);
        let view = task.await.unwrap().unwrap();
        assert_eq!(view.line(CartItemId::new(1)).unwrap().quantity, 3);
        assert_eq!(view.phase(), CartPhase::Ready);
    }

    #[tokio::test]
    async fn test_refresh_outliving_mutation_is_ignored() {
        let cart = setup();
        cart.backend().seed(1, 7, 2);
        cart.refresh().await.unwrap();
        let (started, release) = cart.backend().hold_next();

        let task = tokio::spawn({
            let cart = Arc::clone(&cart);
            async move { cart.set_quantity(CartItemId::new(1), 3).await }
        });
        started.await.unwrap();

        // A fetch that reads the old cart and answers after the change lands.
        let (fetch_started, fetch_release) = cart.backend().hold_next();
        let slow = tokio::spawn({
            let cart = Arc::clone(&cart);
            async move { cart.refresh().await }
        });
        fetch_started.await.unwrap();

        let _ = release.send(Outcome::Proceed);
        let confirmed = task.await.unwrap().unwrap();
        assert_eq!(confirmed.line(CartItemId::new(1)).unwrap().quantity, 3);

        let _ = fetch_release.send(Outcome::Proceed);
        slow.await.unwrap().unwrap();
        let view = cart.view();
        assert_eq!(view, confirmed);
        assert_eq!(view.total(), Money::from_cents(3000));
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_and_cart() {
        let cart = setup();
        cart.backend().seed(1, 7, 2);
        cart.refresh().await.unwrap();

        cart.backend().fail_next(Outcome::Unauthorized);
        let err = cart.set_quantity(CartItemId::new(1), 3).await.unwrap_err();

        assert_eq!(err, CartError::StaleSession);
        assert!(!cart.session().is_authenticated());
        let view = cart.view();
        assert!(view.is_empty());
        assert_eq!(view.phase(), CartPhase::Empty);
    }

    #[tokio::test]
    async fn test_watch_session_follows_sign_in_and_out() {
        let backend = FakeBackend::with_products(vec![product(7, 1000, 10)]);
        backend.seed(1, 7, 2);
        let session = Arc::new(SessionState::in_memory());
        let cart = Arc::new(CartSynchronizer::new(backend, Arc::clone(&session)));
        let watcher = cart.watch_session();

        sign_in(&session, 1);
        eventually(|| cart.view().item_count() == 2).await;
        assert_eq!(cart.phase(), CartPhase::Ready);

        session.clear();
        eventually(|| cart.view().is_empty()).await;
        assert_eq!(cart.phase(), CartPhase::Empty);

        watcher.abort();
    }

    #[tokio::test]
    async fn test_switching_users_drops_previous_cart() {
        let cart = setup();
        cart.backend().seed(1, 7, 2);
        cart.refresh().await.unwrap();

        sign_in(cart.session(), 2);

        assert!(cart.view().is_empty());
        assert_eq!(cart.phase(), CartPhase::Empty);
    }
}
