//! The in-memory cart container.
//!
//! `CartState` is only ever touched under the synchronizer's lock. Every
//! write is stamped with a ticket; a server response carrying an older ticket
//! than the last applied write is stale and must not replace the lines.

use std::collections::HashMap;
use std::fmt;

use shopfront_core::{CartItemId, Money, ProductId};

use crate::types::{CartItem, Product};

/// Where the cart is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CartPhase {
    /// Nothing loaded (no session, or not fetched yet).
    #[default]
    Empty,
    /// First fetch in flight.
    Loading,
    /// In agreement with the last server response.
    Ready,
    /// An optimistic change is awaiting confirmation.
    Mutating,
}

impl fmt::Display for CartPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Mutating => "mutating",
        })
    }
}

/// A line in the local cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    /// Server-assigned line ID.
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    /// Unit price at last sync.
    pub unit_price: Money,
    pub image: Option<String>,
    /// Product stock at last sync.
    pub stock: u32,
    pub quantity: u32,
    pub subtotal: Money,
}

impl CartLine {
    fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.subtotal = self.unit_price.times(quantity);
    }
}

impl From<CartItem> for CartLine {
    fn from(item: CartItem) -> Self {
        let image = item.product.image().map(ToString::to_string);
        Self {
            id: item.id,
            product_id: item.product_id,
            name: item.product.name,
            unit_price: item.product.price,
            image,
            stock: item.product.stock,
            quantity: item.quantity,
            subtotal: item.subtotal,
        }
    }
}

/// Immutable copy of the cart handed to readers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartView {
    lines: Vec<CartLine>,
    phase: CartPhase,
}

impl CartView {
    /// Lines in server order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub const fn phase(&self) -> CartPhase {
        self.phase
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Sum of line subtotals.
    #[must_use]
    pub fn total(&self) -> Money {
        self.lines.iter().map(|line| &line.subtotal).sum()
    }

    #[must_use]
    pub fn line(&self, id: CartItemId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.id == id)
    }

    #[must_use]
    pub fn line_for_product(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }
}

/// Exact pre-mutation contents, restored verbatim on rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Snapshot {
    lines: Vec<CartLine>,
    phase: CartPhase,
}

#[derive(Debug)]
pub(crate) struct CartState {
    epoch: u64,
    phase: CartPhase,
    lines: Vec<CartLine>,
    /// Ticket of the last write applied to `lines`.
    applied: u64,
    /// Known stock per product, from cart lines and browsed products.
    stock: HashMap<ProductId, u32>,
}

impl CartState {
    pub(crate) fn new(epoch: u64) -> Self {
        Self {
            epoch,
            phase: CartPhase::Empty,
            lines: Vec::new(),
            applied: 0,
            stock: HashMap::new(),
        }
    }

    pub(crate) const fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) const fn phase(&self) -> CartPhase {
        self.phase
    }

    /// Drop everything tied to the previous session. Stock knowledge is
    /// catalog data and survives.
    pub(crate) fn reset(&mut self, epoch: u64) {
        self.epoch = epoch;
        self.phase = CartPhase::Empty;
        self.lines.clear();
    }

    pub(crate) fn view(&self) -> CartView {
        CartView {
            lines: self.lines.clone(),
            phase: self.phase,
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            lines: self.lines.clone(),
            phase: self.phase,
        }
    }

    pub(crate) fn restore(&mut self, snapshot: Snapshot, ticket: u64) {
        self.lines = snapshot.lines;
        self.phase = snapshot.phase;
        self.applied = ticket;
    }

    /// Whether a server response for `ticket` must be dropped: it predates
    /// the last applied write, or an optimistic change is still pending.
    pub(crate) const fn is_stale(&self, ticket: u64) -> bool {
        matches!(self.phase, CartPhase::Mutating) || ticket < self.applied
    }

    /// Replace the lines with the server's view.
    pub(crate) fn replace(&mut self, items: Vec<CartItem>, ticket: u64) {
        for item in &items {
            self.stock.insert(item.product_id, item.product.stock);
        }
        self.lines = items.into_iter().map(CartLine::from).collect();
        self.applied = ticket;
        self.phase = CartPhase::Ready;
    }

    pub(crate) fn mark_loading(&mut self) {
        if self.phase == CartPhase::Empty {
            self.phase = CartPhase::Loading;
        }
    }

    /// Undo `mark_loading` after a failed fetch.
    pub(crate) fn abandon_loading(&mut self) {
        if self.phase == CartPhase::Loading {
            self.phase = CartPhase::Empty;
        }
    }

    pub(crate) fn begin_mutation(&mut self, ticket: u64) {
        self.phase = CartPhase::Mutating;
        self.applied = ticket;
    }

    /// End a confirmed change. Fetches started while it was pending carry
    /// older tickets and are dropped.
    pub(crate) fn finish_mutation(&mut self, ticket: u64) {
        self.phase = CartPhase::Ready;
        self.applied = ticket;
    }

    pub(crate) fn set_quantity(&mut self, id: CartItemId, quantity: u32) {
        if let Some(line) = self.lines.iter_mut().find(|line| line.id == id) {
            line.set_quantity(quantity);
        }
    }

    pub(crate) fn remove(&mut self, id: CartItemId) {
        self.lines.retain(|line| line.id != id);
    }

    pub(crate) fn clear_lines(&mut self) {
        self.lines.clear();
    }

    /// Units of `product_id` already in the cart.
    pub(crate) fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.lines
            .iter()
            .filter(|line| line.product_id == product_id)
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    pub(crate) fn known_stock(&self, product_id: ProductId) -> Option<u32> {
        self.stock.get(&product_id).copied()
    }

    pub(crate) fn observe(&mut self, product: &Product) {
        self.stock.insert(product.id, product.stock);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::CategoryId;

    use super::*;

    fn item(id: u64, product_id: u64, quantity: u32, cents: i64) -> CartItem {
        let price = Money::from_cents(cents);
        CartItem {
            id: CartItemId::new(id),
            product_id: ProductId::new(product_id),
            quantity,
            subtotal: price.times(quantity),
            product: Product {
                id: ProductId::new(product_id),
                name: format!("Product {product_id}"),
                description: String::new(),
                price,
                stock: 10,
                image: Some(String::new()),
                category_id: CategoryId::new(1),
                category: None,
                created_at: None,
            },
        }
    }

    #[test]
    fn test_view_derives_totals_from_lines() {
        let mut state = CartState::new(1);
        state.replace(vec![item(1, 7, 2, 1000), item(2, 8, 1, 250)], 1);

        let view = state.view();
        assert_eq!(view.phase(), CartPhase::Ready);
        assert_eq!(view.item_count(), 3);
        assert_eq!(view.total(), Money::from_cents(2250));
        assert_eq!(view.line(CartItemId::new(1)).unwrap().image, None);
    }

    #[test]
    fn test_set_quantity_recomputes_subtotal() {
        let mut state = CartState::new(1);
        state.replace(vec![item(1, 7, 2, 1000)], 1);

        state.set_quantity(CartItemId::new(1), 3);

        let view = state.view();
        let line = view.line(CartItemId::new(1)).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.subtotal, Money::from_cents(3000));
        assert_eq!(view.total(), Money::from_cents(3000));
    }

    #[test]
    fn test_restore_is_verbatim() {
        let mut state = CartState::new(1);
        state.replace(vec![item(1, 7, 2, 1000), item(2, 8, 1, 250)], 1);
        let before = state.view();

        let snapshot = state.snapshot();
        state.begin_mutation(2);
        state.remove(CartItemId::new(2));
        state.set_quantity(CartItemId::new(1), 5);
        state.restore(snapshot, 3);

        assert_eq!(state.view(), before);
    }

    #[test]
    fn test_stale_tickets() {
        let mut state = CartState::new(1);
        state.begin_mutation(5);
        assert!(state.is_stale(4));
        // Nothing lands over a pending change.
        assert!(state.is_stale(6));

        state.finish_mutation(7);
        assert!(state.is_stale(6));
        assert!(!state.is_stale(8));
    }

    #[test]
    fn test_reset_keeps_stock_knowledge() {
        let mut state = CartState::new(1);
        state.replace(vec![item(1, 7, 2, 1000)], 1);

        state.reset(2);

        assert_eq!(state.epoch(), 2);
        assert_eq!(state.phase(), CartPhase::Empty);
        assert!(state.view().is_empty());
        assert_eq!(state.quantity_of(ProductId::new(7)), 0);
        assert_eq!(state.known_stock(ProductId::new(7)), Some(10));
    }
}
