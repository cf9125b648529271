//! Cart synchronizer over HTTP against the mock backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};

use shopfront_client::{ApiClient, CartError, CartPhase, CartSynchronizer, Credentials};
use shopfront_core::{Money, ProductId};
use shopfront_integration_tests::{
    DRIED_PINEAPPLE, MUG, MockServer, SHOPPER_EMAIL, SHOPPER_PASSWORD, SOLD_OUT,
};

async fn signed_in_cart(server: &MockServer) -> Arc<CartSynchronizer<ApiClient>> {
    let cart = server.cart();
    let api = cart.backend();
    let credentials = Credentials::new(SHOPPER_EMAIL, SHOPPER_PASSWORD).unwrap();
    api.session().establish(api, &credentials).await.unwrap();
    cart
}

#[tokio::test]
async fn test_refresh_reads_empty_cart() {
    let server = MockServer::start().await;
    let cart = signed_in_cart(&server).await;

    let view = cart.refresh().await.unwrap();

    assert!(view.is_empty());
    assert_eq!(view.item_count(), 0);
    assert_eq!(view.total(), Money::ZERO);
    assert_eq!(view.phase(), CartPhase::Ready);
}

#[tokio::test]
async fn test_refresh_requires_session() {
    let server = MockServer::start().await;
    let cart = server.cart();

    assert_eq!(cart.refresh().await.unwrap_err(), CartError::Unauthenticated);
    assert_eq!(server.backend.hits(&Method::GET, "/cart"), 0);
}

#[tokio::test]
async fn test_add_then_update_keeps_totals_consistent() {
    let server = MockServer::start().await;
    let cart = signed_in_cart(&server).await;

    let view = cart.add_item(ProductId::new(MUG), 2).await.unwrap();
    assert_eq!(view.item_count(), 2);
    assert_eq!(view.total(), Money::from_cents(2000));

    let view = cart.add_item(ProductId::new(DRIED_PINEAPPLE), 2).await.unwrap();
    assert_eq!(view.lines().len(), 2);
    assert_eq!(view.item_count(), 4);
    assert_eq!(view.total(), Money::from_cents(2650));

    let mug = view.line_for_product(ProductId::new(MUG)).unwrap().id;
    let view = cart.set_quantity(mug, 3).await.unwrap();
    assert_eq!(view.line(mug).unwrap().subtotal, Money::from_cents(3000));
    assert_eq!(view.total(), Money::from_cents(3650));
    assert_eq!(
        server.backend.cart_of(SHOPPER_EMAIL),
        vec![(MUG, 3), (DRIED_PINEAPPLE, 2)]
    );
}

#[tokio::test]
async fn test_adding_same_product_merges_lines() {
    let server = MockServer::start().await;
    let cart = signed_in_cart(&server).await;

    cart.add_item(ProductId::new(MUG), 1).await.unwrap();
    let view = cart.add_item(ProductId::new(MUG), 2).await.unwrap();

    assert_eq!(view.lines().len(), 1);
    assert_eq!(view.item_count(), 3);
}

#[tokio::test]
async fn test_add_sold_out_product_sends_nothing() {
    let server = MockServer::start().await;
    let cart = signed_in_cart(&server).await;

    let product = cart
        .backend()
        .get_product(ProductId::new(SOLD_OUT))
        .await
        .unwrap();
    cart.observe_product(&product);

    let err = cart.add_item(ProductId::new(SOLD_OUT), 1).await.unwrap_err();

    assert!(matches!(err, CartError::InvalidQuantity { available: Some(0), .. }));
    assert_eq!(server.backend.hits(&Method::POST, "/cart/add"), 0);
}

#[tokio::test]
async fn test_add_rejected_by_server_reports_reason() {
    let server = MockServer::start().await;
    let cart = signed_in_cart(&server).await;

    // Stock unknown locally, so the server is the one to refuse.
    let err = cart.add_item(ProductId::new(MUG), 11).await.unwrap_err();

    assert_eq!(err, CartError::ServerRejected("Insufficient stock".to_string()));
    assert!(cart.view().is_empty());
}

#[tokio::test]
async fn test_add_rejected_without_reason_is_add_failed() {
    let server = MockServer::start().await;
    let cart = signed_in_cart(&server).await;

    server
        .backend
        .fail_next(Method::POST, "/cart/add", StatusCode::BAD_REQUEST, None);
    let err = cart.add_item(ProductId::new(MUG), 1).await.unwrap_err();

    assert_eq!(err, CartError::AddFailed);
}

#[tokio::test]
async fn test_rejected_quantity_change_rolls_back() {
    let server = MockServer::start().await;
    server.backend.seed_cart(SHOPPER_EMAIL, MUG, 2);
    let cart = signed_in_cart(&server).await;

    let before = cart.refresh().await.unwrap();
    let item = before.lines().first().unwrap().id;

    // More than the 10 in stock; the server refuses.
    let err = cart.set_quantity(item, 50).await.unwrap_err();

    assert_eq!(err, CartError::ServerRejected("Insufficient stock".to_string()));
    assert_eq!(cart.view().lines(), before.lines());
    assert_eq!(cart.view().total(), Money::from_cents(2000));
    assert_eq!(cart.phase(), CartPhase::Ready);
}

#[tokio::test]
async fn test_quantity_change_is_visible_before_server_answers() {
    let server = MockServer::start().await;
    server.backend.seed_cart(SHOPPER_EMAIL, MUG, 2);
    let cart = signed_in_cart(&server).await;

    let item = cart.refresh().await.unwrap().lines().first().unwrap().id;
    let path = format!("/cart/item/{item}");
    server
        .backend
        .delay_next(Method::PUT, &path, Duration::from_millis(300));

    let pending = tokio::spawn({
        let cart = Arc::clone(&cart);
        async move { cart.set_quantity(item, 3).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let optimistic = cart.view();
    assert_eq!(optimistic.phase(), CartPhase::Mutating);
    assert_eq!(optimistic.line(item).unwrap().quantity, 3);
    assert_eq!(optimistic.line(item).unwrap().subtotal, Money::from_cents(3000));

    let view = pending.await.unwrap().unwrap();
    assert_eq!(view.line(item).unwrap().quantity, 3);
    assert_eq!(view.phase(), CartPhase::Ready);
    assert_eq!(server.backend.cart_of(SHOPPER_EMAIL), vec![(MUG, 3)]);
}

#[tokio::test]
async fn test_server_error_rolls_back_remove() {
    let server = MockServer::start().await;
    server.backend.seed_cart(SHOPPER_EMAIL, MUG, 2);
    server.backend.seed_cart(SHOPPER_EMAIL, DRIED_PINEAPPLE, 1);
    let cart = signed_in_cart(&server).await;

    let before = cart.refresh().await.unwrap();
    let item = before.lines().first().unwrap().id;
    server.backend.fail_next(
        Method::DELETE,
        &format!("/cart/item/{item}"),
        StatusCode::INTERNAL_SERVER_ERROR,
        Some("Failed to remove item from cart"),
    );

    let err = cart.remove_item(item).await.unwrap_err();

    assert_eq!(
        err,
        CartError::ServerRejected("Failed to remove item from cart".to_string())
    );
    assert_eq!(cart.view(), before);
    assert_eq!(server.backend.cart_of(SHOPPER_EMAIL).len(), 2);
}

#[tokio::test]
async fn test_remove_and_clear() {
    let server = MockServer::start().await;
    server.backend.seed_cart(SHOPPER_EMAIL, MUG, 2);
    server.backend.seed_cart(SHOPPER_EMAIL, DRIED_PINEAPPLE, 1);
    let cart = signed_in_cart(&server).await;

    let item = cart.refresh().await.unwrap().lines().first().unwrap().id;
    let view = cart.remove_item(item).await.unwrap();
    assert_eq!(view.lines().len(), 1);
    assert_eq!(view.item_count(), 1);

    cart.clear().await.unwrap();
    let view = cart.refresh().await.unwrap();
    assert!(view.is_empty());
    assert_eq!(view.item_count(), 0);
    assert!(server.backend.cart_of(SHOPPER_EMAIL).is_empty());
}

#[tokio::test]
async fn test_unauthorized_cart_call_clears_session_and_cart() {
    let server = MockServer::start().await;
    server.backend.seed_cart(SHOPPER_EMAIL, MUG, 2);
    let cart = signed_in_cart(&server).await;

    let item = cart.refresh().await.unwrap().lines().first().unwrap().id;
    server.backend.revoke_all_tokens();

    let err = cart.set_quantity(item, 1).await.unwrap_err();

    assert_eq!(err, CartError::StaleSession);
    assert!(!cart.session().is_authenticated());
    assert!(cart.view().is_empty());
    assert_eq!(cart.phase(), CartPhase::Empty);
}

#[tokio::test]
async fn test_sign_out_during_mutation_empties_cart() {
    let server = MockServer::start().await;
    server.backend.seed_cart(SHOPPER_EMAIL, MUG, 2);
    let cart = signed_in_cart(&server).await;

    let item = cart.refresh().await.unwrap().lines().first().unwrap().id;
    server.backend.delay_next(
        Method::PUT,
        &format!("/cart/item/{item}"),
        Duration::from_millis(300),
    );

    let pending = tokio::spawn({
        let cart = Arc::clone(&cart);
        async move { cart.set_quantity(item, 4).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    cart.session().clear();

    let result = pending.await.unwrap();

    assert_eq!(result.unwrap_err(), CartError::SessionChanged);
    assert!(cart.view().is_empty());
}

#[tokio::test]
async fn test_watch_session_loads_cart_on_sign_in() {
    let server = MockServer::start().await;
    server.backend.seed_cart(SHOPPER_EMAIL, MUG, 2);
    let cart = server.cart();
    let watcher = cart.watch_session();

    let api = cart.backend();
    let credentials = Credentials::new(SHOPPER_EMAIL, SHOPPER_PASSWORD).unwrap();
    api.session().establish(api, &credentials).await.unwrap();

    let mut loaded = false;
    for _ in 0..50 {
        if cart.view().item_count() == 2 {
            loaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(loaded, "cart was not loaded after sign-in");

    api.session().logout(api).await;
    assert!(cart.view().is_empty());
    watcher.abort();
}
