//! Cart endpoints.

use reqwest::Method;
use serde::de::IgnoredAny;
use tracing::instrument;

use shopfront_core::CartItemId;

use super::{Access, ApiClient, ApiError};
use crate::cart::CartBackend;
use crate::types::{
    AddToCartRequest, CartItem, CartItemEnvelope, CartResponse, UpdateCartItemRequest,
};

impl CartBackend for ApiClient {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<CartResponse, ApiError> {
        self.get("/cart", Access::Authenticated, &[]).await
    }

    #[instrument(skip(self), fields(product_id = %request.product_id, quantity = request.quantity))]
    async fn add_item(&self, request: AddToCartRequest) -> Result<CartItem, ApiError> {
        let envelope: CartItemEnvelope = self
            .send_json(Method::POST, "/cart/add", Access::Authenticated, &request)
            .await?;
        Ok(envelope.cart_item)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn update_item(&self, item_id: CartItemId, quantity: u32) -> Result<(), ApiError> {
        // The updated line is re-read by the follow-up refresh.
        let _: IgnoredAny = self
            .send_json(
                Method::PUT,
                &format!("/cart/item/{item_id}"),
                Access::Authenticated,
                &UpdateCartItemRequest { quantity },
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn remove_item(&self, item_id: CartItemId) -> Result<(), ApiError> {
        self.send_unit(
            Method::DELETE,
            &format!("/cart/item/{item_id}"),
            Access::Authenticated,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), ApiError> {
        self.send_unit(Method::DELETE, "/cart/clear", Access::Authenticated)
            .await
    }
}
