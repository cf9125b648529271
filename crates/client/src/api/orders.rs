//! Checkout and order history, including the admin order endpoints.

use reqwest::Method;
use serde::Deserialize;
use tracing::instrument;

use shopfront_core::{OrderId, OrderStatus};

use super::{Access, ApiClient, ApiError};
use crate::types::{
    CreateOrderRequest, Order, Page, PagedEnvelope, UpdateOrderStatusRequest,
};

#[derive(Deserialize)]
struct OrderEnvelope {
    order: Order,
}

fn page_pairs(page: u32, limit: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.max(1).to_string()), ("limit", limit.to_string())]
}

impl ApiClient {
    /// Place an order for the current cart contents. The backend empties the
    /// cart on success.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart is empty, stock is insufficient, or the
    /// request fails.
    #[instrument(skip(self, request))]
    pub async fn checkout(&self, request: &CreateOrderRequest) -> Result<Order, ApiError> {
        let envelope: OrderEnvelope = self
            .send_json(Method::POST, "/orders", Access::Authenticated, request)
            .await?;
        tracing::info!(
            order_id = %envelope.order.id,
            total = %envelope.order.total_amount,
            "Order placed"
        );
        Ok(envelope.order)
    }

    /// List the signed-in user's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, page: u32, limit: u32) -> Result<Page<Order>, ApiError> {
        let envelope: PagedEnvelope<Order> = self
            .get("/orders", Access::Authenticated, &page_pairs(page, limit))
            .await?;
        Ok(envelope.into())
    }

    /// Get one of the signed-in user's orders.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not exist or belongs to
    /// someone else, or another error if the request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order, ApiError> {
        let envelope: OrderEnvelope = self
            .get(&format!("/orders/{id}"), Access::Authenticated, &[])
            .await?;
        Ok(envelope.order)
    }

    // =========================================================================
    // Admin Order Methods
    // =========================================================================

    /// List every customer's orders, optionally filtered by status (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin or the request fails.
    #[instrument(skip(self))]
    pub async fn list_all_orders(
        &self,
        page: u32,
        limit: u32,
        status: Option<OrderStatus>,
    ) -> Result<Page<Order>, ApiError> {
        let mut pairs = page_pairs(page, limit);
        if let Some(status) = status {
            pairs.push(("status", status.as_str().to_string()));
        }
        let envelope: PagedEnvelope<Order> = self
            .get("/orders/all", Access::Authenticated, &pairs)
            .await?;
        Ok(envelope.into())
    }

    /// Move an order to a new status (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin, the order does not
    /// exist, or the request fails.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, ApiError> {
        let envelope: OrderEnvelope = self
            .send_json(
                Method::PUT,
                &format!("/orders/{id}/status"),
                Access::Authenticated,
                &UpdateOrderStatusRequest { status },
            )
            .await?;
        Ok(envelope.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_pairs_clamp_to_first_page() {
        assert_eq!(
            page_pairs(0, 20),
            vec![("page", "1".to_string()), ("limit", "20".to_string())]
        );
    }
}
