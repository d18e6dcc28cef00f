//! Core domain types for the order pipeline.
//!
//! An [`Order`] is immutable once constructed and is owned by whichever
//! component currently holds it: HTTP handler → service → publisher → queue
//! → consumer → store. There is no shared mutable ownership anywhere in the
//! pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an order (e.g. `ORD-001`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Creates a new `OrderId` from a string
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a product (e.g. `PROD-123`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new `ProductId` from a string
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An order flowing through the pipeline.
///
/// Immutable once constructed. The serde representation uses camelCase field
/// names, which is also the wire format on the queue (see [`crate::message`]).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order identifier
    pub order_id: OrderId,
    /// Product identifier
    pub product_id: ProductId,
    /// Quantity ordered (business rules bound this to 1..=1000)
    pub quantity: u32,
    /// When the order was created (UTC)
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order stamped with the current wall-clock time.
    #[must_use]
    pub fn new(order_id: OrderId, product_id: ProductId, quantity: u32) -> Self {
        Self {
            order_id,
            product_id,
            quantity,
            created_at: Utc::now(),
        }
    }

    /// Creates an order with an explicit creation timestamp.
    ///
    /// Used when reconstructing an order from a client-supplied or persisted
    /// timestamp instead of stamping "now".
    #[must_use]
    pub const fn with_created_at(
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            product_id,
            quantity,
            created_at,
        }
    }
}

/// Structured response for a single order-creation attempt.
///
/// The ingestion service always returns one of these; business-rule and
/// connectivity failures are reported here rather than raised.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    /// Whether the order was accepted and published
    pub success: bool,
    /// Human-readable outcome message
    pub message: String,
    /// The accepted order, echoed back on success
    pub data: Option<Order>,
    /// When this response was produced
    pub timestamp: DateTime<Utc>,
}

impl OrderResponse {
    /// Response for an accepted (validated and published) order.
    #[must_use]
    pub fn accepted(order: Order) -> Self {
        Self {
            success: true,
            message: "Order accepted".to_string(),
            data: Some(order),
            timestamp: Utc::now(),
        }
    }

    /// Response for a rejected order attempt.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order::new(
            OrderId::new("ORD-001".to_string()),
            ProductId::new("PROD-123".to_string()),
            5,
        )
    }

    #[test]
    fn order_new_stamps_creation_time() {
        let before = Utc::now();
        let order = sample_order();
        let after = Utc::now();
        assert!(order.created_at >= before && order.created_at <= after);
    }

    #[test]
    fn order_serializes_with_camel_case_fields() {
        let order = sample_order();
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("orderId").is_some());
        assert!(json.get("productId").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["quantity"], 5);
    }

    #[test]
    fn accepted_response_echoes_order() {
        let order = sample_order();
        let response = OrderResponse::accepted(order.clone());
        assert!(response.success);
        assert_eq!(response.data, Some(order));
    }

    #[test]
    fn rejected_response_carries_no_data() {
        let response = OrderResponse::rejected("Quantity must be at least 1");
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message, "Quantity must be at least 1");
    }
}
