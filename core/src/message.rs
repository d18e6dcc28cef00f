//! Wire contract for the order queue.
//!
//! The message body is the camelCase JSON encoding of an [`Order`]; headers
//! carry the order id, product id, and creation timestamp so brokers and
//! tooling can inspect messages without deserializing the body. Delivery is
//! persistent (the queue is durable and messages survive a broker restart),
//! and consumers see at-least-once semantics, so the downstream save path
//! must tolerate duplicates.

use crate::order::Order;
use thiserror::Error;

/// Default queue (topic) name for published orders.
pub const DEFAULT_QUEUE: &str = "order_placed";

/// Header carrying a unique id for the message itself.
pub const MESSAGE_ID_HEADER: &str = "message-id";

/// Header naming the producing application.
pub const ORIGIN_HEADER: &str = "origin";

/// Header carrying the order id for inspection without deserialization.
pub const ORDER_ID_HEADER: &str = "order-id";

/// Header carrying the product id.
pub const PRODUCT_ID_HEADER: &str = "product-id";

/// Header carrying the order creation timestamp (RFC 3339).
pub const CREATED_AT_HEADER: &str = "created-at";

/// Header counting delivery attempts for the bounded-retry policy.
pub const RETRY_COUNT_HEADER: &str = "retry-count";

/// Errors from encoding or decoding queue messages.
#[derive(Error, Debug)]
pub enum MessageError {
    /// Failed to serialize an order to the wire format.
    #[error("Failed to encode order: {0}")]
    Encode(String),

    /// Failed to deserialize an order from the wire format.
    #[error("Failed to decode order: {0}")]
    Decode(String),
}

/// Encode an order to its JSON wire form.
///
/// # Errors
///
/// Returns [`MessageError::Encode`] if serialization fails.
pub fn encode_order(order: &Order) -> Result<Vec<u8>, MessageError> {
    serde_json::to_vec(order).map_err(|e| MessageError::Encode(e.to_string()))
}

/// Decode an order from its JSON wire form.
///
/// # Errors
///
/// Returns [`MessageError::Decode`] if the payload is not a valid order.
pub fn decode_order(payload: &[u8]) -> Result<Order, MessageError> {
    serde_json::from_slice(payload).map_err(|e| MessageError::Decode(e.to_string()))
}
