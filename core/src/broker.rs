//! Publisher abstraction for the order queue.
//!
//! This module provides the [`OrderPublisher`] trait implemented by the
//! broker crate for production and by the testing crate for in-memory tests.
//! The publisher wraps a single long-lived broker connection; per-publish
//! resources are scoped to each call and never shared across concurrent
//! publishes.
//!
//! # Delivery Semantics
//!
//! Published messages are persistent and the queue is durable, so accepted
//! orders survive a broker restart. Delivery downstream is at-least-once;
//! consumers must be idempotent.
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it can be used as a trait object (`Arc<dyn OrderPublisher>`)
//! injected into the ingestion service at composition time.

use crate::order::Order;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while publishing an order.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    /// The shared broker connection is not open.
    #[error("Not connected to broker at {0}")]
    NotConnected(String),

    /// Declaring the durable queue failed.
    #[error("Queue declaration failed for '{queue}': {reason}")]
    Declare {
        /// The queue that could not be declared
        queue: String,
        /// The underlying cause
        reason: String,
    },

    /// The order could not be serialized to the wire format.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The broker rejected or never acknowledged the publish.
    #[error("Publish failed for queue '{queue}': {reason}")]
    Transport {
        /// The queue the publish targeted
        queue: String,
        /// The underlying cause
        reason: String,
    },
}

/// Snapshot of the publisher's connection state.
///
/// Mutated only by the publisher as connection state changes; callers receive
/// a read-only copy. `connected` reflects the shared connection handle, not
/// the outcome of any individual publish.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Whether the shared broker connection is open
    pub connected: bool,
    /// Broker address the publisher was configured with
    pub broker: String,
    /// Last instant a connection (or publish) succeeded
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Most recent connection or publish failure, for inspection
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    /// Status for a publisher that has not yet connected.
    #[must_use]
    pub const fn disconnected(broker: String) -> Self {
        Self {
            connected: false,
            broker,
            last_connected_at: None,
            last_error: None,
        }
    }
}

/// Trait for order publishers.
///
/// Implementations must be `Send + Sync`; the ingestion service shares one
/// publisher across arbitrarily many concurrent request handlers.
pub trait OrderPublisher: Send + Sync {
    /// Publish a validated order to the durable queue.
    ///
    /// The order must already have passed validation — the publisher does not
    /// re-validate. Implementations do not retry internally; the caller
    /// decides how to handle a failure.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] when the connection is down, the queue
    /// cannot be declared, or the transport fails. The original cause is
    /// preserved in the error and recorded on the connection status.
    fn publish(
        &self,
        order: &Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>>;

    /// Whether the shared broker connection is currently open.
    ///
    /// Reflects only the connection handle's state, never the outcome of a
    /// single publish.
    fn is_connected(&self) -> bool;

    /// Read-only snapshot of the connection state.
    fn connection_status(&self) -> ConnectionStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_status_has_no_history() {
        let status = ConnectionStatus::disconnected("localhost:9092".to_string());
        assert!(!status.connected);
        assert!(status.last_connected_at.is_none());
        assert!(status.last_error.is_none());
        assert_eq!(status.broker, "localhost:9092");
    }

    #[test]
    fn publish_error_display_carries_cause() {
        let err = PublishError::Transport {
            queue: "order_placed".to_string(),
            reason: "broker unreachable".to_string(),
        };
        assert!(err.to_string().contains("order_placed"));
        assert!(err.to_string().contains("broker unreachable"));
    }
}
