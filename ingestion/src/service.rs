//! Order service: validate, publish, count.

use crate::stats::{IngestionStats, StatsSnapshot};
use orderflow_core::broker::{ConnectionStatus, OrderPublisher};
use orderflow_core::environment::Clock;
use orderflow_core::order::{Order, OrderResponse};
use orderflow_core::validation::OrderValidator;
use std::sync::Arc;

/// Outcome of an order submission.
///
/// Every path carries the response body to send; the variant tells the
/// handler which status code it maps to. The service never raises — publish
/// failures are logged with their cause and collapsed to [`Self::Failed`]
/// with a generic message, so broker internals never leak to clients.
#[derive(Debug)]
pub enum CreateOrderOutcome {
    /// Validated and published (HTTP 202).
    Accepted(OrderResponse),
    /// Failed validation; nothing was published (HTTP 400).
    Invalid(OrderResponse),
    /// The broker connection is down; publish was not attempted (HTTP 503).
    BrokerUnavailable(OrderResponse),
    /// The publish itself failed (HTTP 500).
    Failed(OrderResponse),
}

impl CreateOrderOutcome {
    /// The response body for this outcome.
    #[must_use]
    pub const fn response(&self) -> &OrderResponse {
        match self {
            Self::Accepted(r) | Self::Invalid(r) | Self::BrokerUnavailable(r) | Self::Failed(r) => {
                r
            },
        }
    }
}

/// The ingestion service: validation in front of the queue publisher.
///
/// Handlers share one instance behind an `Arc`; the only mutable state is
/// the atomic accepted counter inside [`IngestionStats`].
pub struct OrderService {
    publisher: Arc<dyn OrderPublisher>,
    stats: Arc<IngestionStats>,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    /// Create a service over the given publisher, counters, and clock.
    #[must_use]
    pub fn new(
        publisher: Arc<dyn OrderPublisher>,
        stats: Arc<IngestionStats>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            publisher,
            stats,
            clock,
        }
    }

    /// Validate and publish an order.
    ///
    /// Invalid orders are never published and never counted. The broker
    /// connectivity check runs before the publish attempt so a known-down
    /// broker answers immediately instead of timing out.
    pub async fn create_order(&self, order: Order) -> CreateOrderOutcome {
        let result = OrderValidator::validate(&order, self.clock.now());
        if !result.is_valid {
            tracing::warn!(
                order_id = %order.order_id,
                errors = ?result.errors,
                "Order rejected by validation"
            );
            return CreateOrderOutcome::Invalid(OrderResponse::rejected(result.joined_message()));
        }

        if !self.publisher.is_connected() {
            tracing::warn!(order_id = %order.order_id, "Order broker unavailable");
            return CreateOrderOutcome::BrokerUnavailable(OrderResponse::rejected(
                "Order broker unavailable",
            ));
        }

        match self.publisher.publish(&order).await {
            Ok(()) => {
                self.stats.record_accepted();
                metrics::counter!("orders.accepted").increment(1);
                tracing::info!(
                    order_id = %order.order_id,
                    product_id = %order.product_id,
                    quantity = order.quantity,
                    "Order accepted"
                );
                CreateOrderOutcome::Accepted(OrderResponse::accepted(order))
            },
            Err(e) => {
                tracing::error!(order_id = %order.order_id, error = %e, "Order publish failed");
                CreateOrderOutcome::Failed(OrderResponse::rejected(
                    "Internal error while accepting the order",
                ))
            },
        }
    }

    /// Snapshot of the acceptance counters.
    #[must_use]
    pub fn statistics(&self) -> StatsSnapshot {
        self.stats.snapshot(self.clock.now())
    }

    /// Whether the broker connection is currently up.
    #[must_use]
    pub fn broker_connected(&self) -> bool {
        self.publisher.is_connected()
    }

    /// Detailed broker connection status.
    #[must_use]
    pub fn broker_status(&self) -> ConnectionStatus {
        self.publisher.connection_status()
    }
}
