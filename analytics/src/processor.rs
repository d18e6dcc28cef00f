//! Order processor: the queue handler that persists consumed orders.

use orderflow_broker::{HandlerError, OrderHandler};
use orderflow_core::environment::Clock;
use orderflow_core::order::Order;
use orderflow_core::repository::{DeadLetterSink, OrderRepository};
use std::sync::Arc;

/// Persists consumed orders and records exhausted messages.
///
/// `process` is idempotent because the repository save is an upsert keyed on
/// the order id: a redelivered message (at-least-once semantics) overwrites
/// the existing document instead of duplicating it.
pub struct OrderProcessor {
    repository: Arc<dyn OrderRepository>,
    dead_letters: Arc<dyn DeadLetterSink>,
    clock: Arc<dyn Clock>,
}

impl OrderProcessor {
    /// Create a processor over the given repository and dead-letter sink.
    #[must_use]
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        dead_letters: Arc<dyn DeadLetterSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            dead_letters,
            clock,
        }
    }
}

impl OrderHandler for OrderProcessor {
    async fn process(&self, order: Order) -> Result<(), HandlerError> {
        let processed_at = self.clock.now();
        let document = self
            .repository
            .save(&order, processed_at)
            .await
            .map_err(|e| HandlerError::Storage(e.to_string()))?;

        tracing::info!(
            order_id = %document.order_id,
            product_id = %document.product_id,
            quantity = document.quantity,
            "Order persisted"
        );
        Ok(())
    }

    async fn dead_letter(
        &self,
        order_id: Option<&str>,
        payload: &[u8],
        error: &str,
        attempts: i32,
    ) -> Result<(), HandlerError> {
        self.dead_letters
            .record(order_id, payload, error, attempts)
            .await
            .map_err(|e| HandlerError::Storage(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use orderflow_core::order::{OrderId, ProductId};
    use orderflow_testing::{InMemoryDeadLetters, InMemoryOrderStore, test_clock};

    fn processor() -> (
        OrderProcessor,
        Arc<InMemoryOrderStore>,
        Arc<InMemoryDeadLetters>,
    ) {
        let store = Arc::new(InMemoryOrderStore::new());
        let dead_letters = Arc::new(InMemoryDeadLetters::new());
        let processor = OrderProcessor::new(
            Arc::clone(&store) as Arc<dyn OrderRepository>,
            Arc::clone(&dead_letters) as Arc<dyn DeadLetterSink>,
            Arc::new(test_clock()),
        );
        (processor, store, dead_letters)
    }

    fn order(id: &str, quantity: u32) -> Order {
        Order::new(
            OrderId::new(id.to_string()),
            ProductId::new("PROD-123".to_string()),
            quantity,
        )
    }

    #[tokio::test]
    async fn processing_persists_the_order() {
        let (processor, store, _) = processor();

        processor.process(order("ORD-001", 5)).await.unwrap();

        let document = store.get("ORD-001").await.unwrap().expect("persisted");
        assert_eq!(document.quantity, 5);
        assert_eq!(document.processed_at, test_clock().now());
    }

    #[tokio::test]
    async fn redelivery_is_idempotent() {
        let (processor, store, _) = processor();

        processor.process(order("ORD-001", 5)).await.unwrap();
        processor.process(order("ORD-001", 5)).await.unwrap();

        let (_, total) = store.list(1, 10).await.unwrap();
        assert_eq!(total, 1, "Processing twice must yield one document");
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_handler_error() {
        let (processor, store, _) = processor();
        store.set_failing(true);

        let result = processor.process(order("ORD-001", 5)).await;
        assert!(matches!(result, Err(HandlerError::Storage(_))));
    }

    #[tokio::test]
    async fn dead_letter_is_recorded() {
        let (processor, _, dead_letters) = processor();

        processor
            .dead_letter(Some("ORD-002"), b"payload", "decode failed", 5)
            .await
            .unwrap();

        let entries = dead_letters.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].order_id.as_deref(), Some("ORD-002"));
        assert_eq!(entries[0].attempts, 5);
    }
}
