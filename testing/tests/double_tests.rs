//! Tests exercising the in-memory doubles through the trait objects,
//! the same way the services consume them.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use orderflow_core::broker::{OrderPublisher, PublishError};
use orderflow_core::environment::Clock;
use orderflow_core::order::{Order, OrderId, ProductId};
use orderflow_core::repository::{DeadLetterSink, OrderRepository, StoreError};
use orderflow_testing::{InMemoryBroker, InMemoryDeadLetters, InMemoryOrderStore, test_clock};
use std::sync::Arc;

fn sample_order(id: &str) -> Order {
    Order::with_created_at(
        OrderId::new(id.to_string()),
        ProductId::new("PROD-123".to_string()),
        5,
        test_clock().now(),
    )
}

#[tokio::test]
async fn broker_double_works_behind_the_trait_object() {
    let broker = Arc::new(InMemoryBroker::new());
    let publisher: Arc<dyn OrderPublisher> = Arc::clone(&broker) as Arc<dyn OrderPublisher>;

    assert!(publisher.is_connected());
    publisher.publish(&sample_order("ORD-001")).await.unwrap();
    assert_eq!(broker.published().len(), 1);

    broker.set_disconnected(true);
    assert!(!publisher.is_connected());
    let err = publisher.publish(&sample_order("ORD-002")).await.unwrap_err();
    assert!(matches!(err, PublishError::NotConnected(_)));
    assert_eq!(broker.published().len(), 1);
}

#[tokio::test]
async fn store_double_works_behind_the_trait_object() {
    let store = Arc::new(InMemoryOrderStore::new());
    let repository: Arc<dyn OrderRepository> = Arc::clone(&store) as Arc<dyn OrderRepository>;
    let now = test_clock().now();

    repository.save(&sample_order("ORD-001"), now).await.unwrap();
    // At-least-once delivery: the second save must not duplicate.
    repository.save(&sample_order("ORD-001"), now).await.unwrap();

    let (orders, total) = repository.list(1, 10).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(orders[0].order_id, "ORD-001");

    store.set_failing(true);
    let err = repository.ping().await.unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));
}

#[tokio::test]
async fn dead_letter_double_captures_entries() {
    let dead_letters = Arc::new(InMemoryDeadLetters::new());
    let sink: Arc<dyn DeadLetterSink> = Arc::clone(&dead_letters) as Arc<dyn DeadLetterSink>;

    sink.record(Some("ORD-001"), b"{}", "handler failed", 5)
        .await
        .unwrap();
    sink.record(None, b"not json", "decode failed", 5)
        .await
        .unwrap();

    let entries = dead_letters.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].order_id.as_deref(), Some("ORD-001"));
    assert_eq!(entries[0].attempts, 5);
    assert!(entries[1].order_id.is_none());
}
