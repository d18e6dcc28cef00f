//! # Orderflow Testing
//!
//! Testing utilities and in-memory doubles for the Orderflow pipeline.
//!
//! This crate provides:
//! - [`FixedClock`]: deterministic time for validation and persistence tests
//! - [`InMemoryBroker`]: an `OrderPublisher` that records published orders
//!   and can simulate a lost broker connection
//! - [`InMemoryOrderStore`]: an `OrderRepository` with the same upsert and
//!   pagination semantics as the Postgres store
//! - [`InMemoryDeadLetters`]: a `DeadLetterSink` that captures entries
//!
//! ## Example
//!
//! ```
//! use orderflow_testing::InMemoryBroker;
//! use orderflow_core::broker::OrderPublisher;
//! use orderflow_core::order::{Order, OrderId, ProductId};
//!
//! # async fn example() {
//! let broker = InMemoryBroker::new();
//! let order = Order::new(
//!     OrderId::new("ORD-001".to_string()),
//!     ProductId::new("PROD-123".to_string()),
//!     5,
//! );
//! broker.publish(&order).await.unwrap();
//! assert_eq!(broker.published().len(), 1);
//! # }
//! ```

use chrono::{DateTime, Utc};
use orderflow_core::environment::Clock;

/// Mock implementations of the pipeline's environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use orderflow_core::broker::{ConnectionStatus, OrderPublisher, PublishError};
    use orderflow_core::order::Order;
    use orderflow_core::repository::{
        DeadLetterSink, OrderAggregates, OrderDocument, OrderRepository, ProcessingStatus,
        RECENT_ORDERS_LIMIT, StoreError,
    };
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use orderflow_testing::mocks::FixedClock;
    /// use orderflow_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// In-memory order publisher.
    ///
    /// Records every published order and can be toggled disconnected to
    /// exercise the broker-unavailable paths.
    #[derive(Default)]
    pub struct InMemoryBroker {
        published: Mutex<Vec<Order>>,
        disconnected: AtomicBool,
    }

    impl InMemoryBroker {
        /// Create a connected broker double.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Simulate losing (or regaining) the broker connection.
        pub fn set_disconnected(&self, disconnected: bool) {
            self.disconnected.store(disconnected, Ordering::SeqCst);
        }

        /// Orders published so far.
        #[must_use]
        pub fn published(&self) -> Vec<Order> {
            lock(&self.published).clone()
        }
    }

    impl OrderPublisher for InMemoryBroker {
        fn publish(
            &self,
            order: &Order,
        ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
            let order = order.clone();
            Box::pin(async move {
                if self.disconnected.load(Ordering::SeqCst) {
                    return Err(PublishError::NotConnected("in-memory".to_string()));
                }
                lock(&self.published).push(order);
                Ok(())
            })
        }

        fn is_connected(&self) -> bool {
            !self.disconnected.load(Ordering::SeqCst)
        }

        fn connection_status(&self) -> ConnectionStatus {
            let mut status = ConnectionStatus::disconnected("in-memory".to_string());
            if self.is_connected() {
                status.connected = true;
                status.last_connected_at = Some(Utc::now());
            } else {
                status.last_error = Some("disconnected".to_string());
            }
            status
        }
    }

    /// In-memory order store with the same observable semantics as the
    /// Postgres store: upsert keyed on the order id, newest-first pagination,
    /// aggregate stats.
    #[derive(Default)]
    pub struct InMemoryOrderStore {
        documents: Mutex<Vec<OrderDocument>>,
        failing: AtomicBool,
    }

    impl InMemoryOrderStore {
        /// Create an empty store double.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every operation fail with a database error (or recover).
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Database("simulated outage".to_string()));
            }
            Ok(())
        }

        fn sorted_newest_first(&self) -> Vec<OrderDocument> {
            let mut documents = lock(&self.documents).clone();
            documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            documents
        }
    }

    impl OrderRepository for InMemoryOrderStore {
        fn save(
            &self,
            order: &Order,
            processed_at: DateTime<Utc>,
        ) -> Pin<Box<dyn Future<Output = Result<OrderDocument, StoreError>> + Send + '_>> {
            let order = order.clone();
            Box::pin(async move {
                self.check()?;

                #[allow(clippy::cast_possible_wrap)] // quantity is validated <= 1000
                let document = OrderDocument {
                    order_id: order.order_id.to_string(),
                    product_id: order.product_id.to_string(),
                    quantity: order.quantity as i32,
                    created_at: order.created_at,
                    processed_at,
                    status: ProcessingStatus::Processed,
                };

                let mut documents = lock(&self.documents);
                if let Some(existing) = documents
                    .iter_mut()
                    .find(|d| d.order_id == document.order_id)
                {
                    *existing = document.clone();
                } else {
                    documents.push(document.clone());
                }
                Ok(document)
            })
        }

        fn list(
            &self,
            page: u32,
            limit: u32,
        ) -> Pin<
            Box<dyn Future<Output = Result<(Vec<OrderDocument>, u64), StoreError>> + Send + '_>,
        > {
            Box::pin(async move {
                self.check()?;
                let documents = self.sorted_newest_first();
                let total = documents.len() as u64;
                let offset = (page.max(1) - 1) as usize * limit as usize;
                let page = documents
                    .into_iter()
                    .skip(offset)
                    .take(limit as usize)
                    .collect();
                Ok((page, total))
            })
        }

        fn get(
            &self,
            order_id: &str,
        ) -> Pin<Box<dyn Future<Output = Result<Option<OrderDocument>, StoreError>> + Send + '_>>
        {
            let order_id = order_id.to_string();
            Box::pin(async move {
                self.check()?;
                Ok(lock(&self.documents)
                    .iter()
                    .find(|d| d.order_id == order_id)
                    .cloned())
            })
        }

        fn delete(
            &self,
            order_id: &str,
        ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
            let order_id = order_id.to_string();
            Box::pin(async move {
                self.check()?;
                let mut documents = lock(&self.documents);
                let before = documents.len();
                documents.retain(|d| d.order_id != order_id);
                Ok(documents.len() < before)
            })
        }

        fn stats(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<OrderAggregates, StoreError>> + Send + '_>>
        {
            Box::pin(async move {
                self.check()?;
                let documents = self.sorted_newest_first();
                let total_orders = documents.len() as u64;
                let total_quantity = documents.iter().map(|d| d.quantity as u64).sum();
                #[allow(clippy::cast_sign_loss)] // limit constant is positive
                let recent_orders = documents
                    .into_iter()
                    .take(RECENT_ORDERS_LIMIT as usize)
                    .collect();
                Ok(OrderAggregates {
                    total_orders,
                    total_quantity,
                    recent_orders,
                })
            })
        }

        fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            Box::pin(async move { self.check() })
        }
    }

    /// A captured dead-letter entry.
    #[derive(Debug, Clone)]
    pub struct CapturedDeadLetter {
        /// Order id if known
        pub order_id: Option<String>,
        /// Raw payload as delivered
        pub payload: Vec<u8>,
        /// Final error message
        pub error: String,
        /// Delivery attempts before giving up
        pub attempts: i32,
    }

    /// In-memory dead-letter sink that captures entries for assertions.
    #[derive(Default)]
    pub struct InMemoryDeadLetters {
        entries: Mutex<Vec<CapturedDeadLetter>>,
    }

    impl InMemoryDeadLetters {
        /// Create an empty sink.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Entries recorded so far.
        #[must_use]
        pub fn entries(&self) -> Vec<CapturedDeadLetter> {
            lock(&self.entries).clone()
        }
    }

    impl DeadLetterSink for InMemoryDeadLetters {
        fn record(
            &self,
            order_id: Option<&str>,
            payload: &[u8],
            error: &str,
            attempts: i32,
        ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            let entry = CapturedDeadLetter {
                order_id: order_id.map(ToString::to_string),
                payload: payload.to_vec(),
                error: error.to_string(),
                attempts,
            };
            Box::pin(async move {
                lock(&self.entries).push(entry);
                Ok(())
            })
        }
    }
}

// Re-export commonly used items
pub use mocks::{
    CapturedDeadLetter, FixedClock, InMemoryBroker, InMemoryDeadLetters, InMemoryOrderStore,
    test_clock,
};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use orderflow_core::broker::OrderPublisher;
    use orderflow_core::order::{Order, OrderId, ProductId};
    use orderflow_core::repository::{DeadLetterSink, OrderRepository};

    fn order(id: &str, quantity: u32) -> Order {
        Order::new(
            OrderId::new(id.to_string()),
            ProductId::new("PROD-123".to_string()),
            quantity,
        )
    }

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[tokio::test]
    async fn broker_records_published_orders() {
        let broker = InMemoryBroker::new();
        broker.publish(&order("ORD-001", 5)).await.unwrap();
        assert!(broker.is_connected());
        assert_eq!(broker.published().len(), 1);
    }

    #[tokio::test]
    async fn disconnected_broker_rejects_publishes() {
        let broker = InMemoryBroker::new();
        broker.set_disconnected(true);
        assert!(!broker.is_connected());
        assert!(broker.publish(&order("ORD-001", 5)).await.is_err());
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn store_upserts_by_order_id() {
        let store = InMemoryOrderStore::new();
        let now = test_clock().now();
        store.save(&order("ORD-001", 5), now).await.unwrap();
        store.save(&order("ORD-001", 9), now).await.unwrap();

        let (documents, total) = store.list(1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(documents[0].quantity, 9);
    }

    #[tokio::test]
    async fn store_lists_newest_first() {
        let store = InMemoryOrderStore::new();
        let base = test_clock().now();
        for i in 0..3 {
            let o = Order::with_created_at(
                OrderId::new(format!("ORD-00{i}")),
                ProductId::new("PROD-123".to_string()),
                1,
                base + Duration::seconds(i),
            );
            store.save(&o, base).await.unwrap();
        }

        let (documents, _) = store.list(1, 2).await.unwrap();
        assert_eq!(documents[0].order_id, "ORD-002");
        assert_eq!(documents[1].order_id, "ORD-001");
    }

    #[tokio::test]
    async fn failing_store_surfaces_database_errors() {
        let store = InMemoryOrderStore::new();
        store.set_failing(true);
        assert!(store.ping().await.is_err());
        assert!(store.list(1, 10).await.is_err());
    }

    #[tokio::test]
    async fn dead_letter_sink_captures_entries() {
        let sink = InMemoryDeadLetters::new();
        sink.record(Some("ORD-001"), b"payload", "boom", 5)
            .await
            .unwrap();
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].order_id.as_deref(), Some("ORD-001"));
        assert_eq!(entries[0].attempts, 5);
    }
}
