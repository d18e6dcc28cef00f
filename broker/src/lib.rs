//! Kafka-backed queue implementation for the Orderflow pipeline.
//!
//! This crate provides [`KafkaOrderBus`], the production implementation of
//! the [`OrderPublisher`] trait from `orderflow-core`, and [`OrderConsumer`],
//! the subscription loop the analytics service runs.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐
//! │   Ingestion   │
//! │  (validate)   │
//! └───────┬───────┘
//!         │ publish (persistent, acks=all)
//!         ▼
//! ┌───────────────┐
//! │  order_placed │◄─── durable queue
//! └───────┬───────┘
//!         │ at-least-once
//!         ▼
//! ┌───────────────┐
//! │   Consumer    │──── ack only after persist
//! │  (analytics)  │──── bounded retry, then dead-letter
//! └───────────────┘
//! ```
//!
//! # Delivery Semantics
//!
//! **At-least-once** with manual offset commits:
//! - The consumer commits AFTER the processing outcome is known
//! - A crash between persist and commit causes redelivery
//! - The store's save path is an upsert, so redelivery is harmless
//!
//! # Example
//!
//! ```no_run
//! use orderflow_broker::KafkaOrderBus;
//! use orderflow_core::broker::OrderPublisher;
//! use orderflow_core::order::{Order, OrderId, ProductId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = KafkaOrderBus::builder()
//!     .brokers("localhost:9092")
//!     .queue("order_placed")
//!     .build()?;
//! bus.refresh_connection().await;
//!
//! let order = Order::new(
//!     OrderId::new("ORD-001".to_string()),
//!     ProductId::new("PROD-123".to_string()),
//!     5,
//! );
//! bus.publish(&order).await?;
//! # Ok(())
//! # }
//! ```

pub mod consumer;

pub use consumer::{ConsumerConfig, HandlerError, OrderConsumer, OrderHandler};

use chrono::Utc;
use orderflow_core::broker::{ConnectionStatus, OrderPublisher, PublishError};
use orderflow_core::message::{
    self, CREATED_AT_HEADER, MESSAGE_ID_HEADER, ORDER_ID_HEADER, ORIGIN_HEADER,
    PRODUCT_ID_HEADER, RETRY_COUNT_HEADER,
};
use orderflow_core::order::Order;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// Fixed delay before reconnect attempts (startup backoff and consumer
/// reconnects both use it).
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Origin tag stamped on every published message.
const ORIGIN_APP: &str = "orderflow-ingestion";

/// Kafka-backed order bus.
///
/// Wraps one long-lived producer handle shared across all concurrent
/// publishes; each publish builds its own record and headers (per-publish
/// scoped resources are never shared between calls). The target queue is a
/// durable topic and records are sent with `acks=all`, so accepted orders
/// survive a broker restart.
///
/// # Connection state
///
/// `is_connected` reflects a cached view of the shared client handle,
/// updated by [`KafkaOrderBus::refresh_connection`] probes and by publish
/// outcomes. Individual publish failures record `last_error` on the status
/// for later inspection.
pub struct KafkaOrderBus {
    producer: FutureProducer,
    brokers: String,
    queue: String,
    timeout: Duration,
    status: Mutex<ConnectionStatus>,
    queue_declared: AtomicBool,
    closed: AtomicBool,
}

impl KafkaOrderBus {
    /// Create a bus with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::NotConnected`] if the producer cannot be
    /// created (invalid configuration or unreachable bootstrap servers).
    pub fn new(brokers: &str) -> Result<Self, PublishError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the bus.
    #[must_use]
    pub fn builder() -> KafkaOrderBusBuilder {
        KafkaOrderBusBuilder::default()
    }

    /// The broker addresses this bus was configured with.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// The queue (topic) this bus publishes to.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    fn status_guard(&self) -> MutexGuard<'_, ConnectionStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_success(&self) {
        let mut status = self.status_guard();
        status.connected = true;
        status.last_connected_at = Some(Utc::now());
        status.last_error = None;
    }

    fn record_failure(&self, error: &str, lost_connection: bool) {
        let mut status = self.status_guard();
        if lost_connection {
            status.connected = false;
        }
        status.last_error = Some(error.to_string());
    }

    /// Probe broker metadata and update the cached connection state.
    ///
    /// Returns the probe outcome. Bootstrap code calls this in its
    /// retry-with-backoff loop; the publisher itself never retries.
    pub async fn refresh_connection(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }

        let producer = self.producer.clone();
        let timeout = self.timeout;
        let probe = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, Timeout::After(timeout))
                .map(|_| ())
        })
        .await;

        match probe {
            Ok(Ok(())) => {
                self.record_success();
                true
            },
            Ok(Err(e)) => {
                tracing::warn!(brokers = %self.brokers, error = %e, "Broker metadata probe failed");
                self.record_failure(&e.to_string(), true);
                false
            },
            Err(e) => {
                self.record_failure(&e.to_string(), true);
                false
            },
        }
    }

    /// Declare the target queue: durable topic, idempotent to repeat.
    ///
    /// An already-existing topic is success. The result is cached so the
    /// per-publish declaration is a cheap flag check after the first call.
    async fn ensure_queue_declared(&self) -> Result<(), PublishError> {
        if self.queue_declared.load(Ordering::SeqCst) {
            return Ok(());
        }

        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()
            .map_err(|e| PublishError::Declare {
                queue: self.queue.clone(),
                reason: format!("Failed to create admin client: {e}"),
            })?;

        let topic = NewTopic::new(&self.queue, 1, TopicReplication::Fixed(1));
        let results = admin
            .create_topics([&topic], &AdminOptions::new())
            .await
            .map_err(|e| PublishError::Declare {
                queue: self.queue.clone(),
                reason: e.to_string(),
            })?;

        for result in results {
            match result {
                Ok(_) => {},
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {},
                Err((topic, code)) => {
                    return Err(PublishError::Declare {
                        queue: topic,
                        reason: code.to_string(),
                    });
                },
            }
        }

        self.queue_declared.store(true, Ordering::SeqCst);
        tracing::debug!(queue = %self.queue, "Queue declared");
        Ok(())
    }

    /// Publish a payload with explicit headers; shared by the public publish
    /// path and the consumer's requeue path.
    pub(crate) async fn publish_raw(
        &self,
        key: &str,
        payload: &[u8],
        headers: OwnedHeaders,
    ) -> Result<(), PublishError> {
        let record = FutureRecord::to(&self.queue)
            .payload(payload)
            .key(key)
            .headers(headers);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                tracing::debug!(
                    queue = %self.queue,
                    partition = partition,
                    offset = offset,
                    key = %key,
                    "Message published"
                );
                self.record_success();
                Ok(())
            },
            Err((kafka_error, _)) => {
                tracing::error!(queue = %self.queue, error = %kafka_error, "Publish failed");
                self.record_failure(&kafka_error.to_string(), false);
                Err(PublishError::Transport {
                    queue: self.queue.clone(),
                    reason: kafka_error.to_string(),
                })
            },
        }
    }

    /// Close the bus, flushing outstanding deliveries.
    ///
    /// Closing an already-closed bus is a no-op, not an error.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.producer.flush(Timeout::After(self.timeout)) {
            tracing::warn!(error = %e, "Flush on close failed");
        }
        let mut status = self.status_guard();
        status.connected = false;
        tracing::info!(brokers = %self.brokers, "Order bus closed");
    }
}

impl OrderPublisher for KafkaOrderBus {
    fn publish(
        &self,
        order: &Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        let order = order.clone();

        Box::pin(async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(PublishError::NotConnected(self.brokers.clone()));
            }

            self.ensure_queue_declared().await.inspect_err(|e| {
                self.record_failure(&e.to_string(), false);
            })?;

            let payload = message::encode_order(&order)
                .map_err(|e| PublishError::Serialization(e.to_string()))?;

            let message_id = Uuid::new_v4().to_string();
            let created_at = order.created_at.to_rfc3339();
            let headers = OwnedHeaders::new()
                .insert(Header {
                    key: MESSAGE_ID_HEADER,
                    value: Some(message_id.as_str()),
                })
                .insert(Header {
                    key: ORIGIN_HEADER,
                    value: Some(ORIGIN_APP),
                })
                .insert(Header {
                    key: ORDER_ID_HEADER,
                    value: Some(order.order_id.as_str()),
                })
                .insert(Header {
                    key: PRODUCT_ID_HEADER,
                    value: Some(order.product_id.as_str()),
                })
                .insert(Header {
                    key: CREATED_AT_HEADER,
                    value: Some(created_at.as_str()),
                })
                .insert(Header {
                    key: RETRY_COUNT_HEADER,
                    value: Some("0"),
                });

            self.publish_raw(order.order_id.as_str(), &payload, headers)
                .await?;

            metrics::counter!("orders.published").increment(1);
            tracing::info!(
                order_id = %order.order_id,
                product_id = %order.product_id,
                message_id = %message_id,
                "Order published"
            );
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.status_guard().connected
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.status_guard().clone()
    }
}

impl Drop for KafkaOrderBus {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for configuring a [`KafkaOrderBus`].
#[derive(Default)]
pub struct KafkaOrderBusBuilder {
    brokers: Option<String>,
    queue: Option<String>,
    producer_acks: Option<String>,
    timeout: Option<Duration>,
}

impl KafkaOrderBusBuilder {
    /// Set the broker addresses (comma-separated, e.g. "localhost:9092").
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the queue (topic) to publish to.
    ///
    /// Default: [`orderflow_core::message::DEFAULT_QUEUE`].
    #[must_use]
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Set the producer acknowledgment mode.
    ///
    /// Default: "all" — every replica must acknowledge, the durable-delivery
    /// guarantee the pipeline relies on.
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the publish timeout.
    ///
    /// Default: 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the [`KafkaOrderBus`].
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::NotConnected`] if brokers are not set or the
    /// producer cannot be created.
    pub fn build(self) -> Result<KafkaOrderBus, PublishError> {
        let brokers = self
            .brokers
            .ok_or_else(|| PublishError::NotConnected("brokers not configured".to_string()))?;
        let queue = self
            .queue
            .unwrap_or_else(|| message::DEFAULT_QUEUE.to_string());

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", self.producer_acks.as_deref().unwrap_or("all"))
            .create()
            .map_err(|e| {
                PublishError::NotConnected(format!("Failed to create producer: {e}"))
            })?;

        tracing::info!(
            brokers = %brokers,
            queue = %queue,
            acks = self.producer_acks.as_deref().unwrap_or("all"),
            "KafkaOrderBus created"
        );

        Ok(KafkaOrderBus {
            producer,
            status: Mutex::new(ConnectionStatus::disconnected(brokers.clone())),
            brokers,
            queue,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            queue_declared: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }
}
