//! Order queue consumer with at-least-once delivery and bounded retry.
//!
//! The consumer runs a single subscription loop per service instance:
//!
//! ```text
//! Disconnected ──connect/subscribe──► Consuming
//!      ▲                                 │
//!      └────── failure, 5s delay ────────┘
//! ```
//!
//! Per message, the offset is committed only after the processing outcome is
//! known — never before persistence completes. Failures (decode or handler)
//! requeue the message with an incremented `retry-count` header; once the
//! attempt cap is reached the message is handed to the handler's dead-letter
//! sink instead of looping forever. This replaces unbounded requeue, which
//! turns one poison message into an infinite redelivery loop.

use crate::{KafkaOrderBus, RECONNECT_DELAY};
use orderflow_core::message::{self, RETRY_COUNT_HEADER};
use orderflow_core::order::Order;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Default cap on delivery attempts before a message is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Errors from the message handler.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Persistence failed; the message will be requeued or dead-lettered.
    #[error("Storage failed: {0}")]
    Storage(String),
}

/// Errors from consumer setup.
#[derive(Error, Debug)]
pub enum ConsumeError {
    /// The consumer client could not be created.
    #[error("Failed to create consumer: {0}")]
    Connect(String),

    /// Subscribing to the queue failed.
    #[error("Failed to subscribe to '{queue}': {reason}")]
    Subscribe {
        /// The queue that could not be subscribed to
        queue: String,
        /// The underlying cause
        reason: String,
    },
}

/// Handler invoked for each delivered order.
///
/// `process` must be idempotent or duplicate-tolerant: at-least-once delivery
/// means the same order can arrive more than once after a crash between
/// persist and commit.
pub trait OrderHandler: Send + Sync {
    /// Persist (or otherwise process) a decoded order.
    fn process(&self, order: Order) -> impl Future<Output = Result<(), HandlerError>> + Send;

    /// Record a message that exhausted its delivery attempts.
    ///
    /// `order_id` is present when the payload decoded far enough to know it.
    fn dead_letter(
        &self,
        order_id: Option<&str>,
        payload: &[u8],
        error: &str,
        attempts: i32,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send;
}

/// Consumer configuration.
#[derive(Clone, Debug)]
pub struct ConsumerConfig {
    /// Broker addresses (comma-separated)
    pub brokers: String,
    /// Queue (topic) to consume
    pub queue: String,
    /// Consumer group id
    pub group: String,
    /// Where new groups start reading ("earliest" processes the backlog)
    pub auto_offset_reset: String,
    /// Delivery attempt cap before dead-lettering
    pub max_attempts: i32,
    /// Delay between reconnect attempts
    pub reconnect_delay: Duration,
}

impl ConsumerConfig {
    /// Configuration with the pipeline defaults.
    #[must_use]
    pub fn new(brokers: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            queue: message::DEFAULT_QUEUE.to_string(),
            group: group.into(),
            auto_offset_reset: "earliest".to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    /// Set the queue to consume.
    #[must_use]
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Set the delivery attempt cap.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// What to do with a message after its failure was examined.
#[derive(Debug, PartialEq, Eq)]
enum FailureStep {
    /// Republish with the given attempt count, then commit the original.
    Requeue(i32),
    /// Hand to the dead-letter sink, then commit.
    DeadLetter,
}

const fn failure_step(attempts_so_far: i32, max_attempts: i32) -> FailureStep {
    // Saturate: a crafted retry-count header must not overflow.
    let next = attempts_so_far.saturating_add(1);
    if next < max_attempts {
        FailureStep::Requeue(next)
    } else {
        FailureStep::DeadLetter
    }
}

/// Read the delivery attempt counter from message headers (0 when absent or
/// unreadable).
fn retry_count<H: Headers>(headers: &H) -> i32 {
    for i in 0..headers.count() {
        let header = headers.get(i);
        if header.key == RETRY_COUNT_HEADER {
            return header
                .value
                .and_then(|v| std::str::from_utf8(v).ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
        }
    }
    0
}

/// Rebuild a message's headers with an updated retry count.
fn headers_with_retry<H: Headers>(headers: Option<&H>, attempts: i32) -> OwnedHeaders {
    let attempts = attempts.to_string();
    let mut rebuilt = OwnedHeaders::new();
    let mut saw_retry = false;

    if let Some(headers) = headers {
        for i in 0..headers.count() {
            let header = headers.get(i);
            if header.key == RETRY_COUNT_HEADER {
                saw_retry = true;
                rebuilt = rebuilt.insert(Header {
                    key: RETRY_COUNT_HEADER,
                    value: Some(attempts.as_str()),
                });
            } else {
                rebuilt = rebuilt.insert(Header {
                    key: header.key,
                    value: header.value,
                });
            }
        }
    }

    if !saw_retry {
        rebuilt = rebuilt.insert(Header {
            key: RETRY_COUNT_HEADER,
            value: Some(attempts.as_str()),
        });
    }
    rebuilt
}

/// Outcome of handling one delivery.
enum Disposition {
    /// The outcome is settled; commit the offset (the ack).
    Commit,
    /// The outcome could not be settled (e.g. the dead-letter write failed);
    /// leave the offset uncommitted so the broker redelivers.
    Redeliver,
}

/// Subscription loop for the order queue.
///
/// Owns a requeue publisher alongside the consumer so failed messages can be
/// republished with an incremented attempt counter.
pub struct OrderConsumer {
    config: ConsumerConfig,
    requeue: KafkaOrderBus,
}

impl OrderConsumer {
    /// Create a consumer (and its requeue publisher) for the given config.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumeError::Connect`] if the requeue producer cannot be
    /// created.
    pub fn new(config: ConsumerConfig) -> Result<Self, ConsumeError> {
        let requeue = KafkaOrderBus::builder()
            .brokers(&config.brokers)
            .queue(&config.queue)
            .build()
            .map_err(|e| ConsumeError::Connect(e.to_string()))?;
        Ok(Self { config, requeue })
    }

    fn subscribe(&self) -> Result<StreamConsumer, ConsumeError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .set("group.id", &self.config.group)
            .set("enable.auto.commit", "false") // manual commit: ack after persist
            .set("auto.offset.reset", &self.config.auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| ConsumeError::Connect(e.to_string()))?;

        consumer
            .subscribe(&[self.config.queue.as_str()])
            .map_err(|e| ConsumeError::Subscribe {
                queue: self.config.queue.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            queue = %self.config.queue,
            group = %self.config.group,
            auto_offset_reset = %self.config.auto_offset_reset,
            manual_commit = true,
            "Subscribed to order queue"
        );
        Ok(consumer)
    }

    /// Run the consume loop until `shutdown` flips to `true`.
    ///
    /// Connect and subscribe failures return to the disconnected state and
    /// retry after [`ConsumerConfig::reconnect_delay`]. In-flight message
    /// handling completes before the loop exits; dropping the consumer closes
    /// the underlying connection.
    pub async fn run<H: OrderHandler>(&self, handler: &H, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let consumer = match self.subscribe() {
                Ok(consumer) => consumer,
                Err(e) => {
                    tracing::warn!(error = %e, delay = ?self.config.reconnect_delay, "Consumer connect failed, retrying");
                    if Self::wait_or_shutdown(self.config.reconnect_delay, &mut shutdown).await {
                        break;
                    }
                    continue;
                },
            };

            let reconnect = self.consume_until(&consumer, handler, &mut shutdown).await;
            if !reconnect {
                break;
            }
            if Self::wait_or_shutdown(self.config.reconnect_delay, &mut shutdown).await {
                break;
            }
        }

        tracing::info!("Consumer loop exiting");
    }

    /// Returns `true` if shutdown was requested during the wait. A dropped
    /// shutdown sender counts as a shutdown request.
    async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => false,
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }

    /// Consume messages until shutdown (returns `false`) or until the
    /// consumer must be recreated (returns `true`).
    async fn consume_until<H: OrderHandler>(
        &self,
        consumer: &StreamConsumer,
        handler: &H,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            let delivery = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return false;
                    }
                    continue;
                },
                delivery = consumer.recv() => delivery,
            };

            match delivery {
                Ok(msg) => match self.handle_delivery(&msg, handler).await {
                    Disposition::Commit => {
                        if let Err(e) = consumer.commit_message(&msg, CommitMode::Async) {
                            tracing::warn!(
                                offset = msg.offset(),
                                error = %e,
                                "Offset commit failed (message may be redelivered)"
                            );
                        }
                    },
                    Disposition::Redeliver => {
                        // Recreate the consumer so the broker redelivers from
                        // the last committed offset.
                        tracing::warn!(offset = msg.offset(), "Unsettled message, reconnecting for redelivery");
                        return true;
                    },
                },
                Err(e) => {
                    tracing::error!(error = %e, "Consumer receive failed, reconnecting");
                    return true;
                },
            }
        }
    }

    async fn handle_delivery<H: OrderHandler>(
        &self,
        msg: &BorrowedMessage<'_>,
        handler: &H,
    ) -> Disposition {
        let attempts = msg.headers().map_or(0, retry_count);

        let Some(payload) = msg.payload() else {
            tracing::warn!(offset = msg.offset(), "Message has no payload");
            return self
                .handle_failure(msg, handler, None, b"", "message has no payload", attempts)
                .await;
        };

        match message::decode_order(payload) {
            Ok(order) => {
                let order_id = order.order_id.to_string();
                match handler.process(order).await {
                    Ok(()) => {
                        metrics::counter!("orders.consumed").increment(1);
                        tracing::info!(order_id = %order_id, attempts = attempts, "Order processed");
                        Disposition::Commit
                    },
                    Err(e) => {
                        tracing::warn!(order_id = %order_id, error = %e, "Order processing failed");
                        self.handle_failure(
                            msg,
                            handler,
                            Some(&order_id),
                            payload,
                            &e.to_string(),
                            attempts,
                        )
                        .await
                    },
                }
            },
            Err(e) => {
                tracing::warn!(offset = msg.offset(), error = %e, "Undecodable message");
                self.handle_failure(msg, handler, None, payload, &e.to_string(), attempts)
                    .await
            },
        }
    }

    async fn handle_failure<H: OrderHandler>(
        &self,
        msg: &BorrowedMessage<'_>,
        handler: &H,
        order_id: Option<&str>,
        payload: &[u8],
        error: &str,
        attempts: i32,
    ) -> Disposition {
        match failure_step(attempts, self.config.max_attempts) {
            FailureStep::Requeue(next) => {
                let headers = headers_with_retry(msg.headers(), next);
                let key = msg
                    .key()
                    .and_then(|k| std::str::from_utf8(k).ok())
                    .unwrap_or("");
                match self.requeue.publish_raw(key, payload, headers).await {
                    Ok(()) => {
                        metrics::counter!("orders.requeued").increment(1);
                        tracing::info!(
                            order_id = order_id.unwrap_or("<unknown>"),
                            attempt = next,
                            max_attempts = self.config.max_attempts,
                            "Message requeued"
                        );
                        Disposition::Commit
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "Requeue publish failed, leaving message unacknowledged");
                        Disposition::Redeliver
                    },
                }
            },
            FailureStep::DeadLetter => {
                let total_attempts = attempts.saturating_add(1);
                match handler
                    .dead_letter(order_id, payload, error, total_attempts)
                    .await
                {
                    Ok(()) => {
                        metrics::counter!("orders.dead_lettered").increment(1);
                        tracing::error!(
                            order_id = order_id.unwrap_or("<unknown>"),
                            attempts = total_attempts,
                            error = %error,
                            "Message dead-lettered"
                        );
                        Disposition::Commit
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "Dead-letter write failed, leaving message unacknowledged");
                        Disposition::Redeliver
                    },
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn failure_step_requeues_below_the_cap() {
        assert_eq!(failure_step(0, 5), FailureStep::Requeue(1));
        assert_eq!(failure_step(3, 5), FailureStep::Requeue(4));
    }

    #[test]
    fn failure_step_dead_letters_at_the_cap() {
        assert_eq!(failure_step(4, 5), FailureStep::DeadLetter);
        assert_eq!(failure_step(7, 5), FailureStep::DeadLetter);
    }

    #[test]
    fn failure_step_with_cap_one_never_requeues() {
        assert_eq!(failure_step(0, 1), FailureStep::DeadLetter);
    }

    #[test]
    fn failure_step_saturates_on_a_crafted_counter() {
        assert_eq!(failure_step(i32::MAX, 5), FailureStep::DeadLetter);
        assert_eq!(failure_step(i32::MAX, i32::MAX), FailureStep::DeadLetter);
    }

    #[test]
    fn retry_count_reads_the_header() {
        let headers = OwnedHeaders::new().insert(Header {
            key: RETRY_COUNT_HEADER,
            value: Some("3"),
        });
        assert_eq!(retry_count(&headers), 3);
    }

    #[test]
    fn retry_count_defaults_to_zero() {
        let headers = OwnedHeaders::new().insert(Header {
            key: "origin",
            value: Some("test"),
        });
        assert_eq!(retry_count(&headers), 0);

        let garbage = OwnedHeaders::new().insert(Header {
            key: RETRY_COUNT_HEADER,
            value: Some("not-a-number"),
        });
        assert_eq!(retry_count(&garbage), 0);
    }

    #[test]
    fn headers_with_retry_replaces_the_counter_and_keeps_the_rest() {
        let original = OwnedHeaders::new()
            .insert(Header {
                key: "order-id",
                value: Some("ORD-001"),
            })
            .insert(Header {
                key: RETRY_COUNT_HEADER,
                value: Some("1"),
            });

        let rebuilt = headers_with_retry(Some(&original), 2);
        assert_eq!(retry_count(&rebuilt), 2);
        assert_eq!(rebuilt.count(), 2);
    }

    #[test]
    fn headers_with_retry_adds_the_counter_when_missing() {
        let original = OwnedHeaders::new().insert(Header {
            key: "order-id",
            value: Some("ORD-001"),
        });
        let rebuilt = headers_with_retry(Some(&original), 1);
        assert_eq!(retry_count(&rebuilt), 1);
    }

    #[test]
    fn consumer_config_defaults() {
        let config = ConsumerConfig::new("localhost:9092", "analytics");
        assert_eq!(config.queue, message::DEFAULT_QUEUE);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.reconnect_delay, RECONNECT_DELAY);
        assert_eq!(config.auto_offset_reset, "earliest");
    }
}
