//! Storage abstraction for the analytics side of the pipeline.
//!
//! [`OrderRepository`] is implemented by the Postgres store for production
//! and by the testing crate for in-memory tests. Because the queue delivers
//! at-least-once, [`OrderRepository::save`] must be idempotent: it upserts
//! keyed on the order id, so a redelivered message never creates a duplicate
//! document.

use crate::order::Order;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The database rejected or failed the operation.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be interpreted.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// Processing status of a persisted order document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// The order was consumed from the queue and persisted.
    Processed,
}

impl ProcessingStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
        }
    }

    /// Parse a status from its database string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidData`] if the string is not a known status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "processed" => Ok(Self::Processed),
            _ => Err(StoreError::InvalidData(format!("Invalid status: {s}"))),
        }
    }
}

/// A persisted order document in the analytics store.
///
/// Created on successful consumption and never mutated thereafter except by
/// explicit delete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDocument {
    /// Order identifier (unique in the store)
    pub order_id: String,
    /// Product identifier
    pub product_id: String,
    /// Quantity ordered (i32 for PostgreSQL compatibility)
    pub quantity: i32,
    /// Business creation timestamp from the originating order
    pub created_at: DateTime<Utc>,
    /// When the consumer persisted the document
    pub processed_at: DateTime<Utc>,
    /// Processing status
    pub status: ProcessingStatus,
}

/// Aggregate figures across all persisted orders.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAggregates {
    /// Total number of persisted order documents
    pub total_orders: u64,
    /// Sum of quantities across all documents
    pub total_quantity: u64,
    /// The five most recently created orders
    pub recent_orders: Vec<OrderDocument>,
}

/// How many orders `recent_orders` carries.
pub const RECENT_ORDERS_LIMIT: i64 = 5;

/// Trait for the analytics order store.
///
/// Conceptually the store maintains two lookup accelerators: a unique index
/// on the order id for point lookups, and an index on creation time
/// descending for pagination and recency queries.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns for dyn compatibility
/// (`Arc<dyn OrderRepository>` is injected into the consumer and the
/// analytics handlers).
pub trait OrderRepository: Send + Sync {
    /// Persist an order, upserting by order id.
    ///
    /// Idempotent under redelivery: saving the same order twice yields
    /// exactly one document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    fn save(
        &self,
        order: &Order,
        processed_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<OrderDocument, StoreError>> + Send + '_>>;

    /// Page through documents, newest first.
    ///
    /// Returns the requested page and the total document count. `page` is
    /// 1-based; the offset is `(page - 1) * limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn list(
        &self,
        page: u32,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = Result<(Vec<OrderDocument>, u64), StoreError>> + Send + '_>>;

    /// Point lookup by order id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn get(
        &self,
        order_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<OrderDocument>, StoreError>> + Send + '_>>;

    /// Delete by order id; returns whether a document was found.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    fn delete(
        &self,
        order_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>>;

    /// Aggregate counts and the most recent orders.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn stats(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<OrderAggregates, StoreError>> + Send + '_>>;

    /// Cheap liveness probe for health checks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the store is unreachable.
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

/// Sink for messages that exhausted the bounded-retry policy.
///
/// Implemented by the Postgres dead-letter store; keeps poison messages out
/// of the queue while preserving them for inspection and reprocessing.
pub trait DeadLetterSink: Send + Sync {
    /// Record a message that repeatedly failed processing.
    ///
    /// `order_id` is present when the payload decoded far enough to know it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the entry cannot be written.
    fn record(
        &self,
        order_id: Option<&str>,
        payload: &[u8],
        error: &str,
        attempts: i32,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_string_form() {
        let status = ProcessingStatus::Processed;
        assert_eq!(ProcessingStatus::parse(status.as_str()).unwrap(), status);
    }

    #[test]
    fn unknown_status_is_invalid_data() {
        let err = ProcessingStatus::parse("shipped").unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[test]
    fn document_serializes_status_lowercase() {
        let doc = OrderDocument {
            order_id: "ORD-001".to_string(),
            product_id: "PROD-123".to_string(),
            quantity: 5,
            created_at: Utc::now(),
            processed_at: Utc::now(),
            status: ProcessingStatus::Processed,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["status"], "processed");
        assert!(json.get("orderId").is_some());
    }
}
