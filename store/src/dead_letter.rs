//! Dead-letter store for messages that exhausted their delivery attempts.
//!
//! Provides persistent storage and management of queue messages that failed
//! processing after the bounded-retry cap. Enables observability, incident
//! response, and manual reprocessing workflows.

use chrono::{DateTime, Utc};
use orderflow_core::repository::{DeadLetterSink, StoreError};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// Status of a dead-lettered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterStatus {
    /// Entry is pending investigation/reprocessing
    Pending,
    /// Entry was successfully reprocessed
    Resolved,
    /// Entry was permanently discarded (cannot be fixed)
    Discarded,
}

impl DeadLetterStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Discarded => "discarded",
        }
    }

    /// Parse a status from its database string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidData`] if the string is not a known status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "discarded" => Ok(Self::Discarded),
            _ => Err(StoreError::InvalidData(format!(
                "Invalid dead-letter status: {s}"
            ))),
        }
    }
}

/// A persisted dead-letter entry.
///
/// Carries the raw payload plus failure metadata for troubleshooting.
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    /// Unique identifier for this entry
    pub id: i64,

    /// Order id, when the payload decoded far enough to know it
    pub order_id: Option<String>,

    /// The raw message payload as delivered
    pub payload: Vec<u8>,

    /// Error message from the final failure
    pub error_message: String,

    /// Number of delivery attempts before giving up
    pub attempts: i32,

    /// When the entry was recorded
    pub first_failed_at: DateTime<Utc>,

    /// Current status
    pub status: DeadLetterStatus,
}

/// `PostgreSQL`-based dead-letter store.
///
/// # Example
///
/// ```no_run
/// use orderflow_store::DeadLetterStore;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let dead_letters = DeadLetterStore::new(pool);
///
/// let pending = dead_letters.list_pending(100).await?;
/// println!("Pending failures: {}", pending.len());
/// # Ok(())
/// # }
/// ```
pub struct DeadLetterStore {
    pool: PgPool,
}

impl DeadLetterStore {
    /// Create a dead-letter store with the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List pending entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn list_pending(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError> {
        #[allow(clippy::cast_possible_wrap)] // limit is a reasonable size
        let rows = sqlx::query(
            r"
            SELECT id, order_id, payload, error_message, attempts, first_failed_at, status
            FROM failed_orders
            WHERE status = 'pending'
            ORDER BY first_failed_at ASC
            LIMIT $1
            ",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Count of pending entries, for monitoring and health checks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn count_pending(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM failed_orders WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Mark an entry resolved after manual reprocessing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    pub async fn mark_resolved(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE failed_orders SET status = 'resolved' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!(dead_letter_id = id, "Dead-letter entry resolved");
        Ok(())
    }

    /// Mark an entry discarded (permanently failed).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    pub async fn mark_discarded(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE failed_orders SET status = 'discarded' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::warn!(dead_letter_id = id, "Dead-letter entry discarded");
        Ok(())
    }

    fn row_to_entry(row: &sqlx::postgres::PgRow) -> Result<DeadLetterEntry, StoreError> {
        let status_str: String = row.get("status");
        Ok(DeadLetterEntry {
            id: row.get("id"),
            order_id: row.get("order_id"),
            payload: row.get("payload"),
            error_message: row.get("error_message"),
            attempts: row.get("attempts"),
            first_failed_at: row.get("first_failed_at"),
            status: DeadLetterStatus::parse(&status_str)?,
        })
    }
}

impl DeadLetterSink for DeadLetterStore {
    fn record(
        &self,
        order_id: Option<&str>,
        payload: &[u8],
        error: &str,
        attempts: i32,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let order_id = order_id.map(ToString::to_string);
        let payload = payload.to_vec();
        let error = error.to_string();

        Box::pin(async move {
            let id: (i64,) = sqlx::query_as(
                r"
                INSERT INTO failed_orders (order_id, payload, error_message, attempts)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                ",
            )
            .bind(&order_id)
            .bind(&payload)
            .bind(&error)
            .bind(attempts)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            tracing::warn!(
                dead_letter_id = id.0,
                order_id = order_id.as_deref().unwrap_or("<unknown>"),
                error = %error,
                attempts = attempts,
                "Message recorded in dead-letter store"
            );

            metrics::counter!("store.dead_letters.recorded").increment(1);
            Ok(())
        })
    }
}
