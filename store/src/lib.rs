//! `PostgreSQL` storage for the analytics side of the Orderflow pipeline.
//!
//! This crate provides [`PostgresOrderStore`], the production implementation
//! of the `OrderRepository` trait from `orderflow-core`, and
//! [`DeadLetterStore`] for messages that exhausted their delivery attempts.
//! It uses sqlx with a connection pool and supports:
//!
//! - Idempotent order persistence (upsert keyed on the order id)
//! - Pagination and aggregate queries for the analytics API
//! - Dead-letter persistence for incident investigation
//!
//! # Example
//!
//! ```no_run
//! use orderflow_store::PostgresOrderStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresOrderStore::connect("postgres://localhost/orders").await?;
//! store.run_migrations().await?;
//! # Ok(())
//! # }
//! ```

pub mod dead_letter;

pub use dead_letter::{DeadLetterEntry, DeadLetterStatus, DeadLetterStore};

use chrono::{DateTime, Utc};
use orderflow_core::order::Order;
use orderflow_core::repository::{
    OrderAggregates, OrderDocument, OrderRepository, ProcessingStatus, RECENT_ORDERS_LIMIT,
    StoreError,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// `PostgreSQL`-backed order store.
///
/// One instance holds a connection pool shared by the consumer task and the
/// HTTP handlers. All writes go through [`OrderRepository::save`], which is
/// an upsert so that at-least-once redelivery never creates duplicates.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Connect to the database and build a pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection cannot be
    /// established.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the orders and dead-letter tables (and their indexes) if they
    /// do not exist. Safe to run on every startup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a statement fails.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS orders (
                order_id TEXT PRIMARY KEY,
                product_id TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                processed_at TIMESTAMPTZ NOT NULL,
                status TEXT NOT NULL DEFAULT 'processed'
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        // Pagination and recency queries scan newest-first.
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_orders_created_at
            ON orders (created_at DESC)
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS failed_orders (
                id BIGSERIAL PRIMARY KEY,
                order_id TEXT,
                payload BYTEA NOT NULL,
                error_message TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                first_failed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                status TEXT NOT NULL DEFAULT 'pending'
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("Database migrations applied");
        Ok(())
    }

    fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<OrderDocument, StoreError> {
        let status_str: String = row.get("status");
        Ok(OrderDocument {
            order_id: row.get("order_id"),
            product_id: row.get("product_id"),
            quantity: row.get("quantity"),
            created_at: row.get("created_at"),
            processed_at: row.get("processed_at"),
            status: ProcessingStatus::parse(&status_str)?,
        })
    }
}

impl OrderRepository for PostgresOrderStore {
    fn save(
        &self,
        order: &Order,
        processed_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<OrderDocument, StoreError>> + Send + '_>> {
        let order = order.clone();

        Box::pin(async move {
            #[allow(clippy::cast_possible_wrap)] // quantity is validated <= 1000
            let quantity = order.quantity as i32;

            let row = sqlx::query(
                r"
                INSERT INTO orders (order_id, product_id, quantity, created_at, processed_at, status)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (order_id) DO UPDATE SET
                    product_id = EXCLUDED.product_id,
                    quantity = EXCLUDED.quantity,
                    created_at = EXCLUDED.created_at,
                    processed_at = EXCLUDED.processed_at,
                    status = EXCLUDED.status
                RETURNING order_id, product_id, quantity, created_at, processed_at, status
                ",
            )
            .bind(order.order_id.as_str())
            .bind(order.product_id.as_str())
            .bind(quantity)
            .bind(order.created_at)
            .bind(processed_at)
            .bind(ProcessingStatus::Processed.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            metrics::counter!("store.orders.saved").increment(1);
            tracing::debug!(order_id = %order.order_id, "Order document saved");

            Self::row_to_document(&row)
        })
    }

    fn list(
        &self,
        page: u32,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = Result<(Vec<OrderDocument>, u64), StoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let page = page.max(1);
            let offset = i64::from(page - 1) * i64::from(limit);

            let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

            let rows = sqlx::query(
                r"
                SELECT order_id, product_id, quantity, created_at, processed_at, status
                FROM orders
                ORDER BY created_at DESC
                OFFSET $1 LIMIT $2
                ",
            )
            .bind(offset)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            let documents = rows
                .iter()
                .map(Self::row_to_document)
                .collect::<Result<Vec<_>, _>>()?;

            #[allow(clippy::cast_sign_loss)] // COUNT(*) is never negative
            Ok((documents, total as u64))
        })
    }

    fn get(
        &self,
        order_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<OrderDocument>, StoreError>> + Send + '_>> {
        let order_id = order_id.to_string();

        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT order_id, product_id, quantity, created_at, processed_at, status
                FROM orders
                WHERE order_id = $1
                ",
            )
            .bind(&order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            row.as_ref().map(Self::row_to_document).transpose()
        })
    }

    fn delete(
        &self,
        order_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
        let order_id = order_id.to_string();

        Box::pin(async move {
            let result = sqlx::query("DELETE FROM orders WHERE order_id = $1")
                .bind(&order_id)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

            let deleted = result.rows_affected() > 0;
            if deleted {
                tracing::info!(order_id = %order_id, "Order document deleted");
            }
            Ok(deleted)
        })
    }

    fn stats(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<OrderAggregates, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let (total_orders, total_quantity): (i64, Option<i64>) = sqlx::query_as(
                "SELECT COUNT(*), SUM(quantity)::BIGINT FROM orders",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            let rows = sqlx::query(
                r"
                SELECT order_id, product_id, quantity, created_at, processed_at, status
                FROM orders
                ORDER BY created_at DESC
                LIMIT $1
                ",
            )
            .bind(RECENT_ORDERS_LIMIT)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            let recent_orders = rows
                .iter()
                .map(Self::row_to_document)
                .collect::<Result<Vec<_>, _>>()?;

            #[allow(clippy::cast_sign_loss)] // counts and sums are never negative
            Ok(OrderAggregates {
                total_orders: total_orders as u64,
                total_quantity: total_quantity.unwrap_or(0) as u64,
                recent_orders,
            })
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(())
        })
    }
}
