//! Shared Axum plumbing for the Orderflow services.
//!
//! Both the ingestion API and the analytics API are thin imperative shells
//! over the domain crates: handlers parse the request, call into the service
//! or store, and map the outcome to a response. This crate holds the pieces
//! they share:
//!
//! - [`AppError`]: domain-to-HTTP error bridging via `IntoResponse`
//! - [`Pagination`] and [`CorrelationId`] extractors
//! - [`correlation_id_layer`]: correlation ID tracking middleware
//!
//! # Example
//!
//! ```ignore
//! use orderflow_web::{AppError, Pagination, correlation_id_layer};
//! use axum::{Router, routing::get, Json};
//!
//! async fn list_orders(pagination: Pagination) -> Result<Json<Page>, AppError> {
//!     let (documents, total) = store.list(pagination.page, pagination.limit).await
//!         .map_err(|e| AppError::internal("Failed to list orders").with_source(e.into()))?;
//!     Ok(Json(Page { documents, total }))
//! }
//!
//! let app = Router::new()
//!     .route("/api/orders", get(list_orders))
//!     .layer(correlation_id_layer());
//! ```

pub mod error;
pub mod extractors;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{CorrelationId, Pagination};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
