//! HTTP handlers for the analytics read API.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use orderflow_core::repository::{OrderAggregates, OrderDocument, OrderRepository};
use orderflow_web::{AppError, Pagination};
use serde::Serialize;
use std::sync::Arc;

/// Pagination metadata returned alongside a page of documents.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// 1-based page number served
    pub page: u32,
    /// Page size served
    pub limit: u32,
    /// Total documents across all pages
    pub total: u64,
    /// Total number of pages
    pub total_pages: u64,
}

/// A page of order documents.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    /// The documents on this page, newest first
    pub orders: Vec<OrderDocument>,
    /// Pagination metadata
    pub pagination: PageMeta,
}

/// Health response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "unavailable"
    pub status: &'static str,
}

/// List persisted orders, newest first.
///
/// # Endpoint
///
/// ```text
/// GET /api/orders?page=1&limit=10
/// ```
///
/// Missing or non-numeric `page`/`limit` fall back to 1/10; `limit` is
/// capped at 100. A page past the end yields an empty `orders` array.
pub async fn list_orders(
    State(store): State<Arc<dyn OrderRepository>>,
    pagination: Pagination,
) -> Result<Json<OrderPage>, AppError> {
    let (orders, total) = store
        .list(pagination.page, pagination.limit)
        .await
        .map_err(|e| AppError::internal("Failed to list orders").with_source(e.into()))?;

    Ok(Json(OrderPage {
        orders,
        pagination: PageMeta {
            page: pagination.page,
            limit: pagination.limit,
            total,
            total_pages: pagination.total_pages(total),
        },
    }))
}

/// Fetch one order document.
///
/// # Endpoint
///
/// ```text
/// GET /api/orders/:order_id
/// ```
pub async fn get_order(
    State(store): State<Arc<dyn OrderRepository>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDocument>, AppError> {
    let document = store
        .get(&order_id)
        .await
        .map_err(|e| AppError::internal("Failed to load order").with_source(e.into()))?
        .ok_or_else(|| AppError::not_found("Order", &order_id))?;

    Ok(Json(document))
}

/// Delete one order document.
///
/// # Endpoint
///
/// ```text
/// DELETE /api/orders/:order_id
/// ```
///
/// # Status Codes
///
/// - 204 No Content: deleted
/// - 404 Not Found: no such document
pub async fn delete_order(
    State(store): State<Arc<dyn OrderRepository>>,
    Path(order_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let deleted = store
        .delete(&order_id)
        .await
        .map_err(|e| AppError::internal("Failed to delete order").with_source(e.into()))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Order", &order_id))
    }
}

/// Aggregate statistics over all persisted orders.
///
/// # Endpoint
///
/// ```text
/// GET /api/stats
/// ```
pub async fn stats(
    State(store): State<Arc<dyn OrderRepository>>,
) -> Result<Json<OrderAggregates>, AppError> {
    let aggregates = store
        .stats()
        .await
        .map_err(|e| AppError::internal("Failed to compute order statistics").with_source(e.into()))?;

    Ok(Json(aggregates))
}

/// Store-aware health check.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
pub async fn health(
    State(store): State<Arc<dyn OrderRepository>>,
) -> (StatusCode, Json<HealthResponse>) {
    match store.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "ok" })),
        Err(e) => {
            tracing::warn!(error = %e, "Store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                }),
            )
        },
    }
}
