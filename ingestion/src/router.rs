//! Ingestion HTTP router.
//!
//! Composes the order handlers into a single Axum router.

use crate::handlers;
use crate::service::OrderService;
use axum::{
    Router,
    routing::{get, post},
};
use orderflow_web::correlation_id_layer;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the ingestion router with all endpoints.
///
/// # Routes
///
/// - `POST /api/orders` - Submit an order
/// - `GET /api/orders/stats` - Acceptance statistics
/// - `GET /api/validation-rules` - Validation rule descriptions
/// - `POST /order` - Legacy submission path (echoes the bare order)
/// - `GET /health` - Broker-aware health check
#[must_use]
pub fn app(service: Arc<OrderService>) -> Router {
    Router::new()
        .route("/api/orders", post(handlers::create_order))
        .route("/api/orders/stats", get(handlers::stats))
        .route("/api/validation-rules", get(handlers::validation_rules))
        .route("/order", post(handlers::create_order_legacy))
        .route("/health", get(handlers::health))
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
