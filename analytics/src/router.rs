//! Analytics HTTP router.

use crate::handlers;
use axum::{Router, routing::get};
use orderflow_core::repository::OrderRepository;
use orderflow_web::correlation_id_layer;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the analytics router with all endpoints.
///
/// # Routes
///
/// - `GET /api/orders` - List orders (paginated, newest first)
/// - `GET /api/orders/:order_id` - Fetch one order
/// - `DELETE /api/orders/:order_id` - Delete one order
/// - `GET /api/stats` - Aggregate statistics
/// - `GET /health` - Store-aware health check
#[must_use]
pub fn app(store: Arc<dyn OrderRepository>) -> Router {
    Router::new()
        .route("/api/orders", get(handlers::list_orders))
        .route(
            "/api/orders/:order_id",
            get(handlers::get_order).delete(handlers::delete_order),
        )
        .route("/api/stats", get(handlers::stats))
        .route("/health", get(handlers::health))
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}
