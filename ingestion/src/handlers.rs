//! HTTP handlers for the ingestion API.

use crate::service::{CreateOrderOutcome, OrderService};
use crate::stats::StatsSnapshot;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use orderflow_core::order::{Order, OrderId, OrderResponse, ProductId};
use orderflow_core::validation::{OrderValidator, ValidationRules};
use orderflow_web::CorrelationId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Incoming order body.
///
/// The reference clients send PascalCase field names; newer clients send
/// camelCase. Aliases accept both. Fields are optional so a missing field
/// flows into validation (which reports it as required) instead of producing
/// an opaque deserialization error.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateOrderRequest {
    /// Order identifier.
    #[serde(default, alias = "OrderId", alias = "orderId")]
    pub order_id: Option<String>,

    /// Product identifier.
    #[serde(default, alias = "ProductId", alias = "productId")]
    pub product_id: Option<String>,

    /// Quantity ordered. Signed so negative values reach the validator's
    /// minimum-bound check instead of failing deserialization.
    #[serde(default, alias = "Quantity", alias = "quantity")]
    pub quantity: Option<i64>,
}

impl CreateOrderRequest {
    fn into_order(self) -> Order {
        // Out-of-range quantities saturate to the nearest bound so the
        // validator reports the violated limit.
        let quantity = match self.quantity {
            Some(q) if q < 0 => 0,
            Some(q) => u32::try_from(q).unwrap_or(u32::MAX),
            None => 0,
        };
        Order::new(
            OrderId::new(self.order_id.unwrap_or_default()),
            ProductId::new(self.product_id.unwrap_or_default()),
            quantity,
        )
    }
}

/// Health response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "unavailable"
    pub status: &'static str,
    /// Whether the broker connection is up
    pub broker_connected: bool,
}

const fn outcome_status(outcome: &CreateOrderOutcome) -> StatusCode {
    match outcome {
        CreateOrderOutcome::Accepted(_) => StatusCode::ACCEPTED,
        CreateOrderOutcome::Invalid(_) => StatusCode::BAD_REQUEST,
        CreateOrderOutcome::BrokerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CreateOrderOutcome::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Submit an order.
///
/// # Endpoint
///
/// ```text
/// POST /api/orders
/// Content-Type: application/json
///
/// { "OrderId": "ORD-001", "ProductId": "PROD-123", "Quantity": 5 }
/// ```
///
/// # Status Codes
///
/// - 202 Accepted: validated and published
/// - 400 Bad Request: validation failed (all violations in `message`)
/// - 503 Service Unavailable: broker connection down
/// - 500 Internal Server Error: publish failed
pub async fn create_order(
    State(service): State<Arc<OrderService>>,
    correlation_id: CorrelationId,
    Json(request): Json<CreateOrderRequest>,
) -> (StatusCode, Json<OrderResponse>) {
    tracing::debug!(correlation_id = %correlation_id.0, "Order submission received");

    let outcome = service.create_order(request.into_order()).await;
    let status = outcome_status(&outcome);
    let response = match outcome {
        CreateOrderOutcome::Accepted(r)
        | CreateOrderOutcome::Invalid(r)
        | CreateOrderOutcome::BrokerUnavailable(r)
        | CreateOrderOutcome::Failed(r) => r,
    };
    (status, Json(response))
}

/// Submit an order on the legacy path.
///
/// Same pipeline as [`create_order`], but a successful submission answers
/// 200 with the bare order echoed back, which is what the original clients
/// of this endpoint expect. Failures use the wrapped response body.
///
/// # Endpoint
///
/// ```text
/// POST /order
/// ```
pub async fn create_order_legacy(
    State(service): State<Arc<OrderService>>,
    Json(request): Json<CreateOrderRequest>,
) -> Response {
    let outcome = service.create_order(request.into_order()).await;
    match outcome {
        CreateOrderOutcome::Accepted(response) => (StatusCode::OK, Json(response.data)).into_response(),
        other => {
            let status = outcome_status(&other);
            let response = match other {
                CreateOrderOutcome::Accepted(r)
                | CreateOrderOutcome::Invalid(r)
                | CreateOrderOutcome::BrokerUnavailable(r)
                | CreateOrderOutcome::Failed(r) => r,
            };
            (status, Json(response)).into_response()
        },
    }
}

/// Acceptance statistics.
///
/// # Endpoint
///
/// ```text
/// GET /api/orders/stats
/// ```
#[allow(clippy::unused_async)]
pub async fn stats(State(service): State<Arc<OrderService>>) -> Json<StatsSnapshot> {
    Json(service.statistics())
}

/// The validation rules applied to incoming orders.
///
/// # Endpoint
///
/// ```text
/// GET /api/validation-rules
/// ```
#[allow(clippy::unused_async)]
pub async fn validation_rules() -> Json<ValidationRules> {
    Json(OrderValidator::rules())
}

/// Broker-aware health check.
///
/// Returns 200 while the broker connection is up, 503 otherwise. Load
/// balancers use this to drain an instance that lost its queue.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health(
    State(service): State<Arc<OrderService>>,
) -> (StatusCode, Json<HealthResponse>) {
    if service.broker_connected() {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                broker_connected: true,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable",
                broker_connected: false,
            }),
        )
    }
}
