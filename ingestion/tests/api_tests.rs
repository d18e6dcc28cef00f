//! HTTP API tests for the ingestion service.
//!
//! Runs the real router against the in-memory broker double, so every status
//! code mapping is exercised without Kafka.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum_test::TestServer;
use orderflow_ingestion::{IngestionStats, OrderService, app};
use orderflow_testing::{InMemoryBroker, test_clock};
use serde_json::{Value, json};
use std::sync::Arc;

fn test_server(broker: Arc<InMemoryBroker>) -> TestServer {
    let clock = test_clock();
    let stats = Arc::new(IngestionStats::new(
        orderflow_core::environment::Clock::now(&clock),
    ));
    let service = Arc::new(OrderService::new(broker, stats, Arc::new(clock)));
    TestServer::new(app(service)).expect("Failed to start test server")
}

#[tokio::test]
async fn valid_order_is_accepted_with_202() {
    let broker = Arc::new(InMemoryBroker::new());
    let server = test_server(Arc::clone(&broker));

    let response = server
        .post("/api/orders")
        .json(&json!({"OrderId": "ORD-001", "ProductId": "PROD-123", "Quantity": 5}))
        .await;

    response.assert_status(axum::http::StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["orderId"], "ORD-001");
    assert_eq!(body["data"]["quantity"], 5);

    let published = broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].order_id.as_str(), "ORD-001");
}

#[tokio::test]
async fn camel_case_body_is_also_accepted() {
    let broker = Arc::new(InMemoryBroker::new());
    let server = test_server(Arc::clone(&broker));

    let response = server
        .post("/api/orders")
        .json(&json!({"orderId": "SALE-123456", "productId": "PROD-ABC123", "quantity": 1}))
        .await;

    response.assert_status(axum::http::StatusCode::ACCEPTED);
    assert_eq!(broker.published().len(), 1);
}

#[tokio::test]
async fn invalid_order_is_rejected_with_400_and_not_published() {
    let broker = Arc::new(InMemoryBroker::new());
    let server = test_server(Arc::clone(&broker));

    let response = server
        .post("/api/orders")
        .json(&json!({"OrderId": "invalid", "ProductId": "PRODUCT-123", "Quantity": 0}))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("OrderId"));
    assert!(message.contains("ProductId"));
    assert!(message.contains("Quantity"));

    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn negative_quantity_fails_validation_not_deserialization() {
    let broker = Arc::new(InMemoryBroker::new());
    let server = test_server(Arc::clone(&broker));

    let response = server
        .post("/api/orders")
        .json(&json!({"OrderId": "ORD-001", "ProductId": "PROD-123", "Quantity": -1}))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("Quantity must be at least 1")
    );
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn missing_fields_are_reported_as_required() {
    let broker = Arc::new(InMemoryBroker::new());
    let server = test_server(Arc::clone(&broker));

    let response = server.post("/api/orders").json(&json!({})).await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let message = response.json::<Value>()["message"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(message.contains("required"));
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn disconnected_broker_returns_503() {
    let broker = Arc::new(InMemoryBroker::new());
    broker.set_disconnected(true);
    let server = test_server(Arc::clone(&broker));

    let response = server
        .post("/api/orders")
        .json(&json!({"OrderId": "ORD-001", "ProductId": "PROD-123", "Quantity": 5}))
        .await;

    response.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn legacy_endpoint_echoes_the_bare_order() {
    let broker = Arc::new(InMemoryBroker::new());
    let server = test_server(Arc::clone(&broker));

    let response = server
        .post("/order")
        .json(&json!({"OrderId": "ORD-002", "ProductId": "PROD-123", "Quantity": 7}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    // Bare order, not the wrapped response.
    assert_eq!(body["orderId"], "ORD-002");
    assert_eq!(body["quantity"], 7);
    assert!(body.get("success").is_none());
}

#[tokio::test]
async fn legacy_endpoint_still_rejects_invalid_orders() {
    let broker = Arc::new(InMemoryBroker::new());
    let server = test_server(broker);

    let response = server
        .post("/order")
        .json(&json!({"OrderId": "ORD", "ProductId": "PROD-123", "Quantity": 5}))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["success"], false);
}

#[tokio::test]
async fn stats_count_accepted_orders_only() {
    let broker = Arc::new(InMemoryBroker::new());
    let server = test_server(broker);

    server
        .post("/api/orders")
        .json(&json!({"OrderId": "ORD-001", "ProductId": "PROD-123", "Quantity": 5}))
        .await;
    server
        .post("/api/orders")
        .json(&json!({"OrderId": "bad", "ProductId": "PROD-123", "Quantity": 5}))
        .await;

    let response = server.get("/api/orders/stats").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["totalAccepted"], 1);
    assert!(body["averageQuantity"].is_null());
}

#[tokio::test]
async fn validation_rules_are_served() {
    let broker = Arc::new(InMemoryBroker::new());
    let server = test_server(broker);

    let response = server.get("/api/validation-rules").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body.to_string().contains("PROD-"));
}

#[tokio::test]
async fn health_tracks_broker_connectivity() {
    let broker = Arc::new(InMemoryBroker::new());
    let server = test_server(Arc::clone(&broker));

    server.get("/health").await.assert_status_ok();

    broker.set_disconnected(true);
    server
        .get("/health")
        .await
        .assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
}
