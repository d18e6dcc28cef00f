//! Order ingestion API server.
//!
//! # Usage
//!
//! ```bash
//! KAFKA_BROKERS=localhost:9092 ORDER_QUEUE=order_placed LISTEN_ADDR=0.0.0.0:3000 \
//!   cargo run --bin orderflow-ingestion
//! ```
//!
//! # API Endpoints
//!
//! - `POST /api/orders` - Submit an order
//! - `GET /api/orders/stats` - Acceptance statistics
//! - `GET /api/validation-rules` - Validation rule descriptions
//! - `POST /order` - Legacy submission path
//! - `GET /health` - Broker-aware health check
//!
//! # Example Request
//!
//! ```bash
//! curl -X POST http://localhost:3000/api/orders \
//!   -H "Content-Type: application/json" \
//!   -d '{"OrderId": "ORD-001", "ProductId": "PROD-123", "Quantity": 5}'
//! ```

use orderflow_broker::{KafkaOrderBus, RECONNECT_DELAY};
use orderflow_core::broker::OrderPublisher;
use orderflow_core::environment::SystemClock;
use orderflow_ingestion::{IngestionConfig, IngestionStats, OrderService};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = IngestionConfig::from_env();
    info!(
        brokers = %config.brokers,
        queue = %config.queue,
        listen_addr = %config.listen_addr,
        "Starting order ingestion service"
    );

    let bus = Arc::new(
        KafkaOrderBus::builder()
            .brokers(&config.brokers)
            .queue(&config.queue)
            .build()?,
    );

    // Probe the broker until the first connection succeeds; the API serves
    // (and 503s) in the meantime. Publish outcomes keep the status fresh
    // afterwards.
    let probe_bus = Arc::clone(&bus);
    tokio::spawn(async move {
        loop {
            if probe_bus.refresh_connection().await {
                info!("Connected to order broker");
                break;
            }
            tracing::warn!(delay = ?RECONNECT_DELAY, "Broker unreachable, retrying");
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    });

    let stats = Arc::new(IngestionStats::new(chrono::Utc::now()));
    let publisher: Arc<dyn OrderPublisher> = Arc::clone(&bus) as Arc<dyn OrderPublisher>;
    let service = Arc::new(OrderService::new(publisher, stats, Arc::new(SystemClock)));

    let app = orderflow_ingestion::app(service);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Ingestion API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    bus.close();
    info!("Ingestion service stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
