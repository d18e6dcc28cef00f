//! Order ingestion service.
//!
//! Accepts orders over HTTP, validates them against the business rules, and
//! publishes accepted orders to the durable order queue. The service itself
//! is stateless apart from an accepted-order counter; everything downstream
//! (persistence, analytics) happens on the consumer side of the queue.
//!
//! # Request Flow
//!
//! 1. **HTTP request** arrives at an Axum handler
//! 2. **Parse** the order body (legacy PascalCase and camelCase both accepted)
//! 3. **Validate** via `OrderValidator` — all rule violations collected
//! 4. **Publish** to the order queue (persistent delivery)
//! 5. **Map outcome** to a response: 202 accepted, 400 invalid,
//!    503 broker unavailable, 500 publish failure
//!
//! The service layer never returns an error to the handler; every path
//! produces a [`CreateOrderOutcome`] carrying the response body.

pub mod config;
pub mod handlers;
pub mod router;
pub mod service;
pub mod stats;

// Re-export commonly used types
pub use config::IngestionConfig;
pub use router::app;
pub use service::{CreateOrderOutcome, OrderService};
pub use stats::{IngestionStats, StatsSnapshot};
