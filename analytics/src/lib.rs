//! Order analytics service.
//!
//! The downstream half of the pipeline: consumes accepted orders from the
//! durable queue, persists them idempotently, and serves a read API over the
//! persisted documents.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐     ┌────────────────┐     ┌──────────────┐
//! │  order queue  │────►│ OrderProcessor │────►│   Postgres   │
//! │ (at-least-    │     │ (upsert, dead- │     │  orders +    │
//! │  once)        │     │  letter)       │     │ failed_orders│
//! └───────────────┘     └────────────────┘     └──────┬───────┘
//!                                                     │
//!                                              ┌──────▼───────┐
//!                                              │   read API   │
//!                                              │ list/get/    │
//!                                              │ delete/stats │
//!                                              └──────────────┘
//! ```
//!
//! The consumer task and the HTTP server run side by side in one process and
//! share the store; both drain on shutdown.

pub mod config;
pub mod handlers;
pub mod processor;
pub mod router;

// Re-export commonly used types
pub use config::AnalyticsConfig;
pub use processor::OrderProcessor;
pub use router::app;
