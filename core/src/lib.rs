//! # Orderflow Core
//!
//! Core domain types and traits for the Orderflow order pipeline.
//!
//! This crate provides the pure, I/O-free heart of the system:
//!
//! - **Domain model**: [`order::Order`], [`order::OrderId`], [`order::ProductId`]
//! - **Validation**: [`validation::OrderValidator`] with collect-all-errors semantics
//! - **Wire contract**: [`message`] encoding for the `order_placed` queue
//! - **Capabilities**: [`broker::OrderPublisher`] and [`repository::OrderRepository`]
//!   traits implemented by the broker and store crates
//!
//! ## Architecture Principles
//!
//! - Pure domain core, imperative shells at the edges
//! - Explicit capabilities injected via trait objects
//! - At-least-once delivery downstream, so persistence is idempotent
//!
//! ## Example
//!
//! ```
//! use orderflow_core::order::{Order, OrderId, ProductId};
//! use orderflow_core::validation::OrderValidator;
//! use chrono::Utc;
//!
//! let order = Order::new(
//!     OrderId::new("ORD-001".to_string()),
//!     ProductId::new("PROD-123".to_string()),
//!     5,
//! );
//!
//! let result = OrderValidator::validate(&order, Utc::now());
//! assert!(result.is_valid);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod broker;
pub mod environment;
pub mod message;
pub mod order;
pub mod repository;
pub mod validation;
