//! Ingestion service configuration.

use orderflow_core::message;

/// Configuration read from the environment at startup.
#[derive(Clone, Debug)]
pub struct IngestionConfig {
    /// Kafka broker addresses (comma-separated)
    pub brokers: String,
    /// Queue (topic) accepted orders are published to
    pub queue: String,
    /// Address the HTTP server binds to
    pub listen_addr: String,
}

impl IngestionConfig {
    /// Read configuration from the environment, with defaults suitable for
    /// local development.
    ///
    /// Variables: `KAFKA_BROKERS`, `ORDER_QUEUE`, `LISTEN_ADDR`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            brokers: std::env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            queue: std::env::var("ORDER_QUEUE")
                .unwrap_or_else(|_| message::DEFAULT_QUEUE.to_string()),
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        // Env vars are process-global; only assert the defaults that are not
        // overridden in CI.
        let config = IngestionConfig::from_env();
        assert!(!config.brokers.is_empty());
        assert!(!config.queue.is_empty());
        assert!(!config.listen_addr.is_empty());
    }
}
