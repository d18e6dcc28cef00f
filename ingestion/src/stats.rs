//! Accepted-order counters for the ingestion service.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters owned by the service and shared across request handlers.
///
/// Injected rather than static so tests get a fresh instance per case.
#[derive(Debug)]
pub struct IngestionStats {
    accepted: AtomicU64,
    started_at: DateTime<Utc>,
}

impl IngestionStats {
    /// Create counters with the given start time.
    #[must_use]
    pub const fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            accepted: AtomicU64::new(0),
            started_at,
        }
    }

    /// Count one accepted order.
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Total orders accepted since startup.
    #[must_use]
    pub fn total_accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Snapshot the counters as of `now`.
    #[must_use]
    pub fn snapshot(&self, now: DateTime<Utc>) -> StatsSnapshot {
        let total_accepted = self.total_accepted();
        #[allow(clippy::cast_precision_loss)] // display figure, not arithmetic
        let hours_uptime = (now - self.started_at).num_seconds().max(0) as f64 / 3600.0;
        #[allow(clippy::cast_precision_loss)]
        let orders_per_hour = if hours_uptime < 1.0 {
            // Raw count until a full hour of uptime; a rate over minutes of
            // uptime reads as wildly inflated.
            total_accepted as f64
        } else {
            total_accepted as f64 / hours_uptime
        };

        StatsSnapshot {
            total_accepted,
            orders_per_hour,
            // Quantities are not tracked at ingestion; the analytics store
            // owns the real aggregate.
            average_quantity: None,
            started_at: self.started_at,
        }
    }
}

/// Point-in-time view of the ingestion counters.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Orders accepted since startup
    pub total_accepted: u64,
    /// Acceptance rate per hour of uptime (raw count below one hour)
    pub orders_per_hour: f64,
    /// Always `None`; served for response-shape compatibility
    pub average_quantity: Option<f64>,
    /// When the service started
    pub started_at: DateTime<Utc>,
}
