use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    /// Tasks accepted by `submit`.
    pub submitted: u64,
    /// Deliveries answered with a 2xx status.
    pub delivered: u64,
    /// Deliveries that errored, timed out, panicked or got a non-2xx status.
    pub failed: u64,
}

impl DispatcherStats {
    /// Returns the number of accepted tasks without an outcome yet.
    pub fn pending(&self) -> u64 {
        self.submitted
            .saturating_sub(self.delivered)
            .saturating_sub(self.failed)
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    submitted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl StatsCounters {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn revert_submitted(&self) {
        self.submitted.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
