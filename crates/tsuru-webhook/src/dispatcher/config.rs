//! Dispatcher configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default number of concurrent deliveries.
pub const DEFAULT_WORKERS: usize = 8;

/// Default number of tasks the queue holds before `submit` waits.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default per-request timeout: 30 seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Delivery pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct DispatcherConfig {
    /// Maximum deliveries in flight at once.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "webhook-workers",
            env = "WEBHOOK_WORKERS",
            default_value_t = DEFAULT_WORKERS
        )
    )]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the task queue.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "webhook-queue-capacity",
            env = "WEBHOOK_QUEUE_CAPACITY",
            default_value_t = DEFAULT_QUEUE_CAPACITY
        )
    )]
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Timeout applied to every outbound request, in seconds.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "webhook-request-timeout",
            env = "WEBHOOK_REQUEST_TIMEOUT",
            default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
        )
    )]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl DispatcherConfig {
    /// Sets the number of concurrent deliveries.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Sets the per-request timeout in seconds.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout_secs: u64) -> Self {
        self.request_timeout_secs = timeout_secs;
        self
    }

    /// Returns the per-request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers cannot be zero".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue capacity cannot be zero".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request timeout cannot be zero".into()));
        }
        Ok(())
    }
}
