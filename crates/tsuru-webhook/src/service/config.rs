//! Notification service configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::dispatcher::DispatcherConfig;

/// Default time allowed for draining deliveries on shutdown: 30 seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Complete notification service configuration.
///
/// This is the configuration passed to [`WebhookService::new`].
///
/// [`WebhookService::new`]: super::WebhookService::new
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ServiceConfig {
    /// Delivery pipeline configuration.
    #[cfg_attr(feature = "config", command(flatten))]
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Seconds [`WebhookService::shutdown_gracefully`] waits for outstanding
    /// deliveries.
    ///
    /// [`WebhookService::shutdown_gracefully`]: super::WebhookService::shutdown_gracefully
    #[cfg_attr(
        feature = "config",
        arg(
            long = "webhook-shutdown-timeout",
            env = "WEBHOOK_SHUTDOWN_TIMEOUT",
            default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS
        )
    )]
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl ServiceConfig {
    /// Creates a configuration with the given dispatcher settings.
    pub fn new(dispatcher: DispatcherConfig) -> Self {
        Self {
            dispatcher,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }

    /// Sets the graceful shutdown timeout in seconds.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout_secs: u64) -> Self {
        self.shutdown_timeout_secs = timeout_secs;
        self
    }

    /// Returns the graceful shutdown timeout as a Duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Checks that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        self.dispatcher.validate()
    }
}
