//! Notification service: the entry point the platform calls.

mod config;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

pub use self::config::{DEFAULT_SHUTDOWN_TIMEOUT_SECS, ServiceConfig};
use crate::dispatcher::{Dispatcher, DispatcherStats, NotificationTask};
use crate::event::EventStore;
use crate::registry::{WebhookRegistry, WebhookStorage};
use crate::render::render;
use crate::webhook::Webhook;
use crate::{Result, WebhookTransport};

/// Tracing target for notification operations.
pub const TRACING_TARGET: &str = "tsuru_webhook::service";

struct WebhookServiceInner {
    registry: WebhookRegistry,
    events: Arc<dyn EventStore>,
    dispatcher: Dispatcher,
    config: ServiceConfig,
}

/// Webhook notification service.
///
/// Owns the registry and the delivery pipeline. Cloning is cheap and every
/// clone shares the same dispatcher.
///
/// # Examples
///
/// ```rust,ignore
/// use tsuru_webhook::{MemoryEventStore, MemoryWebhookStorage, ServiceConfig, WebhookService};
///
/// let service = WebhookService::new(
///     ServiceConfig::default(),
///     MemoryWebhookStorage::new(),
///     MemoryEventStore::new(),
///     transport,
/// )?;
///
/// service.create(Webhook::new("deploys", "https://hooks.example.com/")).await?;
/// service.notify(event_id).await?;
/// service.shutdown_gracefully().await?;
/// ```
#[derive(Clone)]
pub struct WebhookService {
    inner: Arc<WebhookServiceInner>,
}

impl fmt::Debug for WebhookService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookService")
            .field("config", &self.inner.config)
            .field("dispatcher", &self.inner.dispatcher)
            .finish_non_exhaustive()
    }
}

impl WebhookService {
    /// Creates the service and starts its dispatcher on the current Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if `config` does not
    /// validate.
    pub fn new<S, E, T>(config: ServiceConfig, storage: S, events: E, transport: T) -> Result<Self>
    where
        S: WebhookStorage + 'static,
        E: EventStore + 'static,
        T: WebhookTransport + 'static,
    {
        config.validate()?;
        let dispatcher = Dispatcher::spawn(config.dispatcher.clone(), transport)?;

        let inner = WebhookServiceInner {
            registry: WebhookRegistry::new(storage),
            events: Arc::new(events),
            dispatcher,
            config,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Notifies every webhook whose filter matches the event.
    ///
    /// Returns the number of deliveries submitted. Delivery outcomes are
    /// not reported here; an unknown event submits nothing.
    ///
    /// # Errors
    ///
    /// Fails if the event store or webhook storage fails, or with
    /// [`Error::Closed`](crate::Error::Closed) after shutdown.
    #[tracing::instrument(skip_all, fields(event_id = %event_id), target = TRACING_TARGET)]
    pub async fn notify(&self, event_id: Uuid) -> Result<usize> {
        let Some(event) = self.inner.events.get_by_id(event_id).await? else {
            tracing::debug!(target: TRACING_TARGET, "Event not found, nothing to notify");
            return Ok(0);
        };
        let event = Arc::new(event);

        let webhooks = self.inner.registry.list().await?;
        let mut submitted = 0;

        for webhook in webhooks {
            if !webhook.event_filter.matches(&event) {
                continue;
            }

            let body = render(&webhook.body, &event)?;
            tracing::trace!(
                target: TRACING_TARGET,
                webhook = %webhook.name,
                body_len = body.len(),
                "Submitting notification"
            );

            let task = NotificationTask::new(webhook, event.clone(), body);
            self.inner.dispatcher.submit(task).await?;
            submitted += 1;
        }

        tracing::debug!(
            target: TRACING_TARGET,
            kind = %event.kind.name,
            submitted,
            "Event notifications submitted"
        );
        Ok(submitted)
    }

    /// Returns the webhook registry.
    pub fn registry(&self) -> &WebhookRegistry {
        &self.inner.registry
    }

    /// Registers a new webhook. See [`WebhookRegistry::create`].
    pub async fn create(&self, webhook: Webhook) -> Result<()> {
        self.inner.registry.create(webhook).await
    }

    /// Replaces an existing webhook. See [`WebhookRegistry::update`].
    pub async fn update(&self, webhook: Webhook) -> Result<()> {
        self.inner.registry.update(webhook).await
    }

    /// Removes a webhook. See [`WebhookRegistry::delete`].
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.inner.registry.delete(name).await
    }

    /// Returns a webhook by name. See [`WebhookRegistry::find`].
    pub async fn find(&self, name: &str) -> Result<Webhook> {
        self.inner.registry.find(name).await
    }

    /// Returns all webhooks.
    pub async fn list(&self) -> Result<Vec<Webhook>> {
        self.inner.registry.list().await
    }

    /// Returns the webhooks owned by any of `teams`.
    pub async fn list_by_teams(&self, teams: &[String]) -> Result<Vec<Webhook>> {
        self.inner.registry.list_by_teams(teams).await
    }

    /// Returns a snapshot of the delivery counters.
    pub fn stats(&self) -> DispatcherStats {
        self.inner.dispatcher.stats()
    }

    /// Returns the service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Stops accepting notifications and drains outstanding deliveries
    /// until `deadline` completes. See [`Dispatcher::shutdown`].
    pub async fn shutdown<F>(&self, deadline: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.inner.dispatcher.shutdown(deadline).await
    }

    /// Shuts down with the configured shutdown timeout as the deadline.
    pub async fn shutdown_gracefully(&self) -> Result<()> {
        let timeout = self.inner.config.shutdown_timeout();
        self.shutdown(tokio::time::sleep(timeout)).await
    }
}
