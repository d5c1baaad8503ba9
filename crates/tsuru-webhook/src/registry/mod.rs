//! Webhook registry: validated CRUD over a [`WebhookStorage`].

mod storage;

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use url::Url;

pub use self::storage::{MemoryWebhookStorage, WebhookStorage};
use crate::webhook::Webhook;
use crate::{Error, Result, ValidationError};

/// Tracing target for registry operations.
pub const TRACING_TARGET: &str = "tsuru_webhook::registry";

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]{0,39}$").expect("valid regex"));

/// Checks a webhook's name, URL and proxy URL.
///
/// # Errors
///
/// Returns the first failing check, in the order name, URL, proxy URL.
pub fn validate(webhook: &Webhook) -> Result<(), ValidationError> {
    if webhook.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if !NAME_PATTERN.is_match(&webhook.name) {
        return Err(ValidationError::InvalidName);
    }
    if webhook.url.trim().is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    Url::parse(&webhook.url).map_err(ValidationError::InvalidUrl)?;
    if let Some(proxy_url) = webhook.proxy_url.as_deref().filter(|u| !u.is_empty()) {
        Url::parse(proxy_url).map_err(ValidationError::InvalidProxyUrl)?;
    }
    Ok(())
}

/// Validated access to registered webhooks.
///
/// The storage is wrapped in `Arc` for cheap cloning.
#[derive(Clone)]
pub struct WebhookRegistry {
    storage: Arc<dyn WebhookStorage>,
}

impl fmt::Debug for WebhookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookRegistry").finish_non_exhaustive()
    }
}

impl WebhookRegistry {
    /// Creates a registry over the given storage.
    pub fn new<S>(storage: S) -> Self
    where
        S: WebhookStorage + 'static,
    {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// Creates a registry over shared storage.
    pub fn from_shared(storage: Arc<dyn WebhookStorage>) -> Self {
        Self { storage }
    }

    /// Registers a new webhook.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for malformed input and
    /// [`Error::AlreadyExists`] if the name is taken.
    pub async fn create(&self, mut webhook: Webhook) -> Result<()> {
        validate(&webhook)?;
        webhook.normalize();
        let name = webhook.name.clone();

        self.storage.insert(webhook).await?;

        tracing::info!(target: TRACING_TARGET, webhook = %name, "Webhook created");
        Ok(())
    }

    /// Replaces every field of an existing webhook.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for malformed input and
    /// [`Error::NotFound`] if no webhook has this name.
    pub async fn update(&self, mut webhook: Webhook) -> Result<()> {
        validate(&webhook)?;
        webhook.normalize();
        let name = webhook.name.clone();

        self.storage.update(webhook).await?;

        tracing::info!(target: TRACING_TARGET, webhook = %name, "Webhook updated");
        Ok(())
    }

    /// Removes a webhook.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no webhook has this name.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.storage.remove(name).await?;

        tracing::info!(target: TRACING_TARGET, webhook = %name, "Webhook deleted");
        Ok(())
    }

    /// Returns the webhook with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no webhook has this name.
    pub async fn find(&self, name: &str) -> Result<Webhook> {
        self.storage.find(name).await?.ok_or(Error::NotFound)
    }

    /// Returns all webhooks.
    pub async fn list(&self) -> Result<Vec<Webhook>> {
        self.storage.list().await
    }

    /// Returns the webhooks owned by any of `teams`, or all webhooks if
    /// `teams` is empty.
    pub async fn list_by_teams(&self, teams: &[String]) -> Result<Vec<Webhook>> {
        if teams.is_empty() {
            return self.list().await;
        }
        self.storage.list_by_teams(teams).await
    }
}
