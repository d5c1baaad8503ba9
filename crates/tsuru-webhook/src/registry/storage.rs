//! Webhook storage interface and the in-memory implementation.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tokio::sync::RwLock;

use crate::webhook::Webhook;
use crate::{Error, Result};

/// Name-keyed webhook persistence.
///
/// Implementations must make [`insert`](WebhookStorage::insert) atomic:
/// concurrent inserts of the same name must result in exactly one success.
#[async_trait::async_trait]
pub trait WebhookStorage: Send + Sync {
    /// Inserts a new webhook, failing with [`Error::AlreadyExists`] if the name is taken.
    async fn insert(&self, webhook: Webhook) -> Result<()>;

    /// Replaces an existing webhook, failing with [`Error::NotFound`] if absent.
    async fn update(&self, webhook: Webhook) -> Result<()>;

    /// Removes a webhook, failing with [`Error::NotFound`] if absent.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Looks up a webhook by name.
    async fn find(&self, name: &str) -> Result<Option<Webhook>>;

    /// Lists all webhooks.
    async fn list(&self) -> Result<Vec<Webhook>>;

    /// Lists webhooks owned by any of `teams`.
    async fn list_by_teams(&self, teams: &[String]) -> Result<Vec<Webhook>> {
        let webhooks = self.list().await?;
        Ok(webhooks
            .into_iter()
            .filter(|w| w.team_owner.as_ref().is_some_and(|team| teams.contains(team)))
            .collect())
    }
}

/// In-memory webhook storage ordered by name.
#[derive(Debug, Default)]
pub struct MemoryWebhookStorage {
    webhooks: RwLock<BTreeMap<String, Webhook>>,
}

impl MemoryWebhookStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl WebhookStorage for MemoryWebhookStorage {
    async fn insert(&self, webhook: Webhook) -> Result<()> {
        match self.webhooks.write().await.entry(webhook.name.clone()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists),
            Entry::Vacant(entry) => {
                entry.insert(webhook);
                Ok(())
            }
        }
    }

    async fn update(&self, webhook: Webhook) -> Result<()> {
        let mut webhooks = self.webhooks.write().await;
        let stored = webhooks.get_mut(&webhook.name).ok_or(Error::NotFound)?;
        *stored = webhook;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.webhooks
            .write()
            .await
            .remove(name)
            .map(drop)
            .ok_or(Error::NotFound)
    }

    async fn find(&self, name: &str) -> Result<Option<Webhook>> {
        Ok(self.webhooks.read().await.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<Webhook>> {
        Ok(self.webhooks.read().await.values().cloned().collect())
    }
}
