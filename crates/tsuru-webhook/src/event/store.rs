//! Event store interface.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::EventView;
use crate::Result;

/// Read access to the platform's event store.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    /// Looks up an event by its unique identifier.
    ///
    /// Returns `Ok(None)` when no such event exists.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<EventView>>;
}

#[async_trait::async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<EventView>> {
        self.as_ref().get_by_id(id).await
    }
}

/// In-memory event store.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<Uuid, EventView>>,
}

impl MemoryEventStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event, replacing any previous version with the same id.
    pub async fn insert(&self, event: EventView) {
        self.events.write().await.insert(event.unique_id, event);
    }
}

#[async_trait::async_trait]
impl EventStore for MemoryEventStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<EventView>> {
        Ok(self.events.read().await.get(&id).cloned())
    }
}
