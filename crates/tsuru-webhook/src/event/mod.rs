//! Read-only view of completed platform events.
//!
//! Events are owned by the platform's event store; this crate only reads
//! them. The serialized form of [`EventView`] is the default webhook body,
//! so field order and key names follow the external event schema.

mod store;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use self::store::{EventStore, MemoryEventStore};

/// A resource an event acted upon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Resource type, e.g. `app`.
    #[serde(rename = "Type")]
    pub target_type: String,
    /// Resource identifier, e.g. the app name.
    #[serde(rename = "Value")]
    pub value: String,
}

impl Target {
    /// Creates a new target.
    pub fn new(target_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            value: value.into(),
        }
    }
}

/// A secondary resource affected by an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtraTarget {
    pub target: Target,
    #[serde(default)]
    pub lock: bool,
}

impl From<Target> for ExtraTarget {
    fn from(target: Target) -> Self {
        Self {
            target,
            lock: false,
        }
    }
}

/// Dotted classification of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kind {
    /// Leading component of the name, e.g. `app`.
    #[serde(rename = "Type")]
    pub kind_type: String,
    /// Fully qualified name, e.g. `app.update.env.set`.
    #[serde(rename = "Name")]
    pub name: String,
}

impl Kind {
    /// Creates a kind from its qualified name, deriving the type from the
    /// leading dotted component.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind_type = name.split('.').next().unwrap_or_default().to_owned();
        Self { kind_type, name }
    }
}

/// Who triggered an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Owner category, e.g. `user` or `token`.
    #[serde(rename = "Type")]
    pub owner_type: String,
    /// Owner identifier, e.g. an email.
    #[serde(rename = "Name")]
    pub name: String,
}

impl Owner {
    /// Creates a new owner.
    pub fn new(owner_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            name: name.into(),
        }
    }
}

/// Snapshot of a platform event as exposed to webhooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventView {
    #[serde(rename = "UniqueID")]
    pub unique_id: Uuid,
    pub start_time: Timestamp,
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    pub target: Target,
    #[serde(default)]
    pub extra_targets: Vec<ExtraTarget>,
    pub kind: Kind,
    pub owner: Owner,
    /// Error message; empty when the event succeeded.
    #[serde(default)]
    pub error: String,
    /// Result payload recorded on completion.
    #[serde(default)]
    pub end_custom_data: serde_json::Value,
    #[serde(default)]
    pub cancelable: bool,
    #[serde(default)]
    pub running: bool,
}

impl EventView {
    /// Creates a running event started now.
    pub fn new(target: Target, kind: Kind, owner: Owner) -> Self {
        Self {
            unique_id: Uuid::now_v7(),
            start_time: Timestamp::now(),
            end_time: None,
            target,
            extra_targets: Vec::new(),
            kind,
            owner,
            error: String::new(),
            end_custom_data: serde_json::Value::Null,
            cancelable: false,
            running: true,
        }
    }

    /// Adds a secondary target.
    pub fn with_extra_target(mut self, target: Target) -> Self {
        self.extra_targets.push(target.into());
        self
    }

    /// Sets the result payload.
    pub fn with_end_custom_data(mut self, data: serde_json::Value) -> Self {
        self.end_custom_data = data;
        self
    }

    /// Marks the event as done, recording the error message if it failed.
    pub fn finish(mut self, error: Option<String>) -> Self {
        self.end_time = Some(Timestamp::now());
        self.running = false;
        self.error = error.unwrap_or_default();
        self
    }

    /// Returns all targets: the primary one first, then the extra targets in order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        std::iter::once(&self.target).chain(self.extra_targets.iter().map(|t| &t.target))
    }

    /// Returns `true` if the event completed without an error.
    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}
