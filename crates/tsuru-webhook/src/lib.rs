#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;

pub mod dispatcher;
pub mod event;
pub mod matcher;
pub mod registry;
pub mod render;
pub mod request;
pub mod response;
pub mod service;
pub mod webhook;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherStats, NotificationTask};
pub use error::{BoxedError, Error, Result, ValidationError};
pub use event::{EventStore, EventView, ExtraTarget, Kind, MemoryEventStore, Owner, Target};
pub use registry::{MemoryWebhookStorage, WebhookRegistry, WebhookStorage};
pub use render::{RenderedBody, Template, TemplateError};
pub use request::RequestDescriptor;
pub use response::DeliveryResponse;
pub use service::{ServiceConfig, WebhookService};
pub use webhook::{EventFilter, Headers, Webhook};

/// Transport that performs outbound webhook HTTP requests.
///
/// Implement this trait to deliver webhooks over a custom HTTP stack.
#[async_trait::async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Sends a single request and reports the endpoint's response.
    ///
    /// Any status code is a successful send; classifying non-2xx responses
    /// is up to the caller.
    async fn send(&self, request: &RequestDescriptor) -> Result<DeliveryResponse>;
}

#[async_trait::async_trait]
impl<T: WebhookTransport + ?Sized> WebhookTransport for std::sync::Arc<T> {
    async fn send(&self, request: &RequestDescriptor) -> Result<DeliveryResponse> {
        self.as_ref().send(request).await
    }
}
