//! Recording transport for tests.
//!
//! Available inside this crate's tests and, with the `test-utils` feature,
//! to downstream crates:
//!
//! ```toml
//! [dev-dependencies]
//! tsuru-webhook = { version = "...", features = ["test-utils"] }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use jiff::Timestamp;

use crate::request::RequestDescriptor;
use crate::response::DeliveryResponse;
use crate::{Error, Result, WebhookTransport};

/// How the mock answers a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockResponse {
    /// Respond with this status code.
    Status(u16),
    /// Fail with a delivery error.
    Error,
    /// Never respond.
    Hang,
    /// Panic inside the delivery.
    Panic,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self::Status(200)
    }
}

#[derive(Debug, Default)]
struct MockTransportInner {
    default_response: MockResponse,
    responses: Mutex<HashMap<String, MockResponse>>,
    requests: Mutex<Vec<RequestDescriptor>>,
}

/// A [`WebhookTransport`] that records every request and answers from a
/// per-URL response table.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockTransportInner>,
}

impl MockTransport {
    /// Creates a transport answering `200 OK` to everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport answering every request with `response`.
    pub fn with_default(response: MockResponse) -> Self {
        Self {
            inner: Arc::new(MockTransportInner {
                default_response: response,
                ..Default::default()
            }),
        }
    }

    /// Answers requests to `url` with `response`.
    #[must_use]
    pub fn with_response_for(self, url: impl Into<String>, response: MockResponse) -> Self {
        self.inner
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), response);
        self
    }

    /// Returns every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait::async_trait]
impl WebhookTransport for MockTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<DeliveryResponse> {
        let started_at = Timestamp::now();
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let response = self
            .inner
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.url)
            .copied()
            .unwrap_or(self.inner.default_response);

        match response {
            MockResponse::Status(status_code) => Ok(DeliveryResponse::new(
                request.request_id,
                status_code,
                started_at,
            )),
            MockResponse::Error => Err(Error::delivery("connection refused")),
            MockResponse::Hang => std::future::pending().await,
            MockResponse::Panic => panic!("mock transport panicked for {}", request.url),
        }
    }
}
