//! Outbound webhook request construction.

use std::time::Duration;

use uuid::Uuid;

use crate::render::RenderedBody;
use crate::webhook::{Headers, Webhook, canonical_header_name};

/// Method used when the webhook does not configure one.
pub const DEFAULT_METHOD: &str = "POST";

/// Default `User-Agent` header value.
pub const USER_AGENT: &str = "tsuru-webhook-client/1.0";

/// `Content-Type` used for the default JSON body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Transport-independent description of a webhook HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Unique identifier for this request.
    pub request_id: Uuid,
    /// Name of the webhook the request is delivered for.
    pub webhook: String,
    /// HTTP method.
    pub method: String,
    /// Destination URL, exactly as configured.
    pub url: String,
    /// Forward proxy to connect through.
    pub proxy_url: Option<String>,
    /// Request headers keyed by canonical name.
    pub headers: Headers,
    /// Request body.
    pub body: Vec<u8>,
    /// Per-request timeout (uses the transport default if not set).
    pub timeout: Option<Duration>,
}

impl RequestDescriptor {
    /// Builds the request for delivering `body` to `webhook`.
    ///
    /// Webhook headers overlay the defaults (`User-Agent`, `Accept-Encoding`).
    /// `Content-Length` always reflects the body, and `Content-Type:
    /// application/json` is added for the default event body unless the
    /// webhook sets its own.
    pub fn build(webhook: &Webhook, body: RenderedBody) -> Self {
        let method = webhook
            .method
            .as_deref()
            .filter(|method| !method.is_empty())
            .unwrap_or(DEFAULT_METHOD)
            .to_owned();

        let mut headers = Headers::from([
            ("User-Agent".to_owned(), vec![USER_AGENT.to_owned()]),
            ("Accept-Encoding".to_owned(), vec!["gzip".to_owned()]),
        ]);
        for (name, values) in &webhook.headers {
            headers.insert(canonical_header_name(name), values.clone());
        }

        headers.insert("Content-Length".to_owned(), vec![body.len().to_string()]);
        if body.is_default_json && !headers.contains_key("Content-Type") {
            headers.insert("Content-Type".to_owned(), vec![JSON_CONTENT_TYPE.to_owned()]);
        }

        Self {
            request_id: Uuid::now_v7(),
            webhook: webhook.name.clone(),
            method,
            url: webhook.url.clone(),
            proxy_url: webhook.proxy_url.clone().filter(|url| !url.is_empty()),
            headers,
            body: body.bytes,
            timeout: None,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the first value of a header, looked up by canonical name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&canonical_header_name(name))
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}
