//! Reqwest-based HTTP transport for webhook delivery.

use std::collections::HashMap;
use std::sync::Arc;

use jiff::Timestamp;
use reqwest::header::{CONTENT_LENGTH, HeaderName, HeaderValue};
use reqwest::{Client, Method, Proxy};
use tokio::sync::RwLock;
use tsuru_webhook::{DeliveryResponse, RequestDescriptor, WebhookTransport};

use crate::{Error, ReqwestConfig, Result};

/// Tracing target for reqwest client operations.
pub const TRACING_TARGET: &str = "tsuru_reqwest::client";

/// Inner client that holds the HTTP clients and configuration.
struct ReqwestClientInner {
    direct: Client,
    proxied: RwLock<HashMap<String, Client>>,
    config: ReqwestConfig,
}

/// Reqwest-based HTTP client implementing [`WebhookTransport`].
///
/// Requests without a proxy share one connection pool. Each distinct proxy
/// URL gets its own client, created on first use and reused afterwards.
/// Environment proxy settings are ignored; only a webhook's own proxy URL
/// is used.
///
/// # Examples
///
/// ```rust,ignore
/// use tsuru_reqwest::{ReqwestClient, ReqwestConfig};
///
/// let client = ReqwestClient::new(ReqwestConfig::default())?;
/// let response = client.send(&request).await?;
/// ```
#[derive(Clone)]
pub struct ReqwestClient {
    inner: Arc<ReqwestClientInner>,
}

impl std::fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestClient {
    /// Creates a new reqwest client with the given configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the TLS backend cannot be
    /// initialized.
    pub fn new(config: ReqwestConfig) -> Result<Self> {
        config.validate()?;

        tracing::debug!(
            target: TRACING_TARGET,
            timeout_ms = config.timeout().as_millis(),
            connect_timeout_ms = config.connect_timeout().as_millis(),
            "Creating reqwest client"
        );

        let direct = Self::builder(&config).no_proxy().build()?;
        let inner = ReqwestClientInner {
            direct,
            proxied: RwLock::new(HashMap::new()),
            config,
        };

        tracing::info!(target: TRACING_TARGET, "Reqwest client created successfully");

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ReqwestConfig {
        &self.inner.config
    }

    fn builder(config: &ReqwestConfig) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
    }

    /// Returns the client for `proxy_url`, creating it on first use.
    async fn client_for(&self, proxy_url: Option<&str>) -> Result<Client> {
        let Some(proxy_url) = proxy_url else {
            return Ok(self.inner.direct.clone());
        };

        if let Some(client) = self.inner.proxied.read().await.get(proxy_url) {
            return Ok(client.clone());
        }

        let mut proxied = self.inner.proxied.write().await;
        if let Some(client) = proxied.get(proxy_url) {
            return Ok(client.clone());
        }

        let proxy = Proxy::all(proxy_url).map_err(|source| Error::Proxy {
            url: proxy_url.to_owned(),
            source,
        })?;
        let client = Self::builder(&self.inner.config).proxy(proxy).build()?;

        tracing::debug!(
            target: TRACING_TARGET,
            proxy_url,
            "Created client for proxy"
        );

        proxied.insert(proxy_url.to_owned(), client.clone());
        Ok(client)
    }

    async fn execute(&self, request: &RequestDescriptor) -> Result<DeliveryResponse> {
        let started_at = Timestamp::now();

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidMethod(request.method.clone()))?;
        let client = self.client_for(request.proxy_url.as_deref()).await?;

        let mut http_request = client.request(method, request.url.as_str());
        for (name, values) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidHeader(name.clone()))?;
            // Derived from the body by the client.
            if name == CONTENT_LENGTH {
                continue;
            }
            for value in values {
                let value = HeaderValue::from_str(value)
                    .map_err(|_| Error::InvalidHeader(name.to_string()))?;
                http_request = http_request.header(name.clone(), value);
            }
        }
        if let Some(timeout) = request.timeout {
            http_request = http_request.timeout(timeout);
        }

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            method = %request.method,
            url = %request.url,
            proxied = request.proxy_url.is_some(),
            "Sending webhook request"
        );

        let http_response = http_request.body(request.body.clone()).send().await?;

        let status_code = http_response.status().as_u16();
        let response = DeliveryResponse::new(request.request_id, status_code, started_at);

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            status_code,
            success = response.is_success(),
            "Webhook request completed"
        );

        Ok(response)
    }
}

#[async_trait::async_trait]
impl WebhookTransport for ReqwestClient {
    async fn send(&self, request: &RequestDescriptor) -> tsuru_webhook::Result<DeliveryResponse> {
        Ok(self.execute(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::pending;
    use std::sync::Arc;

    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tsuru_webhook::{
        EventFilter, EventView, Kind, MemoryEventStore, MemoryWebhookStorage, Owner, RenderedBody,
        ServiceConfig, Target, Webhook, WebhookService,
    };

    use super::*;

    /// A request as received on the wire.
    #[derive(Debug)]
    struct CapturedRequest {
        request_line: String,
        /// Header names lowercased.
        headers: HashMap<String, String>,
        body: Vec<u8>,
    }

    impl CapturedRequest {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
        }
    }

    /// Accepts one connection, captures the request and answers with `status`.
    async fn capture_one(status: u16) -> (String, oneshot::Receiver<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);

            let mut request_line = String::new();
            reader.read_line(&mut request_line).await.unwrap();

            let mut headers = HashMap::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                let (name, value) = line.split_once(':').unwrap();
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
            }

            let length: usize = headers
                .get("content-length")
                .map(|v| v.parse().unwrap())
                .unwrap_or(0);
            let mut body = vec![0; length];
            reader.read_exact(&mut body).await.unwrap();

            let response =
                format!("HTTP/1.1 {status} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            reader.get_mut().write_all(response.as_bytes()).await.unwrap();
            reader.get_mut().shutdown().await.unwrap();

            let _ = tx.send(CapturedRequest {
                request_line: request_line.trim_end().to_owned(),
                headers,
                body,
            });
        });

        (format!("127.0.0.1:{}", addr.port()), rx)
    }

    fn event() -> EventView {
        EventView::new(
            Target::new("app", "myapp"),
            Kind::new("app.update.env.set"),
            Owner::new("user", "me@me.com"),
        )
        .with_extra_target(Target::new("app", "xapp1"))
        .with_extra_target(Target::new("app", "xapp2"))
        .finish(None)
    }

    async fn notify_one(webhook: Webhook, event: EventView) -> WebhookService {
        let events = Arc::new(MemoryEventStore::new());
        let event_id = event.unique_id;
        events.insert(event).await;

        let transport = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let service = WebhookService::new(
            ServiceConfig::default(),
            MemoryWebhookStorage::new(),
            events,
            transport,
        )
        .unwrap();

        service.create(webhook).await.unwrap();
        assert_eq!(service.notify(event_id).await.unwrap(), 1);
        service.shutdown(pending()).await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_templated_body() {
        let (addr, captured) = capture_one(200).await;
        let webhook = Webhook::new("xyz", format!("http://{addr}/a/b/c?a=b&c=d"))
            .with_method("PUT")
            .with_header("X-Ahoy", "Errrr")
            .with_body("{{.Kind.Name}} event for {{.Target.Type}} named {{.Target.Value}}")
            .with_event_filter(EventFilter::default().with_target_type("app"));

        let service = notify_one(webhook, event()).await;
        let request = captured.await.unwrap();

        assert_eq!(request.request_line, "PUT /a/b/c?a=b&c=d HTTP/1.1");
        assert_eq!(request.body, b"app.update.env.set event for app named myapp");
        assert_eq!(request.header("Content-Length"), Some("44"));
        assert_eq!(request.header("User-Agent"), Some("tsuru-webhook-client/1.0"));
        assert_eq!(request.header("Accept-Encoding"), Some("gzip"));
        assert_eq!(request.header("X-Ahoy"), Some("Errrr"));
        assert!(request.header("Content-Type").is_none());
        assert_eq!(service.stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_malformed_template_is_sent_verbatim() {
        let (addr, captured) = capture_one(200).await;
        let webhook = Webhook::new("xyz", format!("http://{addr}/")).with_body("ahoy {{ --");

        notify_one(webhook, event()).await;
        let request = captured.await.unwrap();

        assert_eq!(request.request_line, "POST / HTTP/1.1");
        assert_eq!(request.body, b"ahoy {{ --");
        assert_eq!(request.header("Content-Length"), Some("10"));
    }

    #[tokio::test]
    async fn test_default_body_is_event_json() {
        let (addr, captured) = capture_one(200).await;
        let event = event();
        let webhook = Webhook::new("xyz", format!("http://{addr}/"));

        notify_one(webhook, event.clone()).await;
        let request = captured.await.unwrap();

        assert_eq!(request.header("Content-Type"), Some("application/json"));
        let decoded: EventView = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(decoded, event);
    }

    #[tokio::test]
    async fn test_request_through_proxy() {
        let (proxy_addr, captured) = capture_one(200).await;
        let webhook = Webhook::new("xyz", "http://xyz/")
            .with_proxy_url(format!("http://{proxy_addr}"))
            .with_body("ahoy");

        notify_one(webhook, event()).await;
        let request = captured.await.unwrap();

        assert_eq!(request.request_line, "POST http://xyz/ HTTP/1.1");
        assert_eq!(request.body, b"ahoy");
    }

    #[tokio::test]
    async fn test_error_status_counts_as_failure() {
        let (addr, captured) = capture_one(500).await;
        let webhook = Webhook::new("xyz", format!("http://{addr}/")).with_body("ahoy");

        let service = notify_one(webhook, event()).await;
        captured.await.unwrap();

        let stats = service.stats();
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.failed, 1);
    }

    fn descriptor(url: &str) -> RequestDescriptor {
        let body = RenderedBody {
            bytes: b"ahoy".to_vec(),
            is_default_json: false,
        };
        RequestDescriptor::build(&Webhook::new("xyz", url), body)
    }

    #[tokio::test]
    async fn test_send_returns_status() {
        let (addr, captured) = capture_one(204).await;
        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();

        let request = descriptor(&format!("http://{addr}/"));
        let response = client.send(&request).await.unwrap();

        assert_eq!(response.status_code, 204);
        assert_eq!(response.request_id, request.request_id);
        assert!(response.is_success());
        assert_eq!(captured.await.unwrap().body, b"ahoy");
    }

    #[tokio::test]
    async fn test_invalid_method() {
        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let mut request = descriptor("http://127.0.0.1:1/");
        request.method = "BAD METHOD".into();

        let err = client.send(&request).await.unwrap_err();
        assert!(err.is_delivery());
        assert!(err.to_string().contains("invalid HTTP method"));
    }

    #[tokio::test]
    async fn test_invalid_header_value() {
        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let mut request = descriptor("http://127.0.0.1:1/");
        request
            .headers
            .insert("X-Bad".into(), vec!["line\nbreak".into()]);

        let err = client.send(&request).await.unwrap_err();
        assert!(err.to_string().contains("invalid header"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_delivery_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let err = client
            .send(&descriptor(&format!("http://{addr}/")))
            .await
            .unwrap_err();
        assert!(err.is_delivery());
    }

    #[tokio::test]
    async fn test_proxy_clients_are_reused() {
        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        client.client_for(Some("http://proxy-a:3128")).await.unwrap();
        client.client_for(Some("http://proxy-a:3128")).await.unwrap();
        client.client_for(Some("http://proxy-b:3128")).await.unwrap();
        client.client_for(None).await.unwrap();

        assert_eq!(client.inner.proxied.read().await.len(), 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = ReqwestClient::new(ReqwestConfig::new(0)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
