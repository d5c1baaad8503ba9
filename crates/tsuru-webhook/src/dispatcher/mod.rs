//! Asynchronous webhook delivery.
//!
//! Notification tasks go into a bounded queue drained by a background loop.
//! The loop runs at most [`DispatcherConfig::workers`] deliveries at a time,
//! each a single attempt under the configured request timeout. Outcomes are
//! logged and counted, never returned to the submitter.

mod config;
mod stats;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

pub use self::config::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_WORKERS, DispatcherConfig,
};
pub use self::stats::DispatcherStats;
use self::stats::StatsCounters;
use crate::event::EventView;
use crate::render::RenderedBody;
use crate::request::RequestDescriptor;
use crate::webhook::Webhook;
use crate::{Error, Result, WebhookTransport};

/// Tracing target for delivery operations.
pub const TRACING_TARGET: &str = "tsuru_webhook::dispatcher";

/// One delivery: a matching webhook, the event it matched and the body
/// rendered for it.
#[derive(Debug, Clone)]
pub struct NotificationTask {
    /// The webhook to deliver to.
    pub webhook: Webhook,
    /// Shared snapshot of the event.
    pub event: Arc<EventView>,
    /// Pre-rendered request body.
    pub body: RenderedBody,
}

impl NotificationTask {
    /// Creates a new task.
    pub fn new(webhook: Webhook, event: Arc<EventView>, body: RenderedBody) -> Self {
        Self {
            webhook,
            event,
            body,
        }
    }
}

struct DispatcherInner {
    sender: Mutex<Option<mpsc::Sender<NotificationTask>>>,
    dispatch_loop: Mutex<Option<JoinHandle<()>>>,
    abort: CancellationToken,
    stats: Arc<StatsCounters>,
    config: DispatcherConfig,
}

/// Handle to the delivery pipeline.
///
/// Cloning is cheap; all clones feed the same queue.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Starts the dispatch loop on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` does not validate.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn spawn<T>(config: DispatcherConfig, transport: T) -> Result<Self>
    where
        T: WebhookTransport + 'static,
    {
        Self::spawn_shared(config, Arc::new(transport))
    }

    /// Starts the dispatch loop over a shared transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` does not validate.
    pub fn spawn_shared(
        config: DispatcherConfig,
        transport: Arc<dyn WebhookTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let stats = Arc::new(StatsCounters::default());
        let abort = CancellationToken::new();

        let dispatch_loop = DispatchLoop {
            receiver,
            transport,
            semaphore: Arc::new(Semaphore::new(config.workers)),
            abort: abort.clone(),
            stats: stats.clone(),
            timeout: config.request_timeout(),
        };

        tracing::info!(
            target: TRACING_TARGET,
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            request_timeout_secs = config.request_timeout_secs,
            "Starting webhook dispatcher"
        );

        let handle = tokio::spawn(dispatch_loop.run());

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                sender: Mutex::new(Some(sender)),
                dispatch_loop: Mutex::new(Some(handle)),
                abort,
                stats,
                config,
            }),
        })
    }

    /// Enqueues a task, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] once shutdown has begun.
    pub async fn submit(&self, task: NotificationTask) -> Result<()> {
        let sender = self.inner.sender.lock().await.clone().ok_or(Error::Closed)?;

        self.inner.stats.record_submitted();
        if sender.send(task).await.is_err() {
            self.inner.stats.revert_submitted();
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Returns a snapshot of the delivery counters.
    pub fn stats(&self) -> DispatcherStats {
        self.inner.stats.snapshot()
    }

    /// Returns the dispatcher configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Stops accepting tasks and waits for queued and in-flight deliveries.
    ///
    /// If `deadline` completes first, outstanding deliveries are aborted.
    /// Calling this again after a shutdown returns `Ok(())` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutdownDeadline`] with the number of deliveries that
    /// were still outstanding when the deadline passed.
    pub async fn shutdown<F>(&self, deadline: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        drop(self.inner.sender.lock().await.take());
        let Some(mut handle) = self.inner.dispatch_loop.lock().await.take() else {
            return Ok(());
        };

        tracing::info!(target: TRACING_TARGET, "Shutting down webhook dispatcher");

        tokio::select! {
            biased;

            result = &mut handle => {
                log_loop_exit(result);
                tracing::info!(
                    target: TRACING_TARGET,
                    stats = ?self.stats(),
                    "Webhook dispatcher drained"
                );
                Ok(())
            }

            () = deadline => {
                let pending = usize::try_from(self.stats().pending()).unwrap_or(usize::MAX);
                self.inner.abort.cancel();
                log_loop_exit(handle.await);

                tracing::warn!(
                    target: TRACING_TARGET,
                    pending,
                    "Shutdown deadline elapsed, deliveries aborted"
                );
                Err(Error::ShutdownDeadline { pending })
            }
        }
    }
}

fn log_loop_exit(result: Result<(), JoinError>) {
    if let Err(err) = result {
        tracing::error!(target: TRACING_TARGET, error = %err, "Dispatch loop failed");
    }
}

struct DispatchLoop {
    receiver: mpsc::Receiver<NotificationTask>,
    transport: Arc<dyn WebhookTransport>,
    semaphore: Arc<Semaphore>,
    abort: CancellationToken,
    stats: Arc<StatsCounters>,
    timeout: Duration,
}

impl DispatchLoop {
    async fn run(mut self) {
        let mut deliveries = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                () = self.abort.cancelled() => break,

                Some(result) = deliveries.join_next(), if !deliveries.is_empty() => {
                    self.reap(result);
                }

                task = self.receiver.recv() => {
                    let Some(task) = task else {
                        break;
                    };

                    // Acquire semaphore permit for concurrency control
                    let permit = tokio::select! {
                        biased;
                        () = self.abort.cancelled() => break,
                        permit = self.semaphore.clone().acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => {
                                tracing::error!(
                                    target: TRACING_TARGET,
                                    "Semaphore closed, stopping dispatcher"
                                );
                                break;
                            }
                        },
                    };

                    let transport = self.transport.clone();
                    let stats = self.stats.clone();
                    let timeout = self.timeout;
                    deliveries.spawn(async move {
                        // Hold permit until delivery completes
                        let _permit = permit;
                        deliver(transport.as_ref(), &stats, task, timeout).await;
                    });
                }
            }
        }

        self.receiver.close();
        if !self.abort.is_cancelled() {
            tokio::select! {
                biased;
                () = self.abort.cancelled() => {}
                () = self.drain(&mut deliveries) => {}
            }
        }

        let aborted = deliveries.len();
        deliveries.shutdown().await;
        if aborted > 0 {
            tracing::warn!(target: TRACING_TARGET, aborted, "Aborted in-flight deliveries");
        }
        tracing::debug!(target: TRACING_TARGET, "Dispatch loop stopped");
    }

    async fn drain(&self, deliveries: &mut JoinSet<()>) {
        while let Some(result) = deliveries.join_next().await {
            self.reap(result);
        }
    }

    fn reap(&self, result: Result<(), JoinError>) {
        if let Err(err) = result {
            if err.is_panic() {
                self.stats.record_failed();
                tracing::error!(target: TRACING_TARGET, error = %err, "Webhook delivery panicked");
            }
        }
    }
}

async fn deliver(
    transport: &dyn WebhookTransport,
    stats: &StatsCounters,
    task: NotificationTask,
    timeout: Duration,
) {
    let NotificationTask {
        webhook,
        event,
        body,
    } = task;

    let request = RequestDescriptor::build(&webhook, body).with_timeout(timeout);
    let started = std::time::Instant::now();

    tracing::debug!(
        target: TRACING_TARGET,
        webhook = %webhook.name,
        event_id = %event.unique_id,
        request_id = %request.request_id,
        method = %request.method,
        url = %request.url,
        "Delivering webhook"
    );

    let outcome = match tokio::time::timeout(timeout, transport.send(&request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout),
    };
    let elapsed_ms = started.elapsed().as_millis();

    match outcome {
        Ok(response) if response.is_success() => {
            stats.record_delivered();
            tracing::info!(
                target: TRACING_TARGET,
                webhook = %webhook.name,
                event_id = %event.unique_id,
                status_code = response.status_code,
                elapsed_ms,
                "Webhook delivered"
            );
        }
        Ok(response) => {
            stats.record_failed();
            tracing::error!(
                target: TRACING_TARGET,
                webhook = %webhook.name,
                event_id = %event.unique_id,
                status_code = response.status_code,
                elapsed_ms,
                "Webhook endpoint returned a non-success status"
            );
        }
        Err(err) => {
            stats.record_failed();
            tracing::error!(
                target: TRACING_TARGET,
                webhook = %webhook.name,
                event_id = %event.unique_id,
                error = %err,
                elapsed_ms,
                "Webhook delivery failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;

    use super::*;
    use crate::event::{Kind, Owner, Target};
    use crate::mock::{MockResponse, MockTransport};
    use crate::render::render;

    fn event() -> Arc<EventView> {
        Arc::new(
            EventView::new(
                Target::new("app", "myapp"),
                Kind::new("app.update"),
                Owner::new("user", "me@me.com"),
            )
            .finish(None),
        )
    }

    fn task(name: &str, url: &str, body_template: &str) -> NotificationTask {
        let event = event();
        let body = render(body_template, &event).unwrap();
        NotificationTask::new(Webhook::new(name, url), event, body)
    }

    #[tokio::test]
    async fn test_delivers_submitted_tasks() {
        let transport = MockTransport::new();
        let dispatcher = Dispatcher::spawn(DispatcherConfig::default(), transport.clone()).unwrap();

        dispatcher.submit(task("a", "http://a/", "hello")).await.unwrap();
        dispatcher.submit(task("b", "http://b/", "")).await.unwrap();
        dispatcher.shutdown(pending()).await.unwrap();

        let stats = dispatcher.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.failed, 0);

        let mut requests = transport.requests();
        requests.sort_by(|a, b| a.webhook.cmp(&b.webhook));
        assert_eq!(requests[0].body, b"hello");
        assert_eq!(requests[0].header("Content-Length"), Some("5"));
        assert_eq!(requests[1].header("Content-Type"), Some("application/json"));
        assert_eq!(requests[1].timeout, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_failures_are_counted_and_isolated() {
        let transport = MockTransport::new()
            .with_response_for("http://error/", MockResponse::Error)
            .with_response_for("http://missing/", MockResponse::Status(404))
            .with_response_for("http://panic/", MockResponse::Panic);
        let dispatcher = Dispatcher::spawn(
            DispatcherConfig::default().with_workers(2),
            transport.clone(),
        )
        .unwrap();

        for url in ["http://error/", "http://missing/", "http://panic/", "http://ok/"] {
            dispatcher.submit(task("x", url, "")).await.unwrap();
        }
        dispatcher.shutdown(pending()).await.unwrap();

        let stats = dispatcher.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.pending(), 0);
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_is_a_failure() {
        let transport = MockTransport::with_default(MockResponse::Hang);
        let config = DispatcherConfig::default().with_request_timeout(1);
        let dispatcher = Dispatcher::spawn(config, transport).unwrap();

        dispatcher.submit(task("x", "http://slow/", "")).await.unwrap();
        dispatcher.shutdown(pending()).await.unwrap();

        assert_eq!(dispatcher.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_closed() {
        let dispatcher =
            Dispatcher::spawn(DispatcherConfig::default(), MockTransport::new()).unwrap();
        dispatcher.shutdown(pending()).await.unwrap();

        let err = dispatcher.submit(task("x", "http://a/", "")).await.unwrap_err();
        assert!(matches!(err, Error::Closed));
        assert_eq!(dispatcher.stats().submitted, 0);

        // Idempotent.
        dispatcher.shutdown(pending()).await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_deadline_aborts_hanging_delivery() {
        let transport = MockTransport::with_default(MockResponse::Hang);
        let dispatcher = Dispatcher::spawn(DispatcherConfig::default(), transport.clone()).unwrap();

        dispatcher.submit(task("x", "http://hang/", "")).await.unwrap();
        while transport.request_count() == 0 {
            tokio::task::yield_now().await;
        }

        let err = dispatcher.shutdown(std::future::ready(())).await.unwrap_err();
        assert!(matches!(err, Error::ShutdownDeadline { pending: 1 }));
        assert_eq!(dispatcher.stats().delivered, 0);
    }

    #[tokio::test]
    async fn test_queue_backpressure() {
        let transport = MockTransport::with_default(MockResponse::Hang);
        let config = DispatcherConfig::default()
            .with_workers(1)
            .with_queue_capacity(1);
        let dispatcher = Dispatcher::spawn(config, transport.clone()).unwrap();

        // One in flight, one held by the loop waiting for a permit, one queued.
        for _ in 0..3 {
            dispatcher.submit(task("x", "http://hang/", "")).await.unwrap();
        }

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            dispatcher.submit(task("x", "http://hang/", "")),
        )
        .await;
        assert!(blocked.is_err());

        let err = dispatcher.shutdown(std::future::ready(())).await.unwrap_err();
        assert!(matches!(err, Error::ShutdownDeadline { .. }));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = DispatcherConfig::default().with_workers(0);
        let result = Dispatcher::spawn(config, MockTransport::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
