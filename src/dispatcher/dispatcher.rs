// ABOUTME: Request dispatcher - bounds concurrency, throttles, and retries.
// ABOUTME: Every call holds one slot from acquisition until it finishes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::{Notify, RwLock, Semaphore};

use super::outcome::{Exhaustion, Outcome};
use crate::config::DispatcherConfig;
use crate::error::{ConfigError, DispatchError, PacerError, TransportError};
use crate::retry::{AttemptFailure, RetryDecision, RetryPolicy};
use crate::throttle::Throttle;
use crate::transport::{
    ExchangeRequest, ExchangeResponse, HttpTransport, Method, RequestOptions, Transport,
};

/// One call in a [`Dispatcher::send_all`] batch.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub endpoint: String,
    pub options: RequestOptions,
}

impl Call {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            options: RequestOptions::default(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

/// Rate-limited, concurrency-bounded HTTP request dispatcher.
///
/// Each call to [`send`](Self::send):
///
/// 1. takes one of `concurrency_limit` slots, waiting if all are busy;
/// 2. waits for admission from the sliding-window [`Throttle`];
/// 3. makes up to `max_attempts` exchanges through the [`Transport`].
///    A 429 waits out the server's `Retry-After` hint, any other failure
///    waits `backoff_base^attempt` seconds;
/// 4. returns the decoded payload or an [`Outcome::Exhausted`].
///
/// The slot is a semaphore permit owned by the call's future, so it is
/// released on every exit path, including cancellation.
///
/// After [`close`](Self::close) a call never starts another attempt: one
/// waiting for a slot, the throttle or a retry fails with
/// `DispatchError::Closed`, as does an exchange the shut-down transport
/// refuses.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use pacer::prelude::*;
///
/// # async fn run() -> Result<(), PacerError> {
/// let config = DispatcherConfig::new("https://api.example.com", 5, Duration::from_secs(10))
///     .with_concurrency_limit(2);
/// let dispatcher = Dispatcher::http(config)?;
///
/// let outcome: Outcome<serde_json::Value> = dispatcher
///     .send(Method::GET, "/data", RequestOptions::new())
///     .await?;
/// println!("{:?}", outcome.into_success());
///
/// dispatcher.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    config: DispatcherConfig,
    throttle: Throttle,
    retry: RetryPolicy,
    slots: Semaphore,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    closed: AtomicBool,
    closing: Notify,
}

impl Dispatcher {
    /// Create a dispatcher that sends through `transport`.
    ///
    /// Returns `Err(ConfigError)` if the configuration fails validation.
    pub fn new(config: DispatcherConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        config.validate()?;

        let throttle = Throttle::new(config.max_requests_per_window, config.window())?;
        let retry = RetryPolicy::new(config.max_attempts, config.backoff_base)?;
        let slots = Semaphore::new(config.concurrency_limit);

        Ok(Self {
            config,
            throttle,
            retry,
            slots,
            transport: RwLock::new(Some(transport)),
            closed: AtomicBool::new(false),
            closing: Notify::new(),
        })
    }

    /// Create a dispatcher backed by a fresh [`HttpTransport`].
    pub fn http(config: DispatcherConfig) -> Result<Self, PacerError> {
        config.validate()?;
        let transport = HttpTransport::new()?;
        Ok(Self::new(config, Arc::new(transport))?)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Calls currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.config
            .concurrency_limit
            .saturating_sub(self.slots.available_permits())
    }

    /// Slots free right now.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Issue one request and decode its JSON payload as `T`.
    ///
    /// Returns `Ok(Outcome::Success)` for a 2xx response,
    /// `Ok(Outcome::Exhausted)` once every attempt has failed,
    /// `Err(DispatchError::Decode)` for a 2xx response with a malformed
    /// payload, and `Err(DispatchError::Closed)` after [`close`](Self::close).
    pub async fn send<T>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Outcome<T>, DispatchError>
    where
        T: DeserializeOwned,
    {
        self.send_with_cancel(method, endpoint, options, std::future::pending::<()>())
            .await
    }

    /// Like [`send`](Self::send), but gives up once `cancel` completes.
    ///
    /// Cancellation aborts whatever the call is waiting on (a slot, the
    /// throttle, an exchange, or a retry wait), releases its slot, and
    /// returns `Err(DispatchError::Cancelled)`.
    pub async fn send_with_cancel<T, F>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
        cancel: F,
    ) -> Result<Outcome<T>, DispatchError>
    where
        T: DeserializeOwned,
        F: Future<Output = ()>,
    {
        let transport = self.transport().await?;
        let request = ExchangeRequest::new(method, self.url_for(endpoint), options);

        tokio::pin!(cancel);

        tokio::select! {
            biased;
            () = &mut cancel => {
                tracing::debug!(url = %request.url, "Request cancelled");
                Err(DispatchError::Cancelled)
            }
            result = self.dispatch(transport.as_ref(), &request) => result,
        }
    }

    /// Like [`send`](Self::send), but cancelled after `deadline`.
    pub async fn send_with_deadline<T>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
        deadline: Duration,
    ) -> Result<Outcome<T>, DispatchError>
    where
        T: DeserializeOwned,
    {
        self.send_with_cancel(method, endpoint, options, tokio::time::sleep(deadline))
            .await
    }

    /// Issue a batch of calls concurrently; results keep the input order.
    pub async fn send_all<T, I>(&self, calls: I) -> Vec<Result<Outcome<T>, DispatchError>>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = Call>,
    {
        let pending = calls.into_iter().map(|call| async move {
            self.send::<T>(call.method, &call.endpoint, call.options)
                .await
        });
        futures::future::join_all(pending).await
    }

    /// Shut the dispatcher down and release the transport.
    ///
    /// Calls still waiting for a slot, the throttle or a retry fail with
    /// `DispatchError::Closed`, as does every later `send`. An exchange
    /// already underway finishes; if it fails, the call ends with `Closed`
    /// instead of retrying. Calling `close` again is a no-op.
    pub async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.slots.close();
        self.closing.notify_waiters();
        let transport = self.transport.write().await.take();

        tracing::info!(
            base_url = %self.config.base_url,
            in_flight = self.in_flight(),
            "Closing dispatcher"
        );

        match transport {
            Some(transport) => transport.shutdown().await,
            None => Ok(()),
        }
    }

    async fn transport(&self) -> Result<Arc<dyn Transport>, DispatchError> {
        if self.is_closed() {
            return Err(DispatchError::Closed);
        }
        self.transport
            .read()
            .await
            .clone()
            .ok_or(DispatchError::Closed)
    }

    fn url_for(&self, endpoint: &str) -> String {
        let base = &self.config.base_url;
        match endpoint.strip_prefix('/') {
            Some(rest) if base.ends_with('/') => format!("{}{}", base, rest),
            _ => format!("{}{}", base, endpoint),
        }
    }

    /// Slot, throttle, then the attempt loop.
    async fn dispatch<T>(
        &self,
        transport: &dyn Transport,
        request: &ExchangeRequest,
    ) -> Result<Outcome<T>, DispatchError>
    where
        T: DeserializeOwned,
    {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| DispatchError::Closed)?;

        tokio::select! {
            biased;
            () = self.closed_signal() => return Err(DispatchError::Closed),
            () = self.throttle.acquire() => {}
        }

        let mut attempt = 0;
        loop {
            if self.is_closed() {
                return Err(DispatchError::Closed);
            }

            let failure = match transport.exchange(request).await {
                Ok(response) if response.is_success() => {
                    return Ok(Outcome::Success(response.json()?));
                }
                Ok(response) => Self::classify(&response),
                Err(TransportError::Closed) => {
                    tracing::debug!(url = %request.url, "Transport closed mid-call");
                    return Err(DispatchError::Closed);
                }
                Err(error) => AttemptFailure::Transport(error),
            };

            match self.retry.next(attempt, &failure) {
                RetryDecision::Retry { after } => {
                    tracing::warn!(
                        url = %request.url,
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts(),
                        retry_in_ms = after.as_millis() as u64,
                        error = %failure,
                        "Request failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = self.closed_signal() => return Err(DispatchError::Closed),
                        () = tokio::time::sleep(after) => {}
                    }
                    attempt += 1;
                }
                RetryDecision::GiveUp => {
                    tracing::warn!(
                        url = %request.url,
                        attempts = attempt + 1,
                        error = %failure,
                        "Request exhausted all attempts"
                    );
                    return Ok(Outcome::Exhausted(Exhaustion {
                        attempts: attempt + 1,
                        last_failure: failure,
                    }));
                }
            }
        }
    }

    /// Completes once `close` has been called.
    async fn closed_signal(&self) {
        // Register before checking the flag so a concurrent close is not missed.
        let notified = self.closing.notified();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    fn classify(response: &ExchangeResponse) -> AttemptFailure {
        if response.is_rate_limited() {
            AttemptFailure::RateLimited {
                retry_after: response.retry_after(),
            }
        } else {
            AttemptFailure::Status(response.status)
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.config.base_url)
            .field("concurrency_limit", &self.config.concurrency_limit)
            .field("throttle", &self.throttle)
            .field("retry", &self.retry)
            .field("closed", &self.is_closed())
            .finish()
    }
}
