use std::fmt;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uplink_core::{
    BatchHandle, ClientConfig, ProgressEvent, ReconnectPolicy, UploadError, WireMessage,
};

use super::transport::{ProgressConnection, ProgressTransport};
use super::websocket::WebSocketTransport;
use crate::Auth;

/// Lifecycle of a subscription's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Terminated,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Terminated => "terminated",
        };
        write!(f, "{}", s)
    }
}

/// Factory for per-batch subscriptions sharing one transport and reconnect policy.
#[derive(Clone)]
pub struct ProgressChannel {
    transport: Arc<dyn ProgressTransport>,
    policy: ReconnectPolicy,
}

impl ProgressChannel {
    pub fn new(transport: Arc<dyn ProgressTransport>, policy: ReconnectPolicy) -> Self {
        Self { transport, policy }
    }

    /// WebSocket channel at `config.ws_url` with the configured reconnect policy.
    pub fn websocket(config: &ClientConfig) -> Self {
        let transport = WebSocketTransport::new(config.ws_url.clone(), Auth::from_config(config));
        Self::new(Arc::new(transport), config.reconnect)
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn subscribe(&self, handle: &BatchHandle) -> ProgressSubscription {
        self.subscribe_batch(&handle.batch_id, CancellationToken::new())
    }

    /// Subscribe by id; cancelling `cancel` terminates the subscription.
    pub fn subscribe_batch(
        &self,
        batch_id: &str,
        cancel: CancellationToken,
    ) -> ProgressSubscription {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        ProgressSubscription {
            transport: Arc::clone(&self.transport),
            policy: self.policy,
            batch_id: batch_id.to_string(),
            connection: None,
            failures: 0,
            retries: 0,
            reconnecting: false,
            cancel,
            state_tx,
        }
    }
}

/// Lazy, non-restartable sequence of events for one batch.
///
/// Connecting happens on the first [`next_event`](Self::next_event) call. Only the
/// subscription drives connect attempts, so at most one is in flight at a time.
pub struct ProgressSubscription {
    transport: Arc<dyn ProgressTransport>,
    policy: ReconnectPolicy,
    batch_id: String,
    connection: Option<Box<dyn ProgressConnection>>,
    /// Consecutive failed connect attempts since the last successful one.
    failures: u32,
    /// Backoff waits since the last successful connect.
    retries: u32,
    reconnecting: bool,
    cancel: CancellationToken,
    state_tx: watch::Sender<ConnectionState>,
}

enum Received {
    Cancelled,
    Frame(Option<Result<String, UploadError>>),
}

impl ProgressSubscription {
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the subscription and release the connection.
    pub async fn cancel(&mut self) {
        self.cancel.cancel();
        self.terminate().await;
    }

    /// Next event for this batch.
    ///
    /// Returns `Ok(None)` once terminated (after `batch_complete` or cancellation).
    /// Returns [`UploadError::ReconnectExhausted`] when the reconnect ceiling is hit;
    /// the subscription is terminated afterwards.
    pub async fn next_event(&mut self) -> Result<Option<ProgressEvent>, UploadError> {
        loop {
            if self.state() == ConnectionState::Terminated {
                return Ok(None);
            }
            if self.cancel.is_cancelled() {
                self.terminate().await;
                return Ok(None);
            }

            let Some(connection) = self.connection.as_mut() else {
                self.connect().await?;
                continue;
            };

            let cancel = self.cancel.clone();
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => Received::Cancelled,
                frame = connection.recv() => Received::Frame(frame),
            };

            let text = match received {
                Received::Cancelled => {
                    tracing::info!(batch_id = %self.batch_id, "Progress subscription cancelled");
                    self.terminate().await;
                    return Ok(None);
                }
                Received::Frame(Some(Ok(text))) => text,
                Received::Frame(Some(Err(e))) => {
                    tracing::warn!(
                        batch_id = %self.batch_id,
                        error = %e,
                        "Progress channel dropped"
                    );
                    self.drop_connection();
                    continue;
                }
                Received::Frame(None) => {
                    tracing::warn!(batch_id = %self.batch_id, "Progress channel closed by server");
                    self.drop_connection();
                    continue;
                }
            };

            let event = match ProgressEvent::from_json(&text) {
                Ok(event) => event,
                Err(e) => {
                    tracing::debug!(
                        batch_id = %self.batch_id,
                        error = %e,
                        "Dropping undecodable frame"
                    );
                    continue;
                }
            };
            if event.batch_id != self.batch_id {
                tracing::debug!(
                    batch_id = %self.batch_id,
                    event_batch_id = %event.batch_id,
                    "Dropping event for another batch"
                );
                continue;
            }

            if event.kind.is_terminal() {
                tracing::info!(
                    batch_id = %self.batch_id,
                    "Batch complete, closing progress channel"
                );
                self.terminate().await;
            }
            return Ok(Some(event));
        }
    }

    /// Consume the subscription as a stream. The stream ends after termination
    /// and after yielding an escalation error.
    pub fn into_stream(self) -> impl Stream<Item = Result<ProgressEvent, UploadError>> + Send {
        futures::stream::unfold(Some(self), |subscription| async move {
            let mut subscription = subscription?;
            match subscription.next_event().await {
                Ok(Some(event)) => Some((Ok(event), Some(subscription))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Connect and subscribe, retrying with backoff. Returns `Ok(())` once
    /// connected or when cancelled mid-attempt.
    async fn connect(&mut self) -> Result<(), UploadError> {
        loop {
            if self.reconnecting {
                let delay = self.policy.delay_for_attempt(self.retries);
                self.retries = self.retries.saturating_add(1);
                tracing::debug!(
                    batch_id = %self.batch_id,
                    attempt = self.retries,
                    delay_ms = delay.as_millis() as u64,
                    "Waiting before reconnect"
                );
                let cancelled = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => true,
                    _ = tokio::time::sleep(delay) => false,
                };
                if cancelled {
                    self.terminate().await;
                    return Ok(());
                }
            }

            self.set_state(ConnectionState::Connecting);
            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = open(self.transport.as_ref(), &self.batch_id) => Some(result),
            };

            match attempt {
                None => {
                    self.terminate().await;
                    return Ok(());
                }
                Some(Ok(connection)) => {
                    self.connection = Some(connection);
                    self.failures = 0;
                    self.retries = 0;
                    self.reconnecting = false;
                    self.set_state(ConnectionState::Connected);
                    tracing::info!(batch_id = %self.batch_id, "Subscribed to batch progress");
                    return Ok(());
                }
                Some(Err(e)) => {
                    self.failures += 1;
                    self.reconnecting = true;
                    self.set_state(ConnectionState::Disconnected);

                    if self.policy.is_exhausted(self.failures) {
                        tracing::error!(
                            batch_id = %self.batch_id,
                            attempts = self.failures,
                            error = %e,
                            "Progress channel reconnect attempts exhausted"
                        );
                        self.terminate().await;
                        return Err(UploadError::ReconnectExhausted {
                            attempts: self.failures,
                        });
                    }

                    tracing::warn!(
                        batch_id = %self.batch_id,
                        attempt = self.failures,
                        error = %e,
                        "Progress channel connect failed, will retry"
                    );
                }
            }
        }
    }

    fn drop_connection(&mut self) {
        self.connection = None;
        self.reconnecting = true;
        self.set_state(ConnectionState::Disconnected);
    }

    async fn terminate(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
        self.set_state(ConnectionState::Terminated);
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            tracing::debug!(
                batch_id = %self.batch_id,
                from = %current,
                to = %state,
                "Connection state"
            );
            *current = state;
            true
        });
    }
}

/// Open a connection and send the subscribe message for `batch_id`.
async fn open(
    transport: &dyn ProgressTransport,
    batch_id: &str,
) -> Result<Box<dyn ProgressConnection>, UploadError> {
    let mut connection = transport.connect().await?;
    let subscribe = serde_json::to_string(&WireMessage::subscribe(batch_id))?;
    if let Err(e) = connection.send(subscribe).await {
        connection.close().await;
        return Err(e);
    }
    Ok(connection)
}

impl fmt::Debug for ProgressSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSubscription")
            .field("batch_id", &self.batch_id)
            .field("state", &self.state())
            .field("failures", &self.failures)
            .finish()
    }
}
