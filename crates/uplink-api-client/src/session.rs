//! Batch session: submission, subscription, and reduction for a set of batches.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use uplink_core::{
    apply, BatchHandle, BatchRequest, BatchState, BatchStatus, BatchStatusResponse, ClientConfig,
    Outcome, ProgressEvent, UploadError, UploadItem, UploadQueue, UploadStatus,
};

use crate::progress::ProgressChannel;
use crate::ApiClient;

/// Called with the batch id and the error when a channel failure escalates.
pub type EscalationHook = Box<dyn Fn(&str, &UploadError) + Send + Sync>;

/// Owns the state of every tracked batch.
///
/// Reduction for a batch runs inside [`track`](Self::track), so there is a single
/// writer per batch and no locking around [`BatchState`].
pub struct BatchSession {
    client: ApiClient,
    channel: ProgressChannel,
    batches: HashMap<String, BatchState>,
    cancels: HashMap<String, CancellationToken>,
    on_escalation: Option<EscalationHook>,
}

impl BatchSession {
    pub fn new(client: ApiClient, channel: ProgressChannel) -> Self {
        Self {
            client,
            channel,
            batches: HashMap::new(),
            cancels: HashMap::new(),
            on_escalation: None,
        }
    }

    /// HTTP client and WebSocket channel built from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, UploadError> {
        Ok(Self::new(
            ApiClient::new(config)?,
            ProgressChannel::websocket(config),
        ))
    }

    pub fn with_escalation<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &UploadError) + Send + Sync + 'static,
    {
        self.on_escalation = Some(Box::new(hook));
        self
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Submit the queue and start tracking the new batch with the queue's items.
    pub async fn submit(
        &mut self,
        queue: &mut UploadQueue,
        request: &BatchRequest,
    ) -> Result<BatchHandle, UploadError> {
        let handle = self.client.submit_batch(queue, request).await?;
        self.register(&handle.batch_id, queue.take_items());
        Ok(handle)
    }

    /// Start tracking a batch. Registering an id twice keeps the existing state.
    pub fn register(&mut self, batch_id: &str, items: Vec<UploadItem>) -> CancellationToken {
        self.batches
            .entry(batch_id.to_string())
            .or_insert_with(|| BatchState::new(batch_id, items));
        self.cancels
            .entry(batch_id.to_string())
            .or_default()
            .clone()
    }

    pub fn state(&self, batch_id: &str) -> Option<&BatchState> {
        self.batches.get(batch_id)
    }

    pub fn batch_ids(&self) -> impl Iterator<Item = &str> {
        self.batches.keys().map(String::as_str)
    }

    /// Token that cancels tracking of `batch_id` from another task.
    pub fn cancel_token(&self, batch_id: &str) -> Option<CancellationToken> {
        self.cancels.get(batch_id).cloned()
    }

    /// Cancel tracking; later events for the batch are dropped.
    pub fn cancel(&mut self, batch_id: &str) -> bool {
        let Some(state) = self.batches.get_mut(batch_id) else {
            return false;
        };
        if let Some(token) = self.cancels.get(batch_id) {
            token.cancel();
        }
        state.cancel();
        tracing::info!(batch_id = %batch_id, "Batch tracking cancelled");
        true
    }

    /// Stop tracking and hand back the final state.
    pub fn remove(&mut self, batch_id: &str) -> Option<BatchState> {
        if let Some(token) = self.cancels.remove(batch_id) {
            token.cancel();
        }
        self.batches.remove(batch_id)
    }

    /// Subscribe to `batch_id` and fold its events into the tracked state until the
    /// batch completes, tracking is cancelled, or the channel escalates.
    ///
    /// `on_update` runs after every applied event.
    pub async fn track<F>(
        &mut self,
        batch_id: &str,
        mut on_update: F,
    ) -> Result<BatchStatus, UploadError>
    where
        F: FnMut(&BatchState, &ProgressEvent),
    {
        let Some(state) = self.batches.get(batch_id) else {
            return Err(UploadError::Channel(format!("Batch {} is not tracked", batch_id)));
        };
        if !state.is_accepting() {
            return Ok(state.status);
        }

        let cancel = self.cancels.entry(batch_id.to_string()).or_default().clone();
        let mut subscription = self.channel.subscribe_batch(batch_id, cancel.clone());

        loop {
            let next = subscription.next_event().await;
            let Some(state) = self.batches.get_mut(batch_id) else {
                subscription.cancel().await;
                return Err(UploadError::Channel(format!("Batch {} is not tracked", batch_id)));
            };

            match next {
                Ok(Some(event)) => match apply(state, &event) {
                    Outcome::Applied => on_update(state, &event),
                    Outcome::Terminal => {
                        on_update(state, &event);
                        let counts = state.counts();
                        tracing::info!(
                            batch_id = %batch_id,
                            complete = counts.complete,
                            errored = counts.errored,
                            "Batch complete"
                        );
                        return Ok(state.status);
                    }
                    Outcome::Ignored(reason) => {
                        tracing::debug!(
                            batch_id = %batch_id,
                            kind = %event.kind,
                            file_id = ?event.file_id,
                            reason = ?reason,
                            "Progress event ignored"
                        );
                    }
                },
                Ok(None) => {
                    if cancel.is_cancelled() {
                        state.cancel();
                        tracing::info!(batch_id = %batch_id, "Batch tracking cancelled");
                    }
                    return Ok(state.status);
                }
                Err(e) => {
                    state.fail(e.to_string());
                    tracing::error!(batch_id = %batch_id, error = %e, "Batch tracking failed");
                    if let Some(hook) = &self.on_escalation {
                        hook(batch_id, &e);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Re-query the server and merge the reported status into the tracked state.
    ///
    /// Used after a channel gap, since missed events are not replayed. Item statuses
    /// only move forward and the batch is never completed from here.
    pub async fn reconcile(&mut self, batch_id: &str) -> Result<BatchStatusResponse, UploadError> {
        let response = self.client.get_batch_status(batch_id).await?;

        if let Some(state) = self.batches.get_mut(batch_id) {
            if state.is_accepting() {
                merge_status(state, &response);
            }
        }
        Ok(response)
    }
}

fn merge_status(state: &mut BatchState, response: &BatchStatusResponse) {
    state.status_label = Some(response.status.clone());
    if let Some(progress) = response.progress {
        state.progress = state.progress.max(progress.clamp(0.0, 100.0));
    }

    for ack in &response.files {
        let Some(item) = state.items.iter_mut().find(|item| item.id == ack.id) else {
            continue;
        };
        match ack.upload_status() {
            Some(UploadStatus::Error) => {
                if item.transition(UploadStatus::Error) {
                    item.error = Some("Reported failed by server".to_string());
                }
            }
            Some(status) => {
                item.transition(status);
            }
            None => {}
        }
    }
}

impl std::fmt::Debug for BatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSession")
            .field("client", &self.client)
            .field("batches", &self.batches.len())
            .field("on_escalation", &self.on_escalation.is_some())
            .finish()
    }
}
