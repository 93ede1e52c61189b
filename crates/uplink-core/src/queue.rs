//! Client-side file queue assembled before a batch is submitted.

use std::path::Path;

use crate::error::UploadError;
use crate::models::{FileAck, UploadItem, UploadStatus};

/// Ordered set of [`UploadItem`]s owned by the client until submission.
#[derive(Debug, Clone, Default)]
pub struct UploadQueue {
    items: Vec<UploadItem>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item and return its id.
    pub fn add(&mut self, item: UploadItem) -> String {
        let id = item.id.clone();
        self.items.push(item);
        id
    }

    /// Add a local file and return its id.
    pub fn add_path(&mut self, path: &Path) -> Result<String, UploadError> {
        let item = UploadItem::from_path(path)?;
        Ok(self.add(item))
    }

    /// Remove a queued item. Items already submitted stay in the queue.
    pub fn remove(&mut self, id: &str) -> Option<UploadItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id && item.status == UploadStatus::Queued)?;
        Some(self.items.remove(index))
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&UploadItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|item| item.size).sum()
    }

    /// Items that would go into the next submission.
    pub fn pending(&self) -> Vec<&UploadItem> {
        self.items
            .iter()
            .filter(|item| item.status == UploadStatus::Queued)
            .collect()
    }

    /// Reject submission of a queue with nothing pending.
    pub fn ensure_submittable(&self) -> Result<(), UploadError> {
        if self.pending().is_empty() {
            return Err(UploadError::EmptyQueue);
        }
        Ok(())
    }

    /// Move every queued item to `uploading` after a successful submission.
    pub fn mark_submitted(&mut self) {
        for item in self.items.iter_mut() {
            item.transition(UploadStatus::Uploading);
        }
    }

    /// Apply the server's per-file acknowledgments. Unknown ids and statuses are skipped.
    pub fn apply_acks(&mut self, acks: &[FileAck]) {
        for ack in acks {
            let Some(item) = self.items.iter_mut().find(|item| item.id == ack.id) else {
                tracing::debug!(file_id = %ack.id, "Acknowledgment for unknown file ignored");
                continue;
            };
            match ack.upload_status() {
                Some(UploadStatus::Error) => {
                    if item.transition(UploadStatus::Error) {
                        item.error = Some("Rejected by server".to_string());
                    }
                }
                Some(status) => {
                    item.transition(status);
                }
                None => {
                    tracing::debug!(
                        file_id = %ack.id,
                        status = %ack.status,
                        "Unrecognized acknowledgment status ignored"
                    );
                }
            }
        }
    }

    /// Hand the items over to batch tracking, leaving the queue empty.
    pub fn take_items(&mut self) -> Vec<UploadItem> {
        std::mem::take(&mut self.items)
    }
}
