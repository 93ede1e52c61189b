use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::upload::{UploadItem, UploadStatus};

/// Client-side status of a tracked batch. Only `InProgress` accepts events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Complete,
    Cancelled,
    Failed,
}

impl Display for BatchStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BatchStatus::InProgress => write!(f, "in_progress"),
            BatchStatus::Complete => write!(f, "complete"),
            BatchStatus::Cancelled => write!(f, "cancelled"),
            BatchStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BatchCounts {
    pub total: usize,
    pub complete: usize,
    pub errored: usize,
    pub in_flight: usize,
}

/// Per-batch state folded from the progress stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchState {
    pub batch_id: String,
    pub status: BatchStatus,
    /// Status label last reported by `batch_status`.
    pub status_label: Option<String>,
    /// Summary payload last reported by `batch_status`.
    pub summary: Option<Value>,
    pub progress: f64,
    pub sync_progress: f64,
    pub items: Vec<UploadItem>,
    /// Reason recorded when tracking failed.
    pub failure: Option<String>,
}

impl BatchState {
    pub fn new(batch_id: impl Into<String>, items: Vec<UploadItem>) -> Self {
        Self {
            batch_id: batch_id.into(),
            status: BatchStatus::InProgress,
            status_label: None,
            summary: None,
            progress: 0.0,
            sync_progress: 0.0,
            items,
            failure: None,
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.status == BatchStatus::InProgress
    }

    pub fn is_complete(&self) -> bool {
        self.status == BatchStatus::Complete
    }

    pub fn item(&self, id: &str) -> Option<&UploadItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub(crate) fn item_mut(&mut self, id: &str) -> Option<&mut UploadItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn counts(&self) -> BatchCounts {
        self.items
            .iter()
            .fold(BatchCounts::default(), |mut counts, item| {
                counts.total += 1;
                match item.status {
                    UploadStatus::Complete => counts.complete += 1,
                    UploadStatus::Error => counts.errored += 1,
                    UploadStatus::Uploading | UploadStatus::Processing => counts.in_flight += 1,
                    UploadStatus::Queued => {}
                }
                counts
            })
    }

    /// Stop accepting events after the caller cancelled tracking.
    pub fn cancel(&mut self) {
        if self.is_accepting() {
            self.status = BatchStatus::Cancelled;
        }
    }

    /// Stop accepting events after the channel escalated a failure.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.is_accepting() {
            self.status = BatchStatus::Failed;
            self.failure = Some(reason.into());
        }
    }
}
