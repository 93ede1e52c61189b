//! Progress reducer: folds one [`ProgressEvent`] into a [`BatchState`].
//!
//! Dispatch by event kind:
//!
//! | kind             | effect                                                          |
//! |------------------|-----------------------------------------------------------------|
//! | `batch_status`   | replaces `status_label` and `summary`                           |
//! | `batch_progress` | replaces `progress`                                             |
//! | `file_processed` | updates one item's status and progress                          |
//! | `sync_progress`  | replaces `sync_progress`                                        |
//! | `batch_complete` | completes the batch and every in-flight item, ends the stream   |
//!
//! Applying an event twice yields the same state as applying it once. Item progress
//! never decreases: a `file_processed` event whose progress is below the recorded
//! value is discarded whole. Item status never regresses.

use serde_json::Value;

use crate::models::{BatchState, BatchStatus, EventKind, ProgressEvent, UploadStatus};

/// Why an event left the state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Event belongs to another batch.
    ForeignBatch,
    /// Batch is complete, cancelled, or failed.
    NotTracking,
    /// `file_processed` without a file id.
    MissingFileId,
    /// No queue item with that id (removed, or never submitted).
    UnknownFile,
    /// Progress lower than already recorded.
    StaleProgress,
    /// Status would move backwards or leave a terminal state.
    StatusRegression,
    /// Progress event without a numeric value.
    MissingProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(IgnoreReason),
    /// `batch_complete` applied; the channel must terminate.
    Terminal,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self == Outcome::Terminal
    }
}

/// Pure form of [`apply`].
pub fn reduce(mut state: BatchState, event: &ProgressEvent) -> BatchState {
    apply(&mut state, event);
    state
}

/// Fold `event` into `state` in place.
pub fn apply(state: &mut BatchState, event: &ProgressEvent) -> Outcome {
    if event.batch_id != state.batch_id {
        return Outcome::Ignored(IgnoreReason::ForeignBatch);
    }
    if !state.is_accepting() {
        return Outcome::Ignored(IgnoreReason::NotTracking);
    }

    match event.kind {
        EventKind::BatchStatus => {
            state.status_label = event.detail_str("status").map(str::to_string);
            state.summary = event.detail.get("summary").filter(|v| !v.is_null()).cloned();
            Outcome::Applied
        }
        EventKind::BatchProgress => match event.progress {
            Some(progress) => {
                state.progress = clamp_percent(progress);
                Outcome::Applied
            }
            None => Outcome::Ignored(IgnoreReason::MissingProgress),
        },
        EventKind::SyncProgress => match event.progress {
            Some(progress) => {
                state.sync_progress = clamp_percent(progress);
                Outcome::Applied
            }
            None => Outcome::Ignored(IgnoreReason::MissingProgress),
        },
        EventKind::FileProcessed => apply_file_processed(state, event),
        EventKind::BatchComplete => {
            state.status = BatchStatus::Complete;
            for item in state.items.iter_mut() {
                if item.status.is_in_flight() {
                    item.status = UploadStatus::Complete;
                }
            }
            Outcome::Terminal
        }
    }
}

fn apply_file_processed(state: &mut BatchState, event: &ProgressEvent) -> Outcome {
    let Some(file_id) = event.file_id.as_deref() else {
        return Outcome::Ignored(IgnoreReason::MissingFileId);
    };
    let Some(item) = state.item_mut(file_id) else {
        return Outcome::Ignored(IgnoreReason::UnknownFile);
    };

    let progress = event.progress.map(clamp_percent);
    if let Some(progress) = progress {
        if progress < item.progress {
            return Outcome::Ignored(IgnoreReason::StaleProgress);
        }
    }

    let target = file_status(event, progress);
    if !item.status.can_transition_to(target) {
        return Outcome::Ignored(IgnoreReason::StatusRegression);
    }

    item.status = target;
    if let Some(progress) = progress {
        item.progress = progress;
    }
    if target == UploadStatus::Error {
        item.error = event
            .detail_str("error")
            .or_else(|| event.detail_str("message"))
            .map(str::to_string)
            .or_else(|| item.error.clone())
            .or_else(|| Some("Processing failed".to_string()));
    }
    Outcome::Applied
}

/// Status carried by `data.status`, or inferred from progress when absent.
fn file_status(event: &ProgressEvent, progress: Option<f64>) -> UploadStatus {
    let explicit = event
        .detail
        .get("status")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<UploadStatus>().ok());

    match explicit {
        Some(status) => status,
        None if progress.is_some_and(|p| p >= 100.0) => UploadStatus::Complete,
        None => UploadStatus::Processing,
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
