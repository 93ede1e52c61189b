use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::UploadError;

/// Event name the client sends to start receiving a batch's events.
pub const SUBSCRIBE_EVENT: &str = "subscribe_batch";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BatchStatus,
    BatchProgress,
    FileProcessed,
    SyncProgress,
    BatchComplete,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::BatchStatus => "batch_status",
            EventKind::BatchProgress => "batch_progress",
            EventKind::FileProcessed => "file_processed",
            EventKind::SyncProgress => "sync_progress",
            EventKind::BatchComplete => "batch_complete",
        }
    }

    /// `batch_complete` ends the subscription.
    pub fn is_terminal(self) -> bool {
        self == EventKind::BatchComplete
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch_status" => Ok(EventKind::BatchStatus),
            "batch_progress" => Ok(EventKind::BatchProgress),
            "file_processed" => Ok(EventKind::FileProcessed),
            "sync_progress" => Ok(EventKind::SyncProgress),
            "batch_complete" => Ok(EventKind::BatchComplete),
            _ => Err(anyhow::anyhow!("Invalid event kind: {}", s)),
        }
    }
}

/// JSON envelope used on the progress channel in both directions:
/// `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMessage {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WireMessage {
    pub fn subscribe(batch_id: &str) -> Self {
        Self {
            event: SUBSCRIBE_EVENT.to_string(),
            data: serde_json::json!({ "batch_id": batch_id }),
        }
    }
}

/// One message from the progress channel, folded into state by the reducer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub batch_id: String,
    pub file_id: Option<String>,
    pub kind: EventKind,
    pub progress: Option<f64>,
    /// Full `data` object as received.
    pub detail: Value,
}

impl ProgressEvent {
    pub fn new(kind: EventKind, batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            file_id: None,
            kind,
            progress: None,
            detail: Value::Object(Default::default()),
        }
    }

    pub fn with_file(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Set one field of the detail payload.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !self.detail.is_object() {
            self.detail = Value::Object(Default::default());
        }
        if let Value::Object(map) = &mut self.detail {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// String field from the detail payload.
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.detail.get(key).and_then(Value::as_str)
    }

    /// Decode a server envelope. The `data` object must carry `batch_id`;
    /// `file_id` and `progress` are optional.
    pub fn from_wire(message: WireMessage) -> Result<Self, UploadError> {
        let kind: EventKind = message
            .event
            .parse()
            .map_err(|e: anyhow::Error| UploadError::InvalidResponse(e.to_string()))?;

        let data = match message.data {
            Value::Object(map) => map,
            other => {
                return Err(UploadError::InvalidResponse(format!(
                    "Event '{}' data must be an object, got {}",
                    kind, other
                )))
            }
        };

        let batch_id = data
            .get("batch_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                UploadError::InvalidResponse(format!("Event '{}' is missing batch_id", kind))
            })?
            .to_string();

        let file_id = data
            .get("file_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let progress = data.get("progress").and_then(Value::as_f64);

        Ok(Self {
            batch_id,
            file_id,
            kind,
            progress,
            detail: Value::Object(data),
        })
    }

    /// Parse a text frame.
    pub fn from_json(text: &str) -> Result<Self, UploadError> {
        let message: WireMessage = serde_json::from_str(text)?;
        Self::from_wire(message)
    }

    /// Envelope as a server would send it.
    pub fn to_wire(&self) -> WireMessage {
        let mut data = match &self.detail {
            Value::Object(map) => map.clone(),
            _ => Default::default(),
        };
        data.insert("batch_id".to_string(), Value::from(self.batch_id.clone()));
        if let Some(file_id) = &self.file_id {
            data.insert("file_id".to_string(), Value::from(file_id.clone()));
        }
        if let Some(progress) = self.progress {
            data.insert("progress".to_string(), Value::from(progress));
        }
        WireMessage {
            event: self.kind.as_str().to_string(),
            data: Value::Object(data),
        }
    }
}
