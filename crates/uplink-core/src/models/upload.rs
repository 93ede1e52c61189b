use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::UploadError;
use crate::validation::content_type_for_filename;

/// Lifecycle of one file. Progresses `queued → uploading → processing → (complete | error)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Queued,
    Uploading,
    Processing,
    Complete,
    Error,
}

impl UploadStatus {
    fn rank(self) -> u8 {
        match self {
            UploadStatus::Queued => 0,
            UploadStatus::Uploading => 1,
            UploadStatus::Processing => 2,
            UploadStatus::Complete | UploadStatus::Error => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Complete | UploadStatus::Error)
    }

    /// True for items the server is currently handling.
    pub fn is_in_flight(self) -> bool {
        matches!(self, UploadStatus::Uploading | UploadStatus::Processing)
    }

    /// Staying put is allowed; terminal states never change.
    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStatus::Queued => write!(f, "queued"),
            UploadStatus::Uploading => write!(f, "uploading"),
            UploadStatus::Processing => write!(f, "processing"),
            UploadStatus::Complete => write!(f, "complete"),
            UploadStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for UploadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queued" | "pending" => Ok(UploadStatus::Queued),
            "uploading" | "received" | "accepted" => Ok(UploadStatus::Uploading),
            "processing" | "running" => Ok(UploadStatus::Processing),
            "complete" | "completed" | "done" => Ok(UploadStatus::Complete),
            "error" | "failed" => Ok(UploadStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid upload status: {}", s)),
        }
    }
}

/// One file pending or in flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadItem {
    /// Client-local identifier, also used as the file id on the progress channel.
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub status: UploadStatus,
    /// Percentage in 0–100.
    pub progress: f64,
    pub error: Option<String>,
    /// Where the bytes are read from at submission time.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl UploadItem {
    pub fn new(filename: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            filename: filename.into(),
            size,
            mime_type: mime_type.into(),
            status: UploadStatus::Queued,
            progress: 0.0,
            error: None,
            path: None,
        }
    }

    /// Replace the generated identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Build an item from a local file: size from metadata, MIME type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            UploadError::InvalidFile(format!("{}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(UploadError::InvalidFile(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                UploadError::InvalidFile(format!("{} has no usable file name", path.display()))
            })?
            .to_string();

        let mime_type = content_type_for_filename(&filename);
        let mut item = Self::new(filename, metadata.len(), mime_type);
        item.path = Some(path.to_path_buf());
        Ok(item)
    }

    /// Move to `next` if the status progression allows it. Returns whether the status changed.
    pub fn transition(&mut self, next: UploadStatus) -> bool {
        if self.status == next || !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }
}
