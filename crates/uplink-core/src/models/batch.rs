use serde::{Deserialize, Serialize};

use super::upload::UploadStatus;
use crate::config::UploadOptions;
use crate::error::UploadError;
use crate::validation::{validate_case_id, validate_quality};

/// Batch configuration, validated at construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRequest {
    case_id: String,
    quality: String,
    transcription: bool,
    sync: bool,
}

impl BatchRequest {
    /// Trims the case id and checks the quality against `options`.
    pub fn new(
        case_id: &str,
        quality: &str,
        transcription: bool,
        sync: bool,
        options: &UploadOptions,
    ) -> Result<Self, UploadError> {
        Ok(Self {
            case_id: validate_case_id(case_id)?,
            quality: validate_quality(quality, options)?,
            transcription,
            sync,
        })
    }

    /// Request using the host's default quality and feature flags.
    pub fn with_defaults(case_id: &str, options: &UploadOptions) -> Result<Self, UploadError> {
        Self::new(
            case_id,
            &options.default_quality,
            options.default_transcription,
            options.default_sync,
            options,
        )
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn quality(&self) -> &str {
        &self.quality
    }

    pub fn transcription(&self) -> bool {
        self.transcription
    }

    pub fn sync(&self) -> bool {
        self.sync
    }

    /// Text fields of the multipart body, in submission order.
    pub fn form_fields(&self) -> [(&'static str, String); 4] {
        [
            ("case_id", self.case_id.clone()),
            ("quality", self.quality.clone()),
            ("transcription", self.transcription.to_string()),
            ("sync", self.sync.to_string()),
        ]
    }
}

/// Per-file acknowledgment returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileAck {
    pub id: String,
    pub status: String,
}

impl FileAck {
    pub fn upload_status(&self) -> Option<UploadStatus> {
        self.status.parse().ok()
    }
}

/// Server-assigned batch identifier plus the initial acknowledgments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchHandle {
    pub batch_id: String,
    #[serde(default)]
    pub files: Vec<FileAck>,
}

/// Response of the batch status endpoint, used to reconcile after a channel gap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchStatusResponse {
    pub batch_id: String,
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub files: Vec<FileAck>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validates_and_normalizes() {
        let options = UploadOptions::default();
        let request = BatchRequest::new("  C-7 ", "MEDIUM", true, false, &options).unwrap();
        assert_eq!(request.case_id(), "C-7");
        assert_eq!(request.quality(), "medium");
        assert!(request.transcription());
        assert!(!request.sync());
        assert_eq!(
            request.form_fields(),
            [
                ("case_id", "C-7".to_string()),
                ("quality", "medium".to_string()),
                ("transcription", "true".to_string()),
                ("sync", "false".to_string()),
            ]
        );
    }

    #[test]
    fn request_with_defaults_uses_options() {
        let options = UploadOptions {
            quality_values: vec!["sd".to_string(), "hd".to_string()],
            default_quality: "hd".to_string(),
            default_transcription: true,
            default_sync: true,
        };
        let request = BatchRequest::with_defaults("case", &options).unwrap();
        assert_eq!(request.quality(), "hd");
        assert!(request.transcription());
        assert!(request.sync());
    }

    #[test]
    fn request_rejects_missing_case_before_quality() {
        let options = UploadOptions::default();
        assert!(matches!(
            BatchRequest::new(" ", "nope", false, false, &options),
            Err(UploadError::MissingCaseId)
        ));
    }

    #[test]
    fn handle_deserializes_without_files() {
        let handle: BatchHandle = serde_json::from_str(r#"{"batch_id":"b-9"}"#).unwrap();
        assert_eq!(handle.batch_id, "b-9");
        assert!(handle.files.is_empty());
    }

    #[test]
    fn file_ack_status_parsing() {
        let ack = FileAck {
            id: "f-1".to_string(),
            status: "received".to_string(),
        };
        assert_eq!(ack.upload_status(), Some(UploadStatus::Uploading));
        let unknown = FileAck {
            id: "f-2".to_string(),
            status: "mystery".to_string(),
        };
        assert_eq!(unknown.upload_status(), None);
    }
}
