//! Error types module
//!
//! All failures of the upload subsystem are unified under [`UploadError`]. The
//! variants fall into four groups:
//!
//! - local validation (rejected before any network call),
//! - submission (non-2xx or transport failure of the single batch request),
//! - progress channel (surfaced only once the reconnect ceiling is exceeded),
//! - configuration.
//!
//! Stale or out-of-order progress events are never errors; the reducer drops them.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a dropped connection
    Warn,
    /// Error level - for unexpected failures and escalations
    Error,
}

/// Metadata describing how an error should be presented to the host application.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "EMPTY_QUEUE")
    fn error_code(&self) -> &'static str;

    /// Whether the caller may retry the same operation
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (may differ from the internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Upload queue is empty")]
    EmptyQueue,

    #[error("Case identifier is required")]
    MissingCaseId,

    #[error("Invalid quality '{value}': expected one of {allowed}")]
    InvalidQuality { value: String, allowed: String },

    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("Batch submission rejected with status {status}: {body}")]
    SubmissionRejected { status: u16, body: String },

    #[error("Batch submission failed: {message}")]
    SubmissionTransport {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Progress channel error: {0}")]
    Channel(String),

    #[error("Progress channel gave up after {attempts} consecutive failed reconnect attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<io::Error> for UploadError {
    fn from(err: io::Error) -> Self {
        UploadError::InvalidFile(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        UploadError::InvalidResponse(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn upload_error_static_metadata(
    err: &UploadError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        UploadError::EmptyQueue => (
            "EMPTY_QUEUE",
            false,
            Some("Add at least one file before submitting"),
            LogLevel::Debug,
        ),
        UploadError::MissingCaseId => (
            "MISSING_CASE_ID",
            false,
            Some("Enter a case identifier"),
            LogLevel::Debug,
        ),
        UploadError::InvalidQuality { .. } => (
            "INVALID_QUALITY",
            false,
            Some("Select one of the configured quality values"),
            LogLevel::Debug,
        ),
        UploadError::InvalidFile(_) => (
            "INVALID_FILE",
            false,
            Some("Check that the file exists and is readable"),
            LogLevel::Debug,
        ),
        UploadError::SubmissionRejected { status, .. } if *status >= 500 => (
            "SUBMISSION_REJECTED",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        UploadError::SubmissionRejected { .. } => (
            "SUBMISSION_REJECTED",
            false,
            Some("Check the batch options and try again"),
            LogLevel::Warn,
        ),
        UploadError::SubmissionTransport { .. } => (
            "SUBMISSION_FAILED",
            true,
            Some("Check the network connection and resubmit"),
            LogLevel::Warn,
        ),
        UploadError::InvalidResponse(_) => (
            "INVALID_RESPONSE",
            false,
            Some("Contact support if this error persists"),
            LogLevel::Error,
        ),
        UploadError::Channel(_) => (
            "CHANNEL_ERROR",
            true,
            Some("Progress updates will resume once the connection is restored"),
            LogLevel::Warn,
        ),
        UploadError::ReconnectExhausted { .. } => (
            "RECONNECT_EXHAUSTED",
            true,
            Some("Re-query the batch status or watch the batch again"),
            LogLevel::Error,
        ),
        UploadError::Config(_) => (
            "CONFIG_ERROR",
            false,
            Some("Fix the client configuration"),
            LogLevel::Error,
        ),
    }
}

impl UploadError {
    /// Wrap a transport-level failure of the submission request.
    pub fn submission_transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        UploadError::SubmissionTransport {
            message: err.to_string(),
            source: anyhow::Error::new(err),
        }
    }

    /// True for errors raised before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            UploadError::EmptyQueue
                | UploadError::MissingCaseId
                | UploadError::InvalidQuality { .. }
                | UploadError::InvalidFile(_)
        )
    }

    /// HTTP status of a rejected submission, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UploadError::SubmissionRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        upload_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        upload_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        upload_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        upload_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            UploadError::SubmissionRejected { status, .. } => {
                format!("The server rejected the batch (status {})", status)
            }
            UploadError::SubmissionTransport { .. } => {
                "Could not reach the upload server".to_string()
            }
            UploadError::InvalidResponse(_) => "Unexpected response from the server".to_string(),
            UploadError::Channel(_) => "Progress updates are temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }
}
