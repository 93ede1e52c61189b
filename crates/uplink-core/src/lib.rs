//! Uplink Core Library
//!
//! This crate provides the domain models, the progress reducer, error types,
//! configuration, and validation shared by the Uplink client and CLI.
//! Nothing here performs I/O beyond reading local file metadata.

pub mod backoff;
pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod reducer;
pub mod validation;

// Re-export commonly used types
pub use backoff::ReconnectPolicy;
pub use config::{AuthScheme, ClientConfig, UploadOptions};
pub use error::{ErrorMetadata, LogLevel, UploadError};
pub use models::{
    BatchHandle, BatchRequest, BatchState, BatchStatus, BatchStatusResponse, EventKind, FileAck,
    ProgressEvent, UploadItem, UploadStatus, WireMessage,
};
pub use queue::UploadQueue;
pub use reducer::{apply, reduce, IgnoreReason, Outcome};
