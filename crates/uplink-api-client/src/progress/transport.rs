use async_trait::async_trait;
use uplink_core::UploadError;

/// Opens connections to the progress endpoint.
///
/// A subscription calls [`connect`](ProgressTransport::connect) once per attempt
/// and never holds more than one connection.
#[async_trait]
pub trait ProgressTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ProgressConnection>, UploadError>;
}

/// One open duplex connection carrying JSON text frames.
#[async_trait]
pub trait ProgressConnection: Send {
    async fn send(&mut self, text: String) -> Result<(), UploadError>;

    /// Next text frame. `None` means the peer closed the connection.
    async fn recv(&mut self) -> Option<Result<String, UploadError>>;

    async fn close(&mut self);
}
