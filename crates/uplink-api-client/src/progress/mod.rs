//! Progress event channel: a persistent connection that streams batch events.
//!
//! [`ProgressChannel`] hands out one [`ProgressSubscription`] per batch. The
//! subscription connects lazily, sends `subscribe_batch`, and yields events until
//! `batch_complete`, cancellation, or the reconnect ceiling.

mod subscription;
#[cfg(test)]
pub(crate) mod testing;
mod transport;
mod websocket;

pub use subscription::{ConnectionState, ProgressChannel, ProgressSubscription};
pub use transport::{ProgressConnection, ProgressTransport};
pub use websocket::WebSocketTransport;
