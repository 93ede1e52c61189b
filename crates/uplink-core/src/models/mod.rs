//! Data models for batch uploads and progress tracking
//!
//! - `upload`: queue entries and their status progression
//! - `batch`: the submitted request and the server's acknowledgment
//! - `event`: progress events and their wire envelope
//! - `state`: the per-batch state folded from events

mod batch;
mod event;
mod state;
mod upload;

pub use batch::*;
pub use event::*;
pub use state::*;
pub use upload::*;
