//! Scripted transport for exercising subscriptions without a server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uplink_core::{EventKind, ProgressEvent, UploadError};

use super::transport::{ProgressConnection, ProgressTransport};

/// What a scripted connect attempt does.
pub(crate) enum Script {
    Fail,
    /// Deliver these frames, then drop.
    Frames(Vec<String>),
    /// Deliver frames from a channel until it closes.
    Live(mpsc::UnboundedReceiver<String>),
}

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    pub scripts: Mutex<VecDeque<Script>>,
    pub attempts: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub sent: Arc<Mutex<Vec<String>>>,
    pub attempt_times: Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        })
    }
}

struct ScriptedConnection {
    frames: VecDeque<String>,
    live: Option<mpsc::UnboundedReceiver<String>>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ProgressTransport for ScriptedTransport {
    async fn connect(&self) -> Result<Box<dyn ProgressConnection>, UploadError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempt_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::Fail);
        match script {
            Script::Fail => Err(UploadError::Channel("refused".to_string())),
            Script::Frames(frames) => Ok(Box::new(ScriptedConnection {
                frames: frames.into(),
                live: None,
                sent: Arc::clone(&self.sent),
            })),
            Script::Live(rx) => Ok(Box::new(ScriptedConnection {
                frames: VecDeque::new(),
                live: Some(rx),
                sent: Arc::clone(&self.sent),
            })),
        }
    }
}

#[async_trait]
impl ProgressConnection for ScriptedConnection {
    async fn send(&mut self, text: String) -> Result<(), UploadError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, UploadError>> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(Ok(frame));
        }
        match self.live.as_mut() {
            Some(rx) => rx.recv().await.map(Ok),
            None => None,
        }
    }

    async fn close(&mut self) {}
}

pub(crate) fn frame(event: &ProgressEvent) -> String {
    serde_json::to_string(&event.to_wire()).unwrap()
}

pub(crate) fn progress(batch: &str, file: &str, value: f64) -> String {
    frame(
        &ProgressEvent::new(EventKind::FileProcessed, batch)
            .with_file(file)
            .with_progress(value),
    )
}

pub(crate) fn complete(batch: &str) -> String {
    frame(&ProgressEvent::new(EventKind::BatchComplete, batch))
}

