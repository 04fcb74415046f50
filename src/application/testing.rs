//! In-memory download host and native channel for exercising the pipeline.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::api::downloads::DownloadHost;
use crate::api::models::{DownloadDelta, DownloadItem, HandoffRequest};
use crate::api::native::NativeChannel;
use crate::domain::{DownloadError, DownloadId, DownloadState, ResolvedFileUrl, TransportError};

pub const SESSION: DownloadId = DownloadId(7);
const OTHER_SESSION: DownloadId = DownloadId(8);

#[derive(Debug, Clone)]
enum Outcome {
    Complete(Option<String>),
    Interrupt,
    Silent,
    FailStart,
    Close,
}

/// Download host that plays a fixed script of deltas as soon as a download starts.
pub struct FakeDownloadHost {
    events: Mutex<Option<broadcast::Sender<DownloadDelta>>>,
    outcome: Outcome,
    noise: bool,
    trailing_noise: bool,
    started: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<DownloadId>>,
}

impl FakeDownloadHost {
    fn new(outcome: Outcome) -> Self {
        Self::with_capacity(outcome, 16)
    }

    fn with_capacity(outcome: Outcome, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            events: Mutex::new(Some(events)),
            outcome,
            noise: false,
            trailing_noise: false,
            started: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    pub fn completing(path: &str) -> Self {
        Self::new(Outcome::Complete(Some(path.to_string())))
    }

    pub fn completing_without_records() -> Self {
        Self::new(Outcome::Complete(None))
    }

    pub fn interrupting() -> Self {
        Self::new(Outcome::Interrupt)
    }

    pub fn silent() -> Self {
        Self::new(Outcome::Silent)
    }

    pub fn failing_to_start() -> Self {
        Self::new(Outcome::FailStart)
    }

    pub fn closing() -> Self {
        Self::new(Outcome::Close)
    }

    /// Completes, but a one-slot channel overflows so the listener only sees
    /// a foreign delta after the terminal one has been overwritten.
    pub fn lagging(path: &str) -> Self {
        let mut host = Self::with_capacity(Outcome::Complete(Some(path.to_string())), 1);
        host.trailing_noise = true;
        host
    }

    /// Precede the script with terminal deltas for an unrelated session.
    pub fn with_noise(mut self) -> Self {
        self.noise = true;
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<DownloadId> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn emit(&self, id: DownloadId, state: Option<DownloadState>) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            let _ = events.send(DownloadDelta { id, state });
        }
    }
}

#[async_trait]
impl DownloadHost for FakeDownloadHost {
    fn subscribe(&self) -> broadcast::Receiver<DownloadDelta> {
        match self.events.lock().unwrap().as_ref() {
            Some(events) => events.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    async fn start(&self, url: &ResolvedFileUrl) -> Result<DownloadId, DownloadError> {
        self.started.lock().unwrap().push(url.as_str().to_string());

        if self.noise {
            self.emit(OTHER_SESSION, Some(DownloadState::Complete));
            self.emit(OTHER_SESSION, Some(DownloadState::Interrupted));
            self.emit(SESSION, None);
        }

        match &self.outcome {
            Outcome::FailStart => return Err(DownloadError::Start("host refused".to_string())),
            Outcome::Complete(_) => {
                self.emit(SESSION, Some(DownloadState::InProgress));
                self.emit(SESSION, Some(DownloadState::Complete));
            }
            Outcome::Interrupt => {
                self.emit(SESSION, Some(DownloadState::InProgress));
                self.emit(SESSION, Some(DownloadState::Interrupted));
            }
            Outcome::Silent => self.emit(SESSION, Some(DownloadState::InProgress)),
            Outcome::Close => {
                self.emit(SESSION, Some(DownloadState::InProgress));
                self.events.lock().unwrap().take();
            }
        }

        if self.trailing_noise {
            self.emit(OTHER_SESSION, None);
        }
        Ok(SESSION)
    }

    async fn search(&self, id: DownloadId) -> Result<Vec<DownloadItem>, DownloadError> {
        match &self.outcome {
            Outcome::Complete(Some(path)) if id == SESSION => Ok(vec![DownloadItem {
                id,
                filename: path.clone(),
                state: DownloadState::Complete,
            }]),
            _ => Ok(Vec::new()),
        }
    }

    async fn cancel(&self, id: DownloadId) -> Result<(), DownloadError> {
        self.cancelled.lock().unwrap().push(id);
        Ok(())
    }
}

/// Native channel that records requests and answers with a canned reply.
pub struct FakeNativeChannel {
    reply: Option<Value>,
    requests: Mutex<Vec<(String, HandoffRequest)>>,
}

impl FakeNativeChannel {
    pub fn replying(reply: Value) -> Self {
        Self {
            reply: Some(reply),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Behaves like a host whose executable is missing.
    pub fn unreachable() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(String, HandoffRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NativeChannel for FakeNativeChannel {
    async fn send_native_message(
        &self,
        host_name: &str,
        request: &HandoffRequest,
    ) -> Result<Value, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((host_name.to_string(), request.clone()));

        self.reply.clone().ok_or_else(|| TransportError::Spawn {
            program: PathBuf::from("/opt/bambu/bambu_host.py"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        })
    }
}
