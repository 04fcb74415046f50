use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::models::{DownloadDelta, DownloadItem};
use crate::domain::{DownloadError, DownloadId, DownloadState, ResolvedFileUrl};
use crate::utils::{candidate_paths, filename_from_url};

/// Broadcast channel capacity for download state changes
const EVENT_CAPACITY: usize = 64;
/// Finished sessions kept for `search`; older ones are forgotten first.
const RETAINED_FINISHED: usize = 64;
const MAX_NAME_ATTEMPTS: usize = 1000;

/// The host's download subsystem.
#[async_trait]
pub trait DownloadHost: Send + Sync {
    /// Register a state-change listener. Dropping the receiver detaches it.
    fn subscribe(&self) -> broadcast::Receiver<DownloadDelta>;

    /// Begin downloading `url`, returning the session identifier.
    async fn start(&self, url: &ResolvedFileUrl) -> Result<DownloadId, DownloadError>;

    /// Records for a session; empty when the host knows nothing about it.
    async fn search(&self, id: DownloadId) -> Result<Vec<DownloadItem>, DownloadError>;

    /// Stop a session that is still running. Finished sessions are left alone.
    async fn cancel(&self, id: DownloadId) -> Result<(), DownloadError>;
}

#[derive(Error, Debug)]
enum TransferError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Download host that fetches over HTTP into a local directory.
#[derive(Clone)]
pub struct HttpDownloadHost {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    download_dir: PathBuf,
    events: broadcast::Sender<DownloadDelta>,
    records: Mutex<Records>,
    /// Running transfers. Whoever removes a session's entry settles it.
    tasks: Mutex<HashMap<DownloadId, AbortHandle>>,
    next_id: AtomicU64,
}

struct Records {
    items: HashMap<DownloadId, DownloadItem>,
    finished: VecDeque<DownloadId>,
    retain_finished: usize,
}

impl HttpDownloadHost {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self::with_client(Client::new(), download_dir)
    }

    pub fn with_client(client: Client, download_dir: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                client,
                download_dir: download_dir.into(),
                events,
                records: Mutex::new(Records {
                    items: HashMap::new(),
                    finished: VecDeque::new(),
                    retain_finished: RETAINED_FINISHED,
                }),
                tasks: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Keep at most `limit` finished sessions queryable.
    pub fn retaining_finished(self, limit: usize) -> Self {
        self.inner.records().retain_finished = limit;
        self
    }

    /// Number of attached state-change listeners
    pub fn listener_count(&self) -> usize {
        self.inner.events.receiver_count()
    }
}

/// Create a file for `filename` in `dir` without touching existing ones.
async fn create_unique(
    dir: &Path,
    filename: &str,
) -> std::io::Result<(PathBuf, tokio::fs::File)> {
    for path in candidate_paths(dir, filename).take(MAX_NAME_ATTEMPTS) {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free name for {filename}"),
    ))
}

#[async_trait]
impl DownloadHost for HttpDownloadHost {
    fn subscribe(&self) -> broadcast::Receiver<DownloadDelta> {
        self.inner.events.subscribe()
    }

    async fn start(&self, url: &ResolvedFileUrl) -> Result<DownloadId, DownloadError> {
        let url = Url::parse(url.as_str()).map_err(|e| DownloadError::Start(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DownloadError::Start(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let dir = &self.inner.download_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| DownloadError::Start(format!("{}: {}", dir.display(), e)))?;

        // Creating the file up front reserves the name.
        let (path, file) = create_unique(dir, &filename_from_url(&url))
            .await
            .map_err(|e| DownloadError::Start(format!("Failed to create file: {}", e)))?;

        let id = DownloadId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.records().items.insert(
            id,
            DownloadItem {
                id,
                filename: path.to_string_lossy().into_owned(),
                state: DownloadState::InProgress,
            },
        );
        info!(%id, %url, path = %path.display(), "download started");

        let inner = Arc::clone(&self.inner);
        let mut tasks = self.inner.tasks();
        let task = tokio::spawn(async move { inner.run(id, url, file, path).await });
        tasks.insert(id, task.abort_handle());
        drop(tasks);

        Ok(id)
    }

    async fn search(&self, id: DownloadId) -> Result<Vec<DownloadItem>, DownloadError> {
        let records = self
            .inner
            .records
            .lock()
            .map_err(|_| DownloadError::Query("download records unavailable".to_string()))?;
        Ok(records.items.get(&id).cloned().into_iter().collect())
    }

    async fn cancel(&self, id: DownloadId) -> Result<(), DownloadError> {
        let Some(task) = self.inner.claim(id) else {
            return Ok(());
        };
        task.abort();

        let path = self
            .inner
            .records()
            .items
            .get(&id)
            .map(|item| PathBuf::from(&item.filename));
        if let Some(path) = path {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!(%id, error = %e, "could not remove partial file");
            }
        }

        info!(%id, "download cancelled");
        self.inner.finish(id, DownloadState::Interrupted);
        Ok(())
    }
}

impl Inner {
    async fn run(&self, id: DownloadId, url: Url, file: tokio::fs::File, path: PathBuf) {
        let outcome = self.transfer(id, url, file).await;
        if self.claim(id).is_none() {
            // Cancelled; the canceller settles the session.
            return;
        }

        match outcome {
            Ok(downloaded) => {
                info!(%id, bytes = downloaded, "download complete");
                self.finish(id, DownloadState::Complete);
            }
            Err(e) => {
                warn!(%id, error = %e, "download interrupted");
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    debug!(%id, error = %e, "could not remove partial file");
                }
                self.finish(id, DownloadState::Interrupted);
            }
        }
    }

    async fn transfer(
        &self,
        id: DownloadId,
        url: Url,
        mut file: tokio::fs::File,
    ) -> Result<u64, TransferError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let total = response.content_length();
        self.emit(DownloadDelta::state(id, DownloadState::InProgress));

        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            debug!(%id, downloaded, total, "chunk written");
        }

        file.sync_all().await?;
        Ok(downloaded)
    }

    fn records(&self) -> std::sync::MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, HashMap<DownloadId, AbortHandle>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self, id: DownloadId) -> Option<AbortHandle> {
        self.tasks().remove(&id)
    }

    fn finish(&self, id: DownloadId, state: DownloadState) {
        {
            let mut records = self.records();
            if let Some(item) = records.items.get_mut(&id) {
                item.state = state;
                records.finished.push_back(id);
            }
            while records.finished.len() > records.retain_finished {
                if let Some(old) = records.finished.pop_front() {
                    records.items.remove(&old);
                    debug!(id = %old, "forgot finished download");
                }
            }
        }
        self.emit(DownloadDelta::state(id, state));
    }

    fn emit(&self, delta: DownloadDelta) {
        // No listeners is fine; the record still holds the state.
        let _ = self.events.send(delta);
    }
}
