use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::api::downloads::DownloadHost;
use crate::api::models::DownloadDelta;
use crate::domain::{
    DownloadError, DownloadHandle, DownloadId, DownloadState, LocalFileRef, ResolvedFileUrl,
};

/// Drives one host download from start to a terminal state.
pub struct DownloadDriver<H: ?Sized> {
    host: Arc<H>,
    timeout: Option<Duration>,
}

impl<H: DownloadHost + ?Sized> DownloadDriver<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            timeout: None,
        }
    }

    /// Bound the wait for a terminal state. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn download(&self, url: &ResolvedFileUrl) -> Result<LocalFileRef, DownloadError> {
        // Attach before starting so a fast transfer cannot finish unobserved.
        let events = self.host.subscribe();
        let id = self.host.start(url).await?;
        info!(%id, %url, "waiting for download");

        // The listener is moved into the wait and dropped with it on every path,
        // including the timeout.
        let wait = self.await_terminal(events, id);
        let handle = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(%id, ?limit, "download timed out, cancelling");
                    if let Err(e) = self.host.cancel(id).await {
                        debug!(%id, error = %e, "could not cancel download");
                    }
                    return Err(DownloadError::Timeout(limit));
                }
            },
            None => wait.await?,
        };

        self.locate(handle.id).await
    }

    async fn await_terminal(
        &self,
        mut events: broadcast::Receiver<DownloadDelta>,
        id: DownloadId,
    ) -> Result<DownloadHandle, DownloadError> {
        let mut handle = DownloadHandle::new(id);
        loop {
            let state = match events.recv().await {
                Ok(DownloadDelta {
                    id: delta_id,
                    state: Some(state),
                }) if delta_id == id => state,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%id, skipped, "missed download events, checking host records");
                    match self.recorded_state(id).await? {
                        Some(state) => state,
                        None => continue,
                    }
                }
                Err(RecvError::Closed) => return Err(DownloadError::HostClosed),
            };

            handle.state = state;
            match state {
                DownloadState::InProgress => debug!(%id, "download in progress"),
                DownloadState::Complete => return Ok(handle),
                DownloadState::Interrupted => {
                    warn!(%id, "download interrupted");
                    return Err(DownloadError::Interrupted);
                }
            }
        }
    }

    async fn recorded_state(&self, id: DownloadId) -> Result<Option<DownloadState>, DownloadError> {
        let items = self.host.search(id).await?;
        Ok(items.first().map(|item| item.state))
    }

    async fn locate(&self, id: DownloadId) -> Result<LocalFileRef, DownloadError> {
        let item = self
            .host
            .search(id)
            .await?
            .into_iter()
            .next()
            .ok_or(DownloadError::NoResults)?;
        info!(%id, path = %item.filename, "download finished");
        Ok(LocalFileRef::new(item.filename))
    }
}
