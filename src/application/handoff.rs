use std::sync::Arc;

use tracing::{info, warn};

use crate::api::models::{HandoffRequest, HandoffResponse};
use crate::api::native::NativeChannel;
use crate::domain::{HandoffError, LocalFileRef};

const DEFAULT_HOST_ERROR: &str = "native host error";

/// Hands downloaded files to the external slicer host.
pub struct NativeHandoffClient<C: ?Sized> {
    channel: Arc<C>,
    host_name: String,
}

impl<C: NativeChannel + ?Sized> NativeHandoffClient<C> {
    pub fn new(channel: Arc<C>, host_name: impl Into<String>) -> Self {
        Self {
            channel,
            host_name: host_name.into(),
        }
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Ask the host to open `file`. Host logs are forwarded but never decide
    /// the outcome.
    pub async fn handoff(&self, file: LocalFileRef) -> Result<(), HandoffError> {
        info!(host = %self.host_name, path = %file, "handing file to native host");
        let request = HandoffRequest::OpenFile { path: file.path };
        let response = self.exchange(&request).await?;

        if response.is_success() {
            info!(host = %self.host_name, "native host opened file");
            return Ok(());
        }

        let message = response
            .error
            .unwrap_or_else(|| DEFAULT_HOST_ERROR.to_string());
        warn!(host = %self.host_name, error = %message, "native host rejected file");
        Err(HandoffError::Rejected(message))
    }

    /// Check that the host is installed and answering.
    pub async fn ping(&self) -> Result<(), HandoffError> {
        let response = self.exchange(&HandoffRequest::Ping).await?;
        match response.result.as_deref() {
            Some("pong") => Ok(()),
            other => Err(HandoffError::UnexpectedReply(
                other.unwrap_or("no result").to_string(),
            )),
        }
    }

    async fn exchange(&self, request: &HandoffRequest) -> Result<HandoffResponse, HandoffError> {
        let reply = self
            .channel
            .send_native_message(&self.host_name, request)
            .await?;
        let response = HandoffResponse::from_value(reply);

        if let Some(logs) = &response.logs {
            for line in logs {
                info!(target: "native_host", host = %self.host_name, "{line}");
            }
        }
        Ok(response)
    }
}
