use tracing::{error, info};

use super::download_driver::DownloadDriver;
use super::handoff::NativeHandoffClient;
use super::link_resolver::resolve;
use crate::api::downloads::DownloadHost;
use crate::api::models::{TriggerRequest, TriggerResponse};
use crate::api::native::NativeChannel;
use crate::domain::{LocalFileRef, PipelineError};

/// Runs resolve, download and handoff strictly in sequence for one click.
pub struct Pipeline<H: ?Sized, C: ?Sized> {
    driver: DownloadDriver<H>,
    client: NativeHandoffClient<C>,
}

impl<H, C> Pipeline<H, C>
where
    H: DownloadHost + ?Sized,
    C: NativeChannel + ?Sized,
{
    pub fn new(driver: DownloadDriver<H>, client: NativeHandoffClient<C>) -> Self {
        Self { driver, client }
    }

    pub fn handoff_client(&self) -> &NativeHandoffClient<C> {
        &self.client
    }

    /// The first failing stage ends the run; later stages never start.
    pub async fn run(&self, raw_href: &str) -> Result<LocalFileRef, PipelineError> {
        let url = resolve(raw_href)?;
        info!(href = raw_href, %url, "resolved link");

        let file = self.driver.download(&url).await?;
        self.client.handoff(file.clone()).await?;
        Ok(file)
    }

    /// Trigger boundary: every outcome becomes a `{success, error?}` record.
    pub async fn handle(&self, request: TriggerRequest) -> TriggerResponse {
        match request {
            TriggerRequest::DownloadAndOpen { url } => match self.run(&url).await {
                Ok(file) => {
                    info!(path = %file, "opened in slicer");
                    TriggerResponse::ok()
                }
                Err(e) => {
                    error!(href = %url, error = %e, "download and open failed");
                    TriggerResponse::failed(e)
                }
            },
        }
    }
}
