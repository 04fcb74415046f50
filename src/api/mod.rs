pub mod downloads;
pub mod framing;
pub mod manifest;
pub mod models;
pub mod native;

pub use downloads::{DownloadHost, HttpDownloadHost};
pub use models::{DownloadDelta, DownloadItem, HandoffRequest, HandoffResponse, TriggerRequest, TriggerResponse};
pub use native::{NativeChannel, ProcessChannel};
