use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// No http(s) file URL could be recovered from a link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("invalid link: {0}")]
    InvalidHref(String),

    #[error("unsupported link scheme: {0}")]
    UnsupportedScheme(String),

    #[error("no file url found")]
    NoFileUrl,
}

/// Host-side download failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("failed to start download: {0}")]
    Start(String),

    #[error("download interrupted")]
    Interrupted,

    #[error("no results")]
    NoResults,

    #[error("download timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("download host stopped reporting state changes")]
    HostClosed,

    #[error("download query failed: {0}")]
    Query(String),
}

/// Failures of the message channel itself, before any response is read.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("native host {0} is not registered")]
    ManifestNotFound(String),

    #[error("invalid native host manifest {}: {reason}", .path.display())]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("failed to launch {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message of {0} bytes exceeds the size limit")]
    TooLarge(usize),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("native host exited without responding")]
    Disconnected,
}

/// Process-side handoff failures.
#[derive(Debug, Error)]
pub enum HandoffError {
    /// The host answered but did not report success.
    #[error("{0}")]
    Rejected(String),

    #[error("native host failed: {0}")]
    Transport(#[from] TransportError),

    #[error("unexpected native host reply: {0}")]
    UnexpectedReply(String),
}

/// The single error a pipeline run surfaces, carrying the failing stage's message.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),
}
