pub mod error;
pub mod model;

pub use error::{DownloadError, HandoffError, PipelineError, ResolutionError, TransportError};
pub use model::{
    DownloadHandle, DownloadId, DownloadState, LinkProtocol, LocalFileRef, ResolvedFileUrl,
    SlicerLink, SlicerProtocol,
};
