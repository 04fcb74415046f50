//! Redirect "open in slicer" links to a slicer of your choice.
//!
//! A click runs three stages in order: the link is resolved to the remote
//! model URL, the model is downloaded, and the local path is handed to a
//! native messaging host that opens it.

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod logging;
pub mod utils;

pub use application::{resolve, DownloadDriver, NativeHandoffClient, Pipeline};
pub use domain::{DownloadError, HandoffError, PipelineError, ResolutionError};
