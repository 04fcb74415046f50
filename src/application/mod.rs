pub mod download_driver;
pub mod handoff;
pub mod link_resolver;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use download_driver::DownloadDriver;
pub use handoff::NativeHandoffClient;
pub use link_resolver::{is_slicer_href, resolve};
pub use pipeline::Pipeline;
