//! Logging init: file under the XDG state dir, or stderr when that fails.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,slicer_handoff=debug";

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `$XDG_STATE_HOME/slicer-handoff/slicer-handoff.log`, creating the directory.
fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("slicer-handoff")?;
    Ok(xdg_dirs.place_state_file("slicer-handoff.log")?)
}

/// Log to `~/.local/state/slicer-handoff/slicer-handoff.log`.
/// Returns Err when the file cannot be opened so the caller can fall back to stderr.
pub fn init_logging(verbose: bool) -> Result<()> {
    let log_file_path = log_file_path()?;

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    tracing::debug!("logging to {}", log_file_path.display());
    Ok(())
}

pub fn init_logging_stderr(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .try_init();
}
