use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::manifest::default_manifest_dirs;

const APP_PREFIX: &str = "slicer-handoff";
pub const DEFAULT_HOST_NAME: &str = "com.manyfold.bambu";
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Settings loaded from `~/.config/slicer-handoff/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Name of the native messaging host that opens files.
    pub host_name: String,
    /// Launch this executable directly instead of looking up the host manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_command: Option<PathBuf>,
    /// Arguments passed to `host_command`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub host_args: Vec<String>,
    /// Manifest directories searched before the browsers' own.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub manifest_dirs: Vec<PathBuf>,
    /// Where downloads are written; defaults to `~/Downloads`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    /// Upper bound on waiting for a download to finish. 0 waits forever.
    pub download_timeout_secs: u64,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            host_name: DEFAULT_HOST_NAME.to_string(),
            host_command: None,
            host_args: Vec::new(),
            manifest_dirs: Vec::new(),
            download_dir: None,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

impl HandoffConfig {
    pub fn download_timeout(&self) -> Option<Duration> {
        (self.download_timeout_secs > 0).then(|| Duration::from_secs(self.download_timeout_secs))
    }

    pub fn download_dir_in(&self, home: &Path) -> PathBuf {
        self.download_dir
            .as_ref()
            .map(|dir| expand_home(dir, home))
            .unwrap_or_else(|| home.join("Downloads"))
    }

    /// Configured manifest directories first, then the browsers' defaults.
    pub fn manifest_search_dirs(&self, home: &Path) -> Vec<PathBuf> {
        self.manifest_dirs
            .iter()
            .map(|dir| expand_home(dir, home))
            .chain(default_manifest_dirs(home))
            .collect()
    }
}

/// `~/x` and relative paths are taken relative to the home directory.
fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) if path.is_relative() => home.join(path),
        Err(_) => path.to_path_buf(),
    }
}

pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .context("cannot determine home directory")
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_PREFIX)?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init_at(path: &Path) -> Result<HandoffConfig> {
    if !path.exists() {
        let default_cfg = HandoffConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: HandoffConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
