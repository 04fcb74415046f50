//! Native messaging host manifests.
//!
//! Browsers map a host name such as `com.manyfold.bambu` to an executable
//! through a `<name>.json` manifest in a per-browser directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::domain::TransportError;

#[derive(Debug, Clone, Deserialize)]
pub struct HostManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Per-user manifest directories for the browsers that speak native messaging.
pub fn default_manifest_dirs(home: &Path) -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    let user_dirs = [
        "Library/Application Support/Google/Chrome/NativeMessagingHosts",
        "Library/Application Support/Microsoft Edge/NativeMessagingHosts",
        "Library/Application Support/Chromium/NativeMessagingHosts",
        "Library/Application Support/Mozilla/NativeMessagingHosts",
    ];
    #[cfg(not(target_os = "macos"))]
    let user_dirs = [
        ".config/google-chrome/NativeMessagingHosts",
        ".config/microsoft-edge/NativeMessagingHosts",
        ".config/chromium/NativeMessagingHosts",
        ".mozilla/native-messaging-hosts",
    ];

    user_dirs.iter().map(|dir| home.join(dir)).collect()
}

/// Find the executable registered for `host_name`, checking `dirs` in order.
pub fn locate_host(host_name: &str, dirs: &[PathBuf]) -> Result<PathBuf, TransportError> {
    for dir in dirs {
        let manifest_path = dir.join(format!("{host_name}.json"));
        if !manifest_path.is_file() {
            continue;
        }
        debug!(manifest = %manifest_path.display(), "found native host manifest");

        let manifest = read_manifest(&manifest_path)?;
        let invalid = |reason: String| TransportError::InvalidManifest {
            path: manifest_path.clone(),
            reason,
        };
        if manifest.name != host_name {
            return Err(invalid(format!("declares name {}", manifest.name)));
        }
        if manifest.kind != "stdio" {
            return Err(invalid(format!("unsupported type {}", manifest.kind)));
        }

        // Relative paths are relative to the manifest's directory.
        let program = if manifest.path.is_absolute() {
            manifest.path
        } else {
            dir.join(manifest.path)
        };
        return Ok(program);
    }

    Err(TransportError::ManifestNotFound(host_name.to_string()))
}

fn read_manifest(path: &Path) -> Result<HostManifest, TransportError> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| TransportError::InvalidManifest {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
