use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use super::framing::{read_message, write_message, MAX_RESPONSE_BYTES};
use super::manifest::locate_host;
use super::models::HandoffRequest;
use crate::domain::TransportError;

/// How long a host may keep running after it has replied.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// A message channel to a named external process.
#[async_trait]
pub trait NativeChannel: Send + Sync {
    /// Send one request and wait for its single reply.
    async fn send_native_message(
        &self,
        host_name: &str,
        request: &HandoffRequest,
    ) -> Result<Value, TransportError>;
}

/// How to launch the native host.
#[derive(Debug, Clone)]
enum Launch {
    Manifest(Vec<PathBuf>),
    Command { program: PathBuf, args: Vec<String> },
}

/// Channel that launches the native host per request and talks to it over
/// stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessChannel {
    launch: Launch,
    max_response_bytes: usize,
}

impl ProcessChannel {
    /// Resolve host names through manifests found in `manifest_dirs`.
    pub fn from_manifests(manifest_dirs: Vec<PathBuf>) -> Self {
        Self {
            launch: Launch::Manifest(manifest_dirs),
            max_response_bytes: MAX_RESPONSE_BYTES,
        }
    }

    /// Always launch `program` with `args`, whatever host name is requested.
    pub fn from_command(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            launch: Launch::Command {
                program: program.into(),
                args,
            },
            max_response_bytes: MAX_RESPONSE_BYTES,
        }
    }

    fn command(&self, host_name: &str) -> Result<(PathBuf, Vec<String>), TransportError> {
        match &self.launch {
            Launch::Manifest(dirs) => Ok((locate_host(host_name, dirs)?, Vec::new())),
            Launch::Command { program, args } => Ok((program.clone(), args.clone())),
        }
    }
}

#[async_trait]
impl NativeChannel for ProcessChannel {
    async fn send_native_message(
        &self,
        host_name: &str,
        request: &HandoffRequest,
    ) -> Result<Value, TransportError> {
        let (program, args) = self.command(host_name)?;
        debug!(host = host_name, program = %program.display(), "launching native host");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let Some(stderr) = child.stderr.take() {
            let host = host_name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(target: "native_host", host = %host, "{line}");
                }
            });
        }

        let mut stdin = child.stdin.take().ok_or(TransportError::Disconnected)?;
        write_message(&mut stdin, request).await?;
        // Closing stdin ends the host's read loop once it has replied.
        drop(stdin);

        let mut stdout = child.stdout.take().ok_or(TransportError::Disconnected)?;
        let reply = read_message(&mut stdout, self.max_response_bytes)
            .await?
            .ok_or(TransportError::Disconnected)?;

        // The reply settles the exchange; the host is reaped off the request path.
        tokio::spawn(reap(child, host_name.to_string()));

        Ok(reply)
    }
}

async fn reap(mut child: Child, host: String) {
    match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
        Ok(Ok(status)) => debug!(host = %host, %status, "native host exited"),
        Ok(Err(e)) => debug!(host = %host, error = %e, "could not wait for native host"),
        Err(_) => {
            debug!(host = %host, "native host still running after reply, stopping it");
            if let Err(e) = child.kill().await {
                debug!(host = %host, error = %e, "could not stop native host");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_request() -> HandoffRequest {
        HandoffRequest::OpenFile {
            path: "model.stl".to_string(),
        }
    }

    fn shell(script: &str) -> ProcessChannel {
        ProcessChannel::from_command("/bin/sh", vec!["-c".to_string(), script.to_string()])
    }

    #[cfg(target_endian = "little")]
    #[tokio::test]
    async fn test_round_trip_through_process() {
        // 16-byte little-endian prefix, then {"success":true}
        let channel = shell(r#"cat >/dev/null; printf '\020\000\000\000{"success":true}'"#);
        let reply = channel
            .send_native_message("com.manyfold.bambu", &open_request())
            .await
            .unwrap();
        assert_eq!(reply, json!({"success": true}));
    }

    #[cfg(target_endian = "little")]
    #[tokio::test]
    async fn test_lingering_host_still_returns_reply() {
        let channel =
            shell(r#"cat >/dev/null; printf '\020\000\000\000{"success":true}'; sleep 30"#);
        let reply = tokio::time::timeout(
            Duration::from_secs(3),
            channel.send_native_message("com.manyfold.bambu", &open_request()),
        )
        .await
        .expect("reply was written but the exchange did not settle")
        .unwrap();
        assert_eq!(reply, json!({"success": true}));
    }

    #[tokio::test]
    async fn test_host_exiting_silently_is_disconnect() {
        let channel = shell("cat >/dev/null");
        let err = channel
            .send_native_message("com.manyfold.bambu", &open_request())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Disconnected));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let channel = ProcessChannel::from_command("/nonexistent/bambu_host", Vec::new());
        let err = channel
            .send_native_message("com.manyfold.bambu", &open_request())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_unregistered_host() {
        let dir = tempfile::tempdir().unwrap();
        let channel = ProcessChannel::from_manifests(vec![dir.path().to_path_buf()]);
        let err = channel
            .send_native_message("com.manyfold.bambu", &open_request())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ManifestNotFound(_)));
    }
}
