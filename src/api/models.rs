use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{DownloadId, DownloadState};

/// State-change notification published by the download host.
///
/// `state` is `None` for deltas that only touch other fields (bytes received,
/// filename), mirroring how browser download hosts report changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDelta {
    pub id: DownloadId,
    pub state: Option<DownloadState>,
}

impl DownloadDelta {
    pub fn state(id: DownloadId, state: DownloadState) -> Self {
        Self {
            id,
            state: Some(state),
        }
    }
}

/// A download record returned by a host query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub id: DownloadId,
    pub filename: String,
    pub state: DownloadState,
}

/// Request sent to the native host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HandoffRequest {
    OpenFile { path: String },
    Ping,
}

/// Response from the native host. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandoffResponse {
    pub success: Option<bool>,
    pub error: Option<String>,
    pub logs: Option<Vec<String>>,
    pub result: Option<String>,
}

impl HandoffResponse {
    /// Interpret an arbitrary reply. Anything that is not an object, or whose
    /// fields have unexpected types, carries no success flag.
    pub fn from_value(value: Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        let field = |name: &str| value.get(name);
        Self {
            success: field("success").and_then(Value::as_bool),
            error: field("error")
                .and_then(Value::as_str)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            logs: field("logs").and_then(Value::as_array).map(|lines| {
                lines
                    .iter()
                    .map(|line| match line {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            }),
            result: field("result").and_then(Value::as_str).map(str::to_string),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }
}

/// Message accepted at the trigger boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerRequest {
    DownloadAndOpen { url: String },
}

/// Answer returned to the trigger boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TriggerResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}
