//! Response models for the ComfyUI HTTP API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

/// Response to a prompt submission.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QueueResponse {
    /// Server-assigned id for the queued prompt. Treated as opaque.
    pub prompt_id: String,
    /// The prompt number in the execution queue.
    pub number: Option<u64>,
    /// Per-node validation errors, indexed by node id.
    #[serde(default)]
    pub node_errors: HashMap<String, Value>,
}

/// A single output file reference from a completed node.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Storage location tag (`output`, `temp`, …).
    #[serde(rename = "type")]
    pub location: Option<String>,
    /// MIME-style format marker; video outputs carry `video/...`.
    pub format: Option<String>,
    pub frame_rate: Option<f64>,
    pub fullpath: Option<String>,
}

impl FileInfo {
    pub fn is_video(&self) -> bool {
        self.format
            .as_deref()
            .map(|f| f.starts_with("video/"))
            .unwrap_or(false)
    }
}

/// Outputs recorded for one node. Videos surface under `gifs` on some node
/// packs and `videos` on others; both are collected.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<FileInfo>,
    #[serde(default)]
    pub gifs: Vec<FileInfo>,
    #[serde(default)]
    pub videos: Vec<FileInfo>,
}

/// Execution status block of a history entry.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TaskStatus {
    pub status_str: Option<String>,
    pub completed: Option<bool>,
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// One prompt's history entry.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Task {
    #[serde(default)]
    pub outputs: HashMap<String, NodeOutput>,
    pub status: Option<TaskStatus>,
}

/// Kind of a collected output file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    Image,
    Video,
}

/// An output file attributed to the node that produced it.
#[derive(Clone, Debug)]
pub struct OutputFile {
    pub node_id: String,
    pub kind: OutputKind,
    pub file: FileInfo,
}

impl Task {
    /// Whether the server marked this task complete.
    pub fn is_completed(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.completed)
            .unwrap_or(false)
    }

    /// Whether the server marked this task failed.
    pub fn is_errored(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.status_str.as_deref())
            .map(|s| s == "error")
            .unwrap_or(false)
    }

    /// Extracts a human-readable failure description from the status
    /// messages, when the server recorded an `execution_error` entry.
    pub fn error_message(&self) -> Option<String> {
        let status = self.status.as_ref()?;
        for message in &status.messages {
            let kind = message.get(0).and_then(Value::as_str);
            if kind != Some("execution_error") {
                continue;
            }
            let details = message.get(1)?;
            let node_id = details
                .get("node_id")
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let node_type = details
                .get("node_type")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let exception = details
                .get("exception_message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Some(format!(
                "error in node {} ({}): {}",
                node_id, node_type, exception
            ));
        }
        if self.is_errored() {
            return Some("workflow execution failed".to_string());
        }
        None
    }

    /// Flattens all recorded node outputs into attributed file references.
    pub fn output_files(&self) -> Vec<OutputFile> {
        let mut files = Vec::new();
        for (node_id, output) in &self.outputs {
            for file in &output.images {
                files.push(OutputFile {
                    node_id: node_id.clone(),
                    kind: if file.is_video() {
                        OutputKind::Video
                    } else {
                        OutputKind::Image
                    },
                    file: file.clone(),
                });
            }
            for file in output.gifs.iter().chain(&output.videos) {
                files.push(OutputFile {
                    node_id: node_id.clone(),
                    kind: OutputKind::Video,
                    file: file.clone(),
                });
            }
        }
        files.sort_by(|a, b| a.node_id.cmp(&b.node_id).then(a.file.filename.cmp(&b.file.filename)));
        files
    }
}

/// Position of a prompt in the server's execution queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueuePosition {
    Running,
    /// 1-based position among pending prompts.
    Pending(usize),
}

/// The `/queue` endpoint response. Queue entries are heterogeneous arrays
/// with the prompt id at index 1.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct QueueStatus {
    #[serde(default)]
    pub queue_running: Vec<Value>,
    #[serde(default)]
    pub queue_pending: Vec<Value>,
}

impl QueueStatus {
    pub fn position_of(&self, prompt_id: &str) -> Option<QueuePosition> {
        if self
            .queue_running
            .iter()
            .any(|entry| entry_matches(entry, prompt_id))
        {
            return Some(QueuePosition::Running);
        }
        self.queue_pending
            .iter()
            .position(|entry| entry_matches(entry, prompt_id))
            .map(|idx| QueuePosition::Pending(idx + 1))
    }

    pub fn pending_len(&self) -> usize {
        self.queue_pending.len()
    }
}

fn entry_matches(entry: &Value, prompt_id: &str) -> bool {
    entry.get(1).and_then(Value::as_str) == Some(prompt_id)
}
