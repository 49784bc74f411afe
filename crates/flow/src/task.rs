// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task descriptors: `task.yaml` plus the on-disk task layout.

use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Descriptor of one task (one concrete execution of a flow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: String,
    pub flow: String,
    #[serde(default)]
    pub input: Map<String, Value>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks_completed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks_failed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks_total: Option<u32>,
}

impl TaskDescriptor {
    pub fn new(id: impl Into<String>, flow: impl Into<String>, input: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            flow: flow.into(),
            input,
            created_at: rein_core::iso_now(),
            status: Some("pending".to_string()),
            completed_at: None,
            blocks_completed: None,
            blocks_failed: None,
            blocks_total: None,
        }
    }

    pub fn path(task_dir: &Path) -> PathBuf {
        task_dir.join("task.yaml")
    }

    pub fn load(task_dir: &Path) -> Result<Self, FlowError> {
        let path = Self::path(task_dir);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| FlowError::Descriptor(format!("{}: {e}", path.display())))?;
        serde_yaml::from_str(&text)
            .map_err(|e| FlowError::Descriptor(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, task_dir: &Path) -> Result<(), FlowError> {
        let text = serde_yaml::to_string(self)
            .map_err(|e| FlowError::Descriptor(e.to_string()))?;
        std::fs::write(Self::path(task_dir), text)
            .map_err(|e| FlowError::Descriptor(e.to_string()))
    }

    /// Record the final outcome on the descriptor.
    pub fn finalize(&mut self, status: &str, completed: u32, failed: u32, total: u32) {
        self.status = Some(status.to_string());
        self.completed_at = Some(rein_core::iso_now());
        self.blocks_completed = Some(completed);
        self.blocks_failed = Some(failed);
        self.blocks_total = Some(total);
    }
}

/// Create a fresh task directory tree: descriptor, `input/`, `state/`,
/// and the `pending` status marker.
pub fn create_task_dir(
    tasks_root: &Path,
    descriptor: &TaskDescriptor,
) -> Result<PathBuf, FlowError> {
    let task_dir = tasks_root.join(&descriptor.id);
    let io = |e: std::io::Error| FlowError::Descriptor(e.to_string());
    std::fs::create_dir_all(task_dir.join("input")).map_err(io)?;
    std::fs::create_dir_all(task_dir.join("state")).map_err(io)?;
    descriptor.save(&task_dir)?;
    std::fs::write(task_dir.join("state").join("status"), "pending\n").map_err(io)?;
    Ok(task_dir)
}

/// Load task input from the task directory, in priority order:
/// `task.input.json`, `input/task.json`, then `input/question.txt`
/// (free-form text populated as both `task` and `topic`). Falls back to
/// the descriptor's own `input` map.
pub fn load_task_input(task_dir: &Path, descriptor: &TaskDescriptor) -> Map<String, Value> {
    for candidate in [
        task_dir.join("task.input.json"),
        task_dir.join("input").join("task.json"),
    ] {
        if let Ok(text) = std::fs::read_to_string(&candidate) {
            if let Ok(Value::Object(map)) = serde_json::from_str(&text) {
                return map;
            }
        }
    }

    let question = task_dir.join("input").join("question.txt");
    if let Ok(text) = std::fs::read_to_string(&question) {
        let question = text.trim().to_string();
        if !question.is_empty() {
            let mut map = Map::new();
            map.insert("task".to_string(), Value::String(question.clone()));
            map.insert("topic".to_string(), Value::String(question));
            return map;
        }
    }

    descriptor.input.clone()
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
