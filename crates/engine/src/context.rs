// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task execution context and path layout.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Identity and directories of one task, shared with every block worker.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    pub task_dir: PathBuf,
    /// Directory of the flow document; logic scripts and static prompt
    /// files resolve relative to it.
    pub workflow_dir: PathBuf,
    pub task_input: Map<String, Value>,
}

impl TaskContext {
    pub fn block_dir(&self, block: &str) -> PathBuf {
        self.task_dir.join(block)
    }

    pub fn outputs_dir(&self, block: &str) -> PathBuf {
        self.block_dir(block).join("outputs")
    }

    pub fn result_path(&self, block: &str) -> PathBuf {
        self.outputs_dir(block).join("result.json")
    }

    /// Create the block's working areas (`inputs/`, `outputs/`, `logs/`).
    pub fn ensure_block_dirs(&self, block: &str) -> std::io::Result<()> {
        let dir = self.block_dir(block);
        for sub in ["inputs", "outputs", "logs"] {
            std::fs::create_dir_all(dir.join(sub))?;
        }
        Ok(())
    }

    /// Remove a block's outputs (invalidation and `next` re-entry).
    pub fn clean_outputs(&self, block: &str) -> std::io::Result<()> {
        let outputs = self.outputs_dir(block);
        match std::fs::remove_dir_all(&outputs) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.task_dir.join("state")
    }

    pub fn task_input_value(&self) -> Value {
        Value::Object(self.task_input.clone())
    }
}

/// Per-task command socket path, derived from the task id.
pub fn command_socket_path(task_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("rein-{task_id}.sock"))
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
