// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coarse task status marker (`state/status`) and worker exit code.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Coarse task state as written to `state/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// Write the status marker. Errors are surfaced — the marker is part of
/// the watcher contract, not best-effort logging.
pub fn write_status(task_dir: &Path, status: TaskStatus) -> std::io::Result<()> {
    let state_dir = task_dir.join("state");
    std::fs::create_dir_all(&state_dir)?;
    std::fs::write(state_dir.join("status"), format!("{status}\n"))
}

/// Read the status marker, if present and well-formed.
pub fn read_status(task_dir: &Path) -> Option<TaskStatus> {
    let text = std::fs::read_to_string(task_dir.join("state").join("status")).ok()?;
    text.parse().ok()
}

/// Remove the marker (the watcher deletes `pending` before spawning).
pub fn clear_status(task_dir: &Path) -> std::io::Result<()> {
    let path = task_dir.join("state").join("status");
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Record the worker's exit code (`state/exit_code`).
pub fn write_exit_code(task_dir: &Path, code: i32) -> std::io::Result<()> {
    let state_dir = task_dir.join("state");
    std::fs::create_dir_all(&state_dir)?;
    std::fs::write(state_dir.join("exit_code"), format!("{code}\n"))
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
