// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-task event log (`state/rein.log`).
//!
//! Each line is `<ISO-8601> | <message>`. Every `append()` opens, writes,
//! and closes the file — safe for the low write frequency of workflow
//! events, and safe to clone across worker tasks. Failures are logged via
//! tracing but never propagate: logging must not break the engine.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Cloneable handle to a task's event log.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open the log for a task directory (`<task-dir>/state/rein.log`).
    pub fn for_task_dir(task_dir: &Path) -> Self {
        Self::new(crate::log_path(task_dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line.
    pub fn append(&self, message: &str) {
        if let Err(e) = self.write_line(message) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write event log");
        }
    }

    fn write_line(&self, message: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{} | {}", rein_core::iso_now(), message)?;
        file.flush()
    }

    /// Read the last `limit` lines (status views).
    pub fn tail(&self, limit: usize) -> Vec<String> {
        let Ok(text) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(limit);
        lines[start..].iter().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
