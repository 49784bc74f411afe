// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logic script runner: interpreter dispatch, stdin context, timeout.

use rein_storage::EventLog;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default per-script timeout (8 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(480);

#[derive(Debug, Error)]
pub enum LogicError {
    #[error("script not found: {0}")]
    NotFound(PathBuf),
    #[error("unsupported script type: {0} (expected .py or .sh)")]
    UnsupportedScript(PathBuf),
    #[error("failed to spawn {script}: {source}")]
    Spawn {
        script: PathBuf,
        source: std::io::Error,
    },
    #[error("script failed with exit code {code:?}: {script}")]
    ScriptFailed {
        script: PathBuf,
        code: Option<i32>,
    },
    #[error("script timed out after {timeout_secs}s: {script}")]
    Timeout {
        script: PathBuf,
        timeout_secs: u64,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON context piped to every logic script on stdin.
#[derive(Debug, Clone, Serialize)]
pub struct LogicContext {
    pub output_file: PathBuf,
    pub workflow_dir: PathBuf,
    pub task_dir: PathBuf,
    pub task_id: String,
    pub task_input: serde_json::Value,
    pub block_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub input_dir: PathBuf,
    pub depends_on: Vec<String>,
    pub block_config: serde_json::Value,
}

/// Runner bound to one task: scripts resolve relative to the workflow
/// directory and execute with the task directory as cwd.
#[derive(Debug, Clone)]
pub struct LogicRunner {
    task_dir: PathBuf,
    workflow_dir: PathBuf,
    log: EventLog,
    timeout: Duration,
}

impl LogicRunner {
    pub fn new(task_dir: impl Into<PathBuf>, workflow_dir: impl Into<PathBuf>, log: EventLog) -> Self {
        Self {
            task_dir: task_dir.into(),
            workflow_dir: workflow_dir.into(),
            log,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute one script with the given context.
    ///
    /// Success iff the process exits 0 within the timeout. Stdout lines
    /// are logged as `LOGIC OUTPUT`, stderr lines as `LOGIC ERROR`.
    pub async fn run(&self, script: &str, ctx: &LogicContext) -> Result<(), LogicError> {
        let full_path = self.workflow_dir.join(script);
        if !full_path.exists() {
            self.log
                .append(&format!("LOGIC ERROR | script not found: {}", full_path.display()));
            return Err(LogicError::NotFound(full_path));
        }

        let interpreter = match full_path.extension().and_then(|e| e.to_str()) {
            Some("py") => "python3",
            Some("sh") => "bash",
            _ => {
                self.log
                    .append(&format!("LOGIC ERROR | unknown script type: {script}"));
                return Err(LogicError::UnsupportedScript(full_path));
            }
        };

        self.log.append(&format!(
            "LOGIC RUN | {script} | output={} | task={}",
            ctx.output_file.display(),
            ctx.task_id
        ));

        let context_json = serde_json::to_vec(ctx).map_err(|e| {
            LogicError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        let mut child = Command::new(interpreter)
            .arg(&full_path)
            .current_dir(&self.task_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LogicError::Spawn {
                script: full_path.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // Script may exit without reading stdin; a broken pipe is fine.
            let _ = stdin.write_all(&context_json).await;
            drop(stdin);
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_elapsed) => {
                self.log.append(&format!("LOGIC ERROR | timeout: {script}"));
                return Err(LogicError::Timeout {
                    script: full_path,
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            if !line.is_empty() {
                self.log.append(&format!("LOGIC OUTPUT | {line}"));
            }
        }

        if output.status.success() {
            Ok(())
        } else {
            for line in String::from_utf8_lossy(&output.stderr).lines() {
                if !line.is_empty() {
                    self.log.append(&format!("LOGIC ERROR | {line}"));
                }
            }
            Err(LogicError::ScriptFailed {
                script: full_path,
                code: output.status.code(),
            })
        }
    }

    /// Create `<block>/inputs/`, logging readiness of each dependency's
    /// output (scripts read directly from `<task-dir>/<dep>/outputs/`).
    pub fn prepare_input_dir(
        &self,
        block_name: &str,
        depends_on: &[String],
    ) -> std::io::Result<PathBuf> {
        let input_dir = self.task_dir.join(block_name).join("inputs");
        std::fs::create_dir_all(&input_dir)?;

        for dep in depends_on {
            let dep_output = self
                .task_dir
                .join(dep)
                .join("outputs")
                .join("result.json");
            if dep_output.exists() {
                self.log
                    .append(&format!("INPUT DEP | {block_name} <- {dep}/outputs/result.json"));
            } else {
                self.log
                    .append(&format!("INPUT WARN | {block_name} | dependency not ready: {dep}"));
            }
        }

        Ok(input_dir)
    }

    pub fn task_dir(&self) -> &Path {
        &self.task_dir
    }

    pub fn workflow_dir(&self) -> &Path {
        &self.workflow_dir
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
