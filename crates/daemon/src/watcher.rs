// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The watcher scan loop: pending descriptors → worker subprocesses.

use crate::bus::EventBus;
use crate::DaemonError;
use rein_core::Marker;
use rein_flow::TaskDescriptor;
use rein_storage::{EventLog, TaskStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub agents_dir: PathBuf,
    pub tasks_root: PathBuf,
    /// Program spawned per task (the rein binary itself in production,
    /// a stub in tests). Invoked as
    /// `<program> --task <id> --agents-dir <dir>`.
    pub worker_program: PathBuf,
    pub interval: Duration,
    pub max_workflows: usize,
}

pub struct Watcher {
    config: WatcherConfig,
    bus: EventBus,
    active: HashMap<String, JoinHandle<()>>,
}

impl Watcher {
    pub fn new(config: WatcherConfig, bus: EventBus) -> Self {
        Self {
            config,
            bus,
            active: HashMap::new(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Run the scan loop forever.
    pub async fn run(mut self) -> Result<(), DaemonError> {
        info!(
            tasks_root = %self.config.tasks_root.display(),
            interval_s = self.config.interval.as_secs(),
            max_workflows = self.config.max_workflows,
            "watcher started"
        );
        loop {
            if let Err(e) = self.scan_once() {
                warn!(error = %e, "watcher scan failed");
            }
            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// One scan pass: reap finished workers, then spawn pending tasks up
    /// to the cap. Exposed for tests.
    pub fn scan_once(&mut self) -> Result<(), DaemonError> {
        self.active.retain(|_, handle| !handle.is_finished());

        if !self.config.tasks_root.exists() {
            return Err(DaemonError::MissingTasksRoot(
                self.config.tasks_root.clone(),
            ));
        }

        let mut task_ids: Vec<String> = std::fs::read_dir(&self.config.tasks_root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        task_ids.sort();

        for task_id in task_ids {
            if self.active.len() >= self.config.max_workflows {
                break;
            }
            if self.active.contains_key(&task_id) {
                continue;
            }

            let task_dir = self.config.tasks_root.join(&task_id);
            if !is_pending(&task_dir) {
                continue;
            }

            let Some(flow_name) = descriptor_flow(&task_dir) else {
                continue;
            };
            let flow_path = self
                .config
                .agents_dir
                .join("flows")
                .join(&flow_name)
                .join(format!("{flow_name}.yaml"));
            if !flow_path.is_file() {
                warn!(task = %task_id, flow = %flow_name, "skipping task: flow not found");
                continue;
            }

            // Remove the pending marker before spawning so a slow worker
            // is not picked up twice.
            if let Err(e) = rein_storage::clear_status(&task_dir) {
                warn!(task = %task_id, error = %e, "could not clear pending marker");
                continue;
            }

            match self.spawn_worker(&task_id, &task_dir) {
                Ok(handle) => {
                    info!(task = %task_id, flow = %flow_name, "worker spawned");
                    self.active.insert(task_id, handle);
                }
                Err(e) => {
                    warn!(task = %task_id, error = %e, "worker spawn failed");
                }
            }
        }

        Ok(())
    }

    fn spawn_worker(
        &self,
        task_id: &str,
        task_dir: &Path,
    ) -> Result<JoinHandle<()>, std::io::Error> {
        let mut child = Command::new(&self.config.worker_program)
            .arg("--task")
            .arg(task_id)
            .arg("--agents-dir")
            .arg(&self.config.agents_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let bus = self.bus.clone();
        let log = EventLog::for_task_dir(task_dir);
        let task = task_id.to_string();

        Ok(tokio::spawn(async move {
            let stderr_log = log.clone();
            let stderr_task = stderr.map(|stderr| {
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        stderr_log.append(&format!("WORKER STDERR | {line}"));
                    }
                })
            });

            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(marker) = Marker::parse(&line) {
                        log.append(&marker.to_string());
                        bus.publish(marker.into());
                    }
                }
            }

            if let Some(handle) = stderr_task {
                let _ = handle.await;
            }

            match child.wait().await {
                Ok(status) if status.success() => {
                    info!(task = %task, "worker completed");
                }
                Ok(status) => {
                    warn!(task = %task, code = ?status.code(), "worker failed");
                }
                Err(e) => {
                    warn!(task = %task, error = %e, "worker wait failed");
                }
            }
        }))
    }
}

/// A task is pending when its marker says so, or when it has a
/// descriptor but no process table yet (fresh drop-in).
fn is_pending(task_dir: &Path) -> bool {
    let has_descriptor = task_dir.join("task.yaml").is_file();
    match rein_storage::read_status(task_dir) {
        Some(TaskStatus::Pending) => true,
        Some(_) => false,
        None => has_descriptor && !rein_storage::db_path(task_dir).exists(),
    }
}

fn descriptor_flow(task_dir: &Path) -> Option<String> {
    let descriptor = TaskDescriptor::load(task_dir).ok()?;
    (!descriptor.flow.is_empty()).then_some(descriptor.flow)
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
