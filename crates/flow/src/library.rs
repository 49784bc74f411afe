// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agents directory: flows, specialists, teams, and the tasks root.
//!
//! Layout:
//! ```text
//! <agents-dir>/
//!   flows/<name>/<name>.yaml
//!   specialists/<name>.md
//!   teams/<name>.yaml
//!   tasks/<task-id>/...
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment override for the agents directory root.
pub const AGENTS_DIR_ENV: &str = "REIN_AGENTS_DIR";
/// Environment override for the tasks root (defaults to `<agents>/tasks`).
pub const TASKS_ROOT_ENV: &str = "REIN_TASKS_ROOT";

/// Resolved agents directory.
#[derive(Debug, Clone)]
pub struct AgentsDir {
    root: PathBuf,
}

#[derive(Deserialize)]
struct TeamFile {
    #[serde(default)]
    collaboration_tone: Option<String>,
    #[serde(default)]
    tone: Option<String>,
}

impl AgentsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the agents directory: explicit argument, then
    /// `REIN_AGENTS_DIR`, then `./agents` relative to the working dir.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::new(path);
        }
        if let Ok(env_dir) = std::env::var(AGENTS_DIR_ENV) {
            if !env_dir.is_empty() {
                return Self::new(env_dir);
            }
        }
        Self::new(std::env::current_dir().unwrap_or_default().join("agents"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tasks root: `REIN_TASKS_ROOT` override, else `<agents>/tasks`.
    pub fn tasks_root(&self) -> PathBuf {
        if let Ok(root) = std::env::var(TASKS_ROOT_ENV) {
            if !root.is_empty() {
                return PathBuf::from(root);
            }
        }
        self.root.join("tasks")
    }

    pub fn flow_path(&self, flow_name: &str) -> PathBuf {
        self.root
            .join("flows")
            .join(flow_name)
            .join(format!("{flow_name}.yaml"))
    }

    pub fn flow_exists(&self, flow_name: &str) -> bool {
        self.flow_path(flow_name).is_file()
    }

    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.tasks_root().join(task_id)
    }

    /// Load a team's shared tone preamble. Missing or malformed team files
    /// degrade to an empty tone rather than failing the run.
    pub fn load_team_tone(&self, team_name: &str) -> String {
        let path = self.root.join("teams").join(format!("{team_name}.yaml"));
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(team = team_name, error = %e, "team file not readable");
                return String::new();
            }
        };
        match serde_yaml::from_str::<TeamFile>(&text) {
            Ok(team) => team.collaboration_tone.or(team.tone).unwrap_or_default(),
            Err(e) => {
                warn!(team = team_name, error = %e, "team file not parseable");
                String::new()
            }
        }
    }

    /// Load one specialist's prompt fragment. Missing specialists degrade
    /// to an empty fragment with a warning.
    pub fn load_specialist(&self, specialist: &str) -> String {
        let path = self
            .root
            .join("specialists")
            .join(format!("{specialist}.md"));
        match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(specialist, error = %e, "specialist file not readable");
                String::new()
            }
        }
    }

    /// Load a `.env` file from the flow directory into the process
    /// environment. Lines are `KEY=VALUE`; `#` comments and blanks skipped.
    pub fn load_env_file(workflow_dir: &Path) -> bool {
        let env_file = workflow_dir.join(".env");
        let Ok(text) = std::fs::read_to_string(&env_file) else {
            debug!(path = %env_file.display(), "no .env file");
            return false;
        };
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                std::env::set_var(key.trim(), value.trim());
            }
        }
        debug!(path = %env_file.display(), "loaded env file");
        true
    }
}

#[cfg(test)]
#[path = "library_tests.rs"]
mod tests;
