// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serde model for flow documents.
//!
//! A flow is a DAG of blocks. Each block optionally calls the provider with
//! an assembled prompt and optionally runs logic scripts around that call.

use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Provider selection: either a bare name or a nested config map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderSpec {
    Name(String),
    Config {
        name: String,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default)]
        temperature: Option<f64>,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl ProviderSpec {
    pub fn name(&self) -> &str {
        match self {
            ProviderSpec::Name(name) => name,
            ProviderSpec::Config { name, .. } => name,
        }
    }
}

/// Logic hook scripts for one block.
///
/// `custom` replaces the provider call: a string runs that script instead,
/// and the boolean sentinel `true` means "the `pre` hook already produced
/// `result.json`; skip the provider call entirely". `false` and any other
/// scalar are rejected by validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogicSpec {
    #[serde(default)]
    pub pre: Option<String>,
    #[serde(default)]
    pub post: Option<String>,
    #[serde(default)]
    pub validate: Option<String>,
    #[serde(default)]
    pub custom: Option<CustomSpec>,
}

/// The `logic.custom` value: script path or skip-provider sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomSpec {
    Sentinel(bool),
    Script(String),
}

/// One rule of a conditional `next` list.
///
/// `{if: "{{ expr }}", goto: name}` picks `goto` when the expression is
/// truthy against the block's result. A terminal `{else: true, goto: name}`
/// (or `{else: name}`) always matches when reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextRule {
    #[serde(default, rename = "if")]
    pub condition: Option<String>,
    #[serde(default, rename = "else")]
    pub otherwise: Option<ElseSpec>,
    #[serde(default)]
    pub goto: Option<String>,
}

/// The `else` field: `true` (goto carries the target) or the target itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElseSpec {
    Flag(bool),
    Target(String),
}

/// `next`: unconditional successor name or an ordered condition list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextSpec {
    Name(String),
    Conditions(Vec<NextRule>),
}

/// Declared input field for pre-dispatch validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputField {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

/// One block of the flow DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDef {
    pub name: String,
    #[serde(default)]
    pub specialist: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Advisory only: concurrency is bounded globally by `max_parallel`.
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub skip_if_previous_failed: bool,
    #[serde(default)]
    pub continue_if_failed: bool,
    /// Per-block timeout in seconds (applies to logic hooks).
    #[serde(default)]
    pub timeout: Option<u64>,
    /// While this block is paused, dependents may not start.
    #[serde(default = "default_true")]
    pub blocking_pause: bool,
    #[serde(default)]
    pub logic: Option<LogicSpec>,
    #[serde(default)]
    pub next: Option<NextSpec>,
    #[serde(default = "default_max_runs")]
    pub max_runs: u32,
}

fn default_max_runs() -> u32 {
    1
}

impl BlockDef {
    pub fn logic(&self) -> LogicSpec {
        self.logic.clone().unwrap_or_default()
    }
}

/// A complete flow document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub name: String,
    pub team: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub provider: Option<ProviderSpec>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Workflow wall-clock timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Write a human-readable `result.md` beside each `result.json`.
    #[serde(default)]
    pub readable_outputs: bool,
    /// Print the final block's result to stdout after completion.
    #[serde(default)]
    pub print_final: bool,
    #[serde(default)]
    pub inputs: Option<BTreeMap<String, InputField>>,
    pub blocks: Vec<BlockDef>,
}

fn default_max_parallel() -> usize {
    3
}

impl FlowDocument {
    /// Load and validate a flow document from a YAML file.
    pub fn load(path: &Path) -> Result<Self, FlowError> {
        let text = std::fs::read_to_string(path).map_err(|source| FlowError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let document: FlowDocument =
            serde_yaml::from_str(&text).map_err(|source| FlowError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        crate::validate::validate(&document)?;
        Ok(document)
    }

    pub fn block(&self, name: &str) -> Option<&BlockDef> {
        self.blocks.iter().find(|b| b.name == name)
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
