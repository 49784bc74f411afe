// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed errors for document and input validation.
//!
//! Every variant here is fatal pre-run: the engine refuses to spawn any
//! block for a document or input set that fails validation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("failed to read flow document {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse flow document {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("duplicate block name: {0}")]
    DuplicateBlock(String),
    #[error("block '{block}' depends on non-existent block '{dependency}'")]
    UnknownDependency { block: String, dependency: String },
    #[error("circular dependency detected: {cycle}")]
    CyclicDependency { cycle: String },
    #[error("invalid block name '{0}': expected lowercase letters, digits, underscore")]
    InvalidBlockName(String),
    #[error("invalid specialist '{specialist}' on block '{block}'")]
    InvalidSpecialist { block: String, specialist: String },
    #[error("block '{block}' has next target '{target}' which is not a block")]
    InvalidNextTarget { block: String, target: String },
    #[error("block '{block}': logic.custom must be a script path or `true`")]
    InvalidCustomSentinel { block: String },
    #[error("input '{field}' declares a default but is required")]
    DefaultOnRequiredInput { field: String },
    #[error("missing required inputs for flow '{flow}': {fields:?}")]
    MissingInput { flow: String, fields: Vec<String> },
    #[error("flow document has no blocks")]
    NoBlocks,
    #[error("task descriptor error: {0}")]
    Descriptor(String),
}
