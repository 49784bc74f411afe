// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use thiserror::Error;

/// Workflow-level errors. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("flow error: {0}")]
    Flow(#[from] rein_flow::FlowError),
    #[error("storage error: {0}")]
    Storage(#[from] rein_storage::StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("block not found: {0}")]
    BlockNotFound(String),
}

/// Block-level failures. These are captured into the block's record and
/// drive failure policy; they never abort the coordinator directly.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("unresolved input placeholders: {fields:?}")]
    UnresolvedPlaceholder { fields: Vec<String> },
    #[error("provider call failed: {0}")]
    Provider(#[from] rein_providers::ProviderError),
    #[error("logic hook failed: {0}")]
    Logic(#[from] rein_logic::LogicError),
    #[error("result file missing or empty: {0}")]
    ResultMissing(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("result write failed: {0}")]
    Envelope(#[from] rein_core::EnvelopeError),
}
