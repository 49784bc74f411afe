// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative input resolution against a flow's `inputs:` section.

use crate::document::FlowDocument;
use crate::error::FlowError;
use serde_json::{Map, Value};
use tracing::warn;

/// Validate provided task inputs against the declared input fields.
///
/// - Missing required fields are collected into one `MissingInput` error.
/// - Optional fields with a default are injected when absent.
/// - Extra undeclared fields pass through with a warning.
/// - Flows without an `inputs:` section accept anything.
pub fn resolve_inputs(
    document: &FlowDocument,
    provided: Map<String, Value>,
) -> Result<Map<String, Value>, FlowError> {
    let Some(declared) = &document.inputs else {
        return Ok(provided);
    };

    let mut resolved = provided;
    let mut missing = Vec::new();

    for (field, spec) in declared {
        if resolved.contains_key(field) {
            continue;
        }
        if spec.required {
            missing.push(field.clone());
        } else if let Some(default) = &spec.default {
            resolved.insert(field.clone(), default.clone());
        }
    }

    let extra: Vec<&String> = resolved
        .keys()
        .filter(|k| !declared.contains_key(*k))
        .collect();
    if !extra.is_empty() {
        warn!(flow = %document.name, ?extra, "undeclared task inputs");
    }

    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(FlowError::MissingInput {
            flow: document.name.clone(),
            fields: missing,
        })
    }
}

#[cfg(test)]
#[path = "inputs_tests.rs"]
mod tests;
