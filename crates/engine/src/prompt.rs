// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt assembly: `{{ … }}` placeholder resolution.
//!
//! Deliberately a small two-pass string walk rather than a templating
//! engine — the surface is tiny and the error messages must name the
//! exact missing fields.
//!
//! Pass 1 substitutes `{{ task.input.<field> }}` from the task inputs.
//! Pass 2 substitutes every other `{{ <ref> }}` by file resolution:
//! a `<block>.json` reference reads that block's `outputs/result.json`
//! (unwrapping the envelope), then `<task-dir>/outputs/<ref>`, then
//! `<workflow-dir>/<ref>`. Missing file references are left as-is and
//! logged; surviving `task.input.*` placeholders are an error.

use rein_storage::EventLog;
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("unresolved input placeholders: {fields:?}")]
    UnresolvedPlaceholder { fields: Vec<String> },
}

/// Everything a prompt is assembled from.
pub struct PromptInputs<'a> {
    pub team_tone: &'a str,
    /// Pre-concatenated specialist fragments (with separators).
    pub specialist_text: &'a str,
    pub task_input: &'a Map<String, Value>,
    pub task_dir: &'a Path,
    pub workflow_dir: &'a Path,
}

/// One `{{ … }}` span: byte offsets of the full placeholder plus the
/// trimmed inner text.
struct Span {
    start: usize,
    end: usize,
    inner: String,
}

fn scan_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = 0;
    while let Some(open) = text[rest..].find("{{") {
        let start = rest + open;
        let Some(close) = text[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + close + 2;
        spans.push(Span {
            start,
            end,
            inner: text[start + 2..end - 2].trim().to_string(),
        });
        rest = end;
    }
    spans
}

/// Rebuild `text`, replacing each span for which `substitute` yields a
/// value; spans yielding `None` are kept verbatim.
fn replace_spans(text: &str, mut substitute: impl FnMut(&Span) -> Option<String>) -> String {
    let spans = scan_spans(text);
    let mut result = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in &spans {
        result.push_str(&text[cursor..span.start]);
        match substitute(span) {
            Some(replacement) => result.push_str(&replacement),
            None => result.push_str(&text[span.start..span.end]),
        }
        cursor = span.end;
    }
    result.push_str(&text[cursor..]);
    result
}

fn task_input_field(inner: &str) -> Option<&str> {
    let field = inner.strip_prefix("task.input.")?;
    (!field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        .then_some(field)
}

/// Serialize a task-input value for prompt embedding: strings go in raw,
/// structured values as compact JSON.
fn render_input(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Assemble the final prompt for one block.
pub fn assemble(
    block_prompt: &str,
    inputs: &PromptInputs<'_>,
    log: &EventLog,
) -> Result<String, PromptError> {
    // Pass 1: task inputs.
    let pass1 = replace_spans(block_prompt, |span| {
        let field = task_input_field(&span.inner)?;
        let value = inputs.task_input.get(field)?;
        let rendered = render_input(value);
        log.append(&format!(
            "TASK INPUT SUBSTITUTED | {field} | value_len={}",
            rendered.len()
        ));
        Some(rendered)
    });

    // Pass 2: file references.
    let pass2 = replace_spans(&pass1, |span| {
        if task_input_field(&span.inner).is_some() || span.inner.starts_with("task.input.") {
            return None; // left for the final scan
        }
        match resolve_file_reference(&span.inner, inputs, log) {
            Some(content) => Some(content),
            None => {
                log.append(&format!(
                    "FILE NOT FOUND | {} (checked block outputs, task outputs, workflow dir)",
                    span.inner
                ));
                None
            }
        }
    });

    // Final scan: any surviving task input placeholder is fatal.
    let mut missing: Vec<String> = scan_spans(&pass2)
        .iter()
        .filter_map(|span| task_input_field(&span.inner).map(str::to_string))
        .collect();
    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(PromptError::UnresolvedPlaceholder { fields: missing });
    }

    Ok(format!(
        "{}\n\n{}\n\n---\n\n{}",
        inputs.team_tone, inputs.specialist_text, pass2
    ))
}

/// Resolve a file reference to its JSON content, compactly serialized.
fn resolve_file_reference(
    reference: &str,
    inputs: &PromptInputs<'_>,
    log: &EventLog,
) -> Option<String> {
    // 1. Block output: `<block>.json` → <task-dir>/<block>/outputs/result.json
    if let Some(block_name) = reference.strip_suffix(".json") {
        let block_output = inputs
            .task_dir
            .join(block_name)
            .join("outputs")
            .join("result.json");
        if block_output.is_file() {
            log.append(&format!(
                "BLOCK OUTPUT FOUND | {block_name} | {}",
                block_output.display()
            ));
            return load_reference(&block_output, reference, log);
        }
    }

    // 2. Task-level outputs
    let task_output = inputs.task_dir.join("outputs").join(reference);
    if task_output.is_file() {
        return load_reference(&task_output, reference, log);
    }

    // 3. Static file in the workflow directory
    let workflow_file = inputs.workflow_dir.join(reference);
    if workflow_file.is_file() {
        return load_reference(&workflow_file, reference, log);
    }

    None
}

fn load_reference(path: &Path, reference: &str, log: &EventLog) -> Option<String> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            log.append(&format!("FILE SUBSTITUTE ERROR | {} | {e}", path.display()));
            return None;
        }
    };
    let mut data: Value = match serde_json::from_str(&text) {
        Ok(data) => data,
        Err(e) => {
            log.append(&format!("FILE SUBSTITUTE ERROR | {} | {e}", path.display()));
            return None;
        }
    };

    // Unwrap a result envelope whose `result` is a JSON-encoded value.
    if let Some(result) = data.as_object().and_then(|o| o.get("result")) {
        if let Some(text) = result.as_str() {
            if let Ok(inner) = serde_json::from_str::<Value>(text) {
                data = inner;
            }
        }
    }

    let serialized = data.to_string();
    log.append(&format!(
        "FILE SUBSTITUTED | {reference} | from={} | size={}",
        path.display(),
        serialized.len()
    ));
    Some(serialized)
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
