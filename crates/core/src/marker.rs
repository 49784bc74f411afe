// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Well-known stdout marker lines consumed by the task watcher.
//!
//! Workers print these to stdout; the watcher parses them back into typed
//! events. The format is `[TAG] key=value key=value`, one marker per line.

use std::fmt;

/// A recognized marker line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    BlockStart {
        task: String,
        block: String,
    },
    BlockDone {
        task: String,
        block: String,
    },
    TaskDone {
        task: String,
        status: String,
        blocks: u32,
    },
}

impl Marker {
    /// Parse a marker out of a log line, tolerating leading prefixes.
    ///
    /// Returns `None` for lines that carry no marker or a malformed one.
    pub fn parse(line: &str) -> Option<Self> {
        let tag_start = line.find('[')?;
        let rest = &line[tag_start..];

        let (tag, fields) = if let Some(fields) = rest.strip_prefix("[BLOCK_START]") {
            ("block_start", fields)
        } else if let Some(fields) = rest.strip_prefix("[BLOCK_DONE]") {
            ("block_done", fields)
        } else if let Some(fields) = rest.strip_prefix("[TASK_DONE]") {
            ("task_done", fields)
        } else {
            return None;
        };

        let mut task = None;
        let mut block = None;
        let mut status = None;
        let mut blocks = None;
        for field in fields.split_whitespace() {
            match field.split_once('=') {
                Some(("task", v)) => task = Some(v.to_string()),
                Some(("block", v)) => block = Some(v.to_string()),
                Some(("status", v)) => status = Some(v.to_string()),
                Some(("blocks", v)) => blocks = v.parse().ok(),
                _ => {}
            }
        }

        match tag {
            "block_start" => Some(Marker::BlockStart {
                task: task?,
                block: block?,
            }),
            "block_done" => Some(Marker::BlockDone {
                task: task?,
                block: block?,
            }),
            _ => Some(Marker::TaskDone {
                task: task?,
                status: status?,
                blocks: blocks?,
            }),
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            Marker::BlockStart { task, .. }
            | Marker::BlockDone { task, .. }
            | Marker::TaskDone { task, .. } => task,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::BlockStart { task, block } => {
                write!(f, "[BLOCK_START] task={task} block={block}")
            }
            Marker::BlockDone { task, block } => {
                write!(f, "[BLOCK_DONE] task={task} block={block}")
            }
            Marker::TaskDone {
                task,
                status,
                blocks,
            } => {
                write!(f, "[TASK_DONE] task={task} status={status} blocks={blocks}")
            }
        }
    }
}

#[cfg(test)]
#[path = "marker_tests.rs"]
mod tests;
