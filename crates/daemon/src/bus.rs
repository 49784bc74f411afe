// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast bus for watcher events.

use rein_core::Marker;
use serde::Serialize;
use tokio::sync::broadcast;

/// A typed event parsed from a worker's marker line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchEvent {
    BlockStart {
        task_id: String,
        block: String,
    },
    BlockDone {
        task_id: String,
        block: String,
    },
    TaskDone {
        task_id: String,
        status: String,
        blocks: u32,
    },
}

impl From<Marker> for WatchEvent {
    fn from(marker: Marker) -> Self {
        match marker {
            Marker::BlockStart { task, block } => WatchEvent::BlockStart {
                task_id: task,
                block,
            },
            Marker::BlockDone { task, block } => WatchEvent::BlockDone {
                task_id: task,
                block,
            },
            Marker::TaskDone {
                task,
                status,
                blocks,
            } => WatchEvent::TaskDone {
                task_id: task,
                status,
                blocks,
            },
        }
    }
}

impl WatchEvent {
    pub fn task_id(&self) -> &str {
        match self {
            WatchEvent::BlockStart { task_id, .. }
            | WatchEvent::BlockDone { task_id, .. }
            | WatchEvent::TaskDone { task_id, .. } => task_id,
        }
    }
}

/// Cloneable broadcast sender; subscribers may join at any time and
/// missed events are simply skipped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WatchEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self { tx }
    }

    pub fn publish(&self, event: WatchEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
