// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-stream server: newline-delimited JSON over a local TCP port.
//!
//! On connect a client receives a greeting and a state snapshot for
//! every running task, then live events from the bus. A client may send
//! `{"type": "subscribe", "task_id": "..."}` lines to request the
//! current snapshot of one task at any time.

use crate::bus::EventBus;
use crate::snapshot::{running_tasks, task_snapshot};
use serde::Deserialize;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

#[derive(Deserialize)]
struct ClientRequest {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    task_id: Option<String>,
}

/// Bind the event server on localhost.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    info!(port, "event server listening");
    Ok(listener)
}

/// Accept clients forever.
pub async fn serve(listener: TcpListener, tasks_root: PathBuf, bus: EventBus) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(%addr, "event client connected");
                let tasks_root = tasks_root.clone();
                let bus = bus.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, tasks_root, bus).await {
                        debug!(%addr, error = %e, "event client closed");
                    }
                });
            }
            Err(e) => warn!(error = %e, "event server accept failed"),
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    tasks_root: PathBuf,
    bus: EventBus,
) -> std::io::Result<()> {
    let mut events = bus.subscribe();
    let (read_half, mut write) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    send_json(&mut write, &serde_json::json!({"type": "connected", "message": "rein watcher"}))
        .await?;
    for task_id in running_tasks(&tasks_root) {
        send_json(&mut write, &task_snapshot(&tasks_root, &task_id)).await?;
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(()); // client hung up
                };
                if let Ok(request) = serde_json::from_str::<ClientRequest>(&line) {
                    if request.kind == "subscribe" {
                        if let Some(task_id) = request.task_id {
                            send_json(&mut write, &task_snapshot(&tasks_root, &task_id)).await?;
                        }
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        send_json(&mut write, &serde_json::to_value(&event).unwrap_or_default())
                            .await?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "event client lagged");
                    }
                    Err(RecvError::Closed) => return Ok(()),
                }
            }
        }
    }
}

async fn send_json(
    write: &mut (impl AsyncWriteExt + Unpin),
    value: &serde_json::Value,
) -> std::io::Result<()> {
    write.write_all(value.to_string().as_bytes()).await?;
    write.write_all(b"\n").await
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
