// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command channel readers: stdin and the per-task Unix socket.
//!
//! Both readers parse line-delimited commands and feed one mpsc channel;
//! the coordinator drains it each tick, so every command maps to a single
//! atomic state change.

use crate::command::Command;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Read commands from this process's stdin until EOF.
pub fn spawn_stdin_reader(tx: mpsc::Sender<Command>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(command) = Command::parse(&line) {
                if tx.send(command).await.is_err() {
                    break;
                }
            }
        }
        debug!("stdin command reader finished");
    });
}

/// Guard that removes the socket file on drop.
pub struct SocketGuard {
    path: PathBuf,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Listen on the per-task Unix socket for commands.
///
/// Stale sockets from a previous run are replaced. Each connection may
/// send any number of line-delimited commands; the connection closes on
/// EOF.
pub fn spawn_socket_listener(
    path: &Path,
    tx: mpsc::Sender<Command>,
) -> std::io::Result<SocketGuard> {
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)?;
    debug!(path = %path.display(), "command socket listening");

    tokio::spawn(async move {
        loop {
            let stream = match listener.accept().await {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    warn!(error = %e, "command socket accept failed");
                    continue;
                }
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stream).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(command) = Command::parse(&line) {
                        if tx.send(command).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    Ok(SocketGuard {
        path: path.to_owned(),
    })
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
