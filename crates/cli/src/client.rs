// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `DaemonClient`: `caic`'s Unix-socket client half of the protocol
//! `caicd` serves (mirrors the teacher's `oj-cli::client_queries`
//! `DaemonClient` pattern — one `send` wrapping connect+write+read,
//! reused by every subcommand; `stream_events` is the one operation that
//! upgrades the connection to a multi-line stream instead).

use std::path::PathBuf;

use caic_core::TaskId;
use caic_daemon::protocol::{EventFrame, Request, Response, ResponseBody};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to caicd at {path}: {source}\nis caicd running? (see SPEC_FULL.md for how to start it)")]
    Connect { path: PathBuf, source: std::io::Error },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("caicd: {0}")]
    Daemon(String),
}

/// One connection, one request/response line. `taskEvents` is the sole
/// exception (see [`DaemonClient::stream_events`]).
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self { socket_path: socket_path.into() }
    }

    async fn connect(&self) -> Result<UnixStream, ClientError> {
        UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| ClientError::Connect { path: self.socket_path.clone(), source })
    }

    /// Every request except `taskEvents`: one line out, one line back.
    pub async fn send(&self, request: &Request) -> Result<ResponseBody, ClientError> {
        let stream = self.connect().await?;
        let (read_half, mut write_half) = stream.into_split();
        write_line(&mut write_half, request).await?;

        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let response: Response = serde_json::from_str(line.trim_end())?;
        match response {
            Response::Ok { body } => Ok(body),
            Response::Err { message } => Err(ClientError::Daemon(message)),
        }
    }

    /// `taskEvents(id)`: the connection upgrades to a frame-per-line stream
    /// until the caller stops polling the returned receiver (spec §6).
    pub async fn stream_events(&self, id: TaskId) -> Result<mpsc::Receiver<EventFrame>, ClientError> {
        let stream = self.connect().await?;
        let (read_half, mut write_half) = stream.into_split();
        write_line(&mut write_half, &Request::TaskEvents { id }).await?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let frame = serde_json::from_str(line.trim_end())
                            .unwrap_or_else(|err| EventFrame::Error { message: err.to_string() });
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(EventFrame::Error { message: err.to_string() }).await;
                        break;
                    }
                }
            }
        });
        Ok(rx)
    }
}

async fn write_line<T: serde::Serialize>(
    write_half: &mut OwnedWriteHalf,
    value: &T,
) -> Result<(), ClientError> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    write_half.write_all(line.as_bytes()).await?;
    Ok(())
}

