// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shelling out to the `ssh` binary, matching the teacher's pattern of
//! shelling out to `docker`/`kubectl` rather than linking a native
//! protocol binding (SPEC_FULL §4.4).
//!
//! The remote command is always `socat - UNIX-CONNECT:<socket>`, piping
//! the SSH session's stdio directly to the daemon's control socket; the
//! first line we write to the child's stdin is the relay protocol command
//! (`serve-attach ...` or `attach --offset N`).

use crate::asset::RELAY_SOCKET_CONTAINER_PATH;
use crate::error::RelayError;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;

/// Where the container's relay daemon is reachable.
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub identity_file: Option<std::path::PathBuf>,
}

impl SshTarget {
    fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("ssh");
        cmd.arg("-o").arg("BatchMode=yes");
        cmd.arg("-o").arg("StrictHostKeyChecking=accept-new");
        cmd.arg("-p").arg(self.port.to_string());
        if let Some(identity) = &self.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.arg(format!("{}@{}", self.user, self.host));
        cmd.arg("socat").arg("-").arg(format!("UNIX-CONNECT:{}", RELAY_SOCKET_CONTAINER_PATH));
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd
    }
}

/// Stdin writer plus process handle for one live SSH attach. Kept separate
/// from the line receiver so a `Session` can hold each behind its own lock:
/// a blocked reader must never stall a concurrent `send_line` (spec §4.1
/// concurrency: the dispatch loop and `Send` run independently).
pub struct RelayWriter {
    child: Child,
    stdin: ChildStdin,
}

impl RelayWriter {
    /// Write one newline-terminated agent-stdin record through the relay.
    pub async fn send_line(&mut self, line: &str) -> Result<(), RelayError> {
        self.stdin.write_all(line.as_bytes()).await.map_err(RelayError::Spawn)?;
        if !line.ends_with('\n') {
            self.stdin.write_all(b"\n").await.map_err(RelayError::Spawn)?;
        }
        self.stdin.flush().await.map_err(RelayError::Spawn)?;
        Ok(())
    }

    /// Exit status of the underlying `ssh` process, if it has exited.
    pub fn try_wait(&mut self) -> Result<Option<std::process::ExitStatus>, RelayError> {
        self.child.try_wait().map_err(RelayError::Spawn)
    }

    pub async fn kill(&mut self) -> Result<(), RelayError> {
        self.child.kill().await.map_err(RelayError::Spawn)
    }
}

async fn spawn(target: &SshTarget, first_line: &str) -> Result<(RelayWriter, mpsc::Receiver<String>), RelayError> {
    let mut child = target.command().spawn()?;
    let mut stdin = child.stdin.take().ok_or(RelayError::PipeUnavailable)?;
    let stdout = child.stdout.take().ok_or(RelayError::PipeUnavailable)?;

    stdin.write_all(first_line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await?;

    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(async move {
        let mut reader = BufReader::new(stdout).lines();
        loop {
            match reader.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%err, "relay ssh: stdout read error");
                    break;
                }
            }
        }
    });

    Ok((RelayWriter { child, stdin }, rx))
}

/// `serve-attach`: first start on a fresh container (spec §4.4).
pub async fn serve_attach(
    target: &SshTarget,
    agent_argv: &[String],
) -> Result<(RelayWriter, mpsc::Receiver<String>), RelayError> {
    let command = format!("serve-attach {}", agent_argv.join(" "));
    spawn(target, &command).await
}

/// `attach --offset N`: re-attach after adoption or reconnect (spec §4.4).
pub async fn attach_offset(
    target: &SshTarget,
    offset: u64,
) -> Result<(RelayWriter, mpsc::Receiver<String>), RelayError> {
    let command = format!("attach --offset {offset}");
    spawn(target, &command).await
}

/// Spawn a local `cat` process in place of `ssh`, for tests that need a
/// real `RelayWriter`/line-receiver pair without a network round trip:
/// anything written to stdin is echoed back as a line.
#[cfg(test)]
pub(crate) async fn spawn_test_echo() -> (RelayWriter, mpsc::Receiver<String>) {
    let mut child = tokio::process::Command::new("cat")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn cat");
    let stdin = child.stdin.take().expect("piped stdin");
    let stdout = child.stdout.take().expect("piped stdout");

    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(async move {
        let mut reader = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });

    (RelayWriter { child, stdin }, rx)
}
