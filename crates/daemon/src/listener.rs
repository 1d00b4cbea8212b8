// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket accept loop dispatching [`caic_daemon::protocol::Request`]s onto
//! [`caic_engine::Api`] (SPEC_FULL §6).
//!
//! One connection handles exactly one request. For every operation other
//! than `taskEvents` that's a single JSON line in, a single JSON line out.
//! `taskEvents` instead streams: the replay batch, a `ready` sentinel, then
//! the live tail until the client disconnects or the task's subscriber
//! channel overflows (spec §4.6 "Bounded buffer is 256 messages; exceeding
//! it terminates the subscriber with an error").

use std::sync::Arc;

use caic_core::SystemClock;
use caic_engine::{Api, CreateTaskParams, RunnerError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use caic_daemon::protocol::{EventFrame, Request, Response, ResponseBody, SyncOutcomeDto};

/// Binds `socket_path`, removing a stale socket file left behind by a
/// previous, uncleanly terminated daemon.
pub fn bind(socket_path: &std::path::Path) -> std::io::Result<UnixListener> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    UnixListener::bind(socket_path)
}

/// Accepts connections until `shutdown` resolves, handling each on its own
/// task (spec §5: "SSE fan-out is non-blocking"; here, one handler per
/// client connection rather than one per SSE subscriber).
pub async fn serve(
    listener: UnixListener,
    api: Arc<Api<SystemClock>>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let api = api.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, api).await {
                                tracing::warn!(%err, "connection handler failed");
                            }
                        });
                    }
                    Err(err) => tracing::warn!(%err, "failed to accept connection"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("listener shutting down");
                    break;
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, api: Arc<Api<SystemClock>>) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    if reader.read_line(&mut line).await? == 0 {
        return Ok(());
    }

    let request: Request = match serde_json::from_str(line.trim_end()) {
        Ok(req) => req,
        Err(err) => {
            let response = Response::err(format!("malformed request: {err}"));
            return write_line(&mut write_half, &response).await;
        }
    };

    if let Request::TaskEvents { id } = request {
        return stream_task_events(&mut write_half, &api, &id).await;
    }

    let response = dispatch(&api, request).await;
    write_line(&mut write_half, &response).await
}

async fn dispatch(api: &Arc<Api<SystemClock>>, request: Request) -> Response {
    let result = handle(api, request).await;
    match result {
        Ok(body) => Response::ok(body),
        Err(err) => Response::err(err.to_string()),
    }
}

async fn handle(api: &Arc<Api<SystemClock>>, request: Request) -> Result<ResponseBody, RunnerError> {
    match request {
        Request::ListTasks => Ok(ResponseBody::Tasks { tasks: api.list_tasks() }),
        Request::CreateTask { repo_path, harness, model, prompt, container_image } => {
            let repo_id = api.resolve_repository_path(&repo_path)?;
            let id = api
                .create_task(CreateTaskParams { repo_id, harness, model, prompt, container_image })
                .await?;
            Ok(ResponseBody::TaskCreated { id })
        }
        Request::TaskEvents { .. } => unreachable!("handled by stream_task_events"),
        Request::SendInput { id, prompt } => {
            api.send_input(&id, prompt).await?;
            Ok(ResponseBody::Accepted)
        }
        Request::SyncTask { id, force } => {
            let outcome = api.sync_task(&id, force).await?;
            Ok(ResponseBody::Synced { outcome: SyncOutcomeDto::from(outcome) })
        }
        Request::TerminateTask { id } => {
            api.terminate_task(&id)?;
            Ok(ResponseBody::Accepted)
        }
        Request::RestartTask { id, prompt } => {
            api.restart_task(&id, prompt).await?;
            Ok(ResponseBody::Accepted)
        }
        Request::ListRepositories => Ok(ResponseBody::Repositories { repos: api.list_repositories() }),
        Request::RegisterRepository { path, base_branch, integration_remote } => {
            let id = api.register_repository(path, base_branch, integration_remote);
            Ok(ResponseBody::RepositoryRegistered { id })
        }
    }
}

async fn stream_task_events(
    write_half: &mut tokio::net::unix::OwnedWriteHalf,
    api: &Arc<Api<SystemClock>>,
    id: &caic_core::TaskId,
) -> std::io::Result<()> {
    let mut events = match api.task_events(id) {
        Ok(events) => events,
        Err(err) => return write_line(write_half, &EventFrame::Error { message: err.to_string() }).await,
    };

    for message in events.replay {
        write_line(write_half, &EventFrame::Message { message }).await?;
    }
    write_line(write_half, &EventFrame::Ready).await?;

    while let Some(message) = events.receiver.recv().await {
        write_line(write_half, &EventFrame::Message { message }).await?;
    }
    Ok(())
}

async fn write_line<T: serde::Serialize>(
    write_half: &mut tokio::net::unix::OwnedWriteHalf,
    value: &T,
) -> std::io::Result<()> {
    let mut line = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    line.push('\n');
    write_half.write_all(line.as_bytes()).await
}
