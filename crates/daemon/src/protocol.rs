// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol between `caic` (the CLI) and `caicd` (the daemon).
//!
//! Spec §1 scopes "the HTTP/SSE transport itself" out of the engine core —
//! that refers to the external client/UI surface. Something still has to
//! carry commands from an ephemeral CLI invocation to the long-lived
//! process holding every task's live relay session, so this crate defines
//! a minimal newline-delimited JSON protocol over a Unix domain socket,
//! mirrored on the engine's [`caic_engine::Api`] operations one-for-one.
//! `taskEvents` is the one streaming operation: the daemon writes the
//! replay batch, then a `{"kind":"ready"}` sentinel (spec §6: "final
//! sentinel `{type:"ready"}` when replay ends and live begins"), then every
//! subsequent live message, one JSON object per line, until the client
//! disconnects.

use std::path::PathBuf;

use caic_core::{Message, Prompt, RepoId, SafetyIssue, TaskId};
use caic_engine::{RepositorySummary, SyncOutcome, TaskSummary};
use caic_wire::Harness;
use serde::{Deserialize, Serialize};

/// One request line sent by the CLI to the daemon (spec §6 "External
/// interfaces").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    ListTasks,
    /// `repo_path` rather than `RepoId`: the registry mints a fresh id on
    /// every registration and persists none of them, so a client can only
    /// ever name a repo by the path it was registered with (SPEC_FULL §6).
    /// The daemon resolves it server-side via
    /// [`caic_engine::Api::resolve_repository_path`].
    CreateTask {
        repo_path: PathBuf,
        harness: Harness,
        model: String,
        prompt: Prompt,
        container_image: String,
    },
    /// Upgrades the connection to the streaming `taskEvents` protocol
    /// described above; no further request lines follow on this socket.
    TaskEvents {
        id: TaskId,
    },
    SendInput {
        id: TaskId,
        prompt: Prompt,
    },
    SyncTask {
        id: TaskId,
        force: bool,
    },
    TerminateTask {
        id: TaskId,
    },
    RestartTask {
        id: TaskId,
        prompt: Prompt,
    },
    ListRepositories,
    RegisterRepository {
        path: PathBuf,
        base_branch: String,
        integration_remote: String,
    },
}

/// One response line. A single-shot request gets exactly one `Response`
/// line; `TaskEvents` instead gets an [`EventFrame`] stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { body: ResponseBody },
    Err { message: String },
}

impl Response {
    pub fn ok(body: ResponseBody) -> Self {
        Response::Ok { body }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Response::Err { message: message.into() }
    }
}

/// Payload carried by a successful [`Response`], one variant per
/// [`Request`] variant that isn't `TaskEvents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseBody {
    Tasks { tasks: Vec<TaskSummary> },
    TaskCreated { id: TaskId },
    Accepted,
    Synced { outcome: SyncOutcomeDto },
    Repositories { repos: Vec<RepositorySummary> },
    RepositoryRegistered { id: RepoId },
}

/// Wire-shaped mirror of [`SyncOutcome`]; a plain struct-of-fields is
/// easier for a non-Rust client to decode than an internally tagged enum
/// wrapping a `Vec<SafetyIssue>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcomeDto {
    pub integrated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<SafetyIssue>,
}

impl From<SyncOutcome> for SyncOutcomeDto {
    fn from(outcome: SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Integrated => SyncOutcomeDto { integrated: true, issues: Vec::new() },
            SyncOutcome::Blocked(issues) => SyncOutcomeDto { integrated: false, issues },
        }
    }
}

/// One line of the `taskEvents` stream (spec §6 `taskEvents`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventFrame {
    Message { message: Message },
    /// Sentinel marking the end of the replay batch and the start of the
    /// live tail (spec §6: "final sentinel `{type:\"ready\"}`").
    Ready,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let req = Request::SendInput { id: TaskId::new(), prompt: Prompt::text("go") };
        let line = serde_json::to_string(&req).expect("serialize");
        let parsed: Request = serde_json::from_str(&line).expect("deserialize");
        match parsed {
            Request::SendInput { prompt, .. } => assert_eq!(prompt.text, "go"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn sync_outcome_dto_reports_blocked_issues() {
        let outcome = SyncOutcome::Blocked(vec![SafetyIssue::secret("a.env", "AWS key")]);
        let dto: SyncOutcomeDto = outcome.into();
        assert!(!dto.integrated);
        assert_eq!(dto.issues.len(), 1);
    }

    #[test]
    fn event_frame_ready_serializes_without_payload() {
        let line = serde_json::to_string(&EventFrame::Ready).expect("serialize");
        assert_eq!(line, r#"{"kind":"ready"}"#);
    }
}
