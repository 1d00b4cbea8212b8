// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use caic_core::TaskId;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task {0} has no attached session")]
    NoSession(TaskId),
    #[error("task {0} is terminal and no longer accepts input")]
    Terminal(TaskId),
    #[error(transparent)]
    Storage(#[from] caic_storage::StorageError),
    #[error(transparent)]
    Session(#[from] caic_relay::SessionError),
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("unknown repository {0}")]
    UnknownRepository(caic_core::RepoId),
    #[error("no repository registered at path {}", .0.display())]
    UnknownRepositoryPath(PathBuf),
    #[error("unknown task {0}")]
    UnknownTask(TaskId),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("restart is only legal from waiting/asking, task {0} is {1}")]
    NotRestartable(TaskId, caic_core::TaskState),
    #[error("exhausted {0} attempts allocating a branch name")]
    BranchAllocationExhausted(u32),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Runtime(#[from] caic_runtime::RuntimeError),
    #[error(transparent)]
    Storage(#[from] caic_storage::StorageError),
    #[error(transparent)]
    Wire(#[from] caic_wire::WireError),
    #[error(transparent)]
    Relay(#[from] caic_relay::RelayError),
}
