// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("spawning ssh: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("relay daemon rejected attach: {0}")]
    Rejected(String),
    #[error("ssh process exited before attach completed (status: {0:?})")]
    UnexpectedExit(Option<i32>),
    #[error("session already has an attached relay")]
    AlreadyAttached,
    #[error("expected piped stdio from ssh child process")]
    PipeUnavailable,
}
