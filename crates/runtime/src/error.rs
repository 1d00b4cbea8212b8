// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to exec {binary}: {source}")]
    Spawn { binary: &'static str, #[source] source: std::io::Error },
    #[error("{binary} {args} failed: {stderr}")]
    CommandFailed { binary: &'static str, args: String, stderr: String },
    #[error("{binary} timed out after {secs}s: {args}")]
    Timeout { binary: &'static str, args: String, secs: u64 },
    #[error("unexpected {binary} output for {args}: {detail}")]
    UnexpectedOutput { binary: &'static str, args: String, detail: String },
}
