// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("log I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding log line: {0}")]
    Encode(serde_json::Error),
    #[error("parsing log header: {0}")]
    InvalidHeader(serde_json::Error),
    #[error("log file {0} has no header line (empty or truncated)")]
    MissingHeader(std::path::PathBuf),
}
