// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Log directory layout: one file per task, named
//! `<taskID>-<repo>-<branch>.jsonl` (spec §4.2 "Shared resources").
//!
//! `repo` and `branch` are sanitized for the filesystem but the exact
//! values survive in [`crate::header::LogHeader`], so adoption never needs
//! to decompose a filename back into its parts (see `header.rs`).

use std::path::{Path, PathBuf};

use caic_core::TaskId;

use crate::error::StorageError;
use crate::header::LogHeader;

/// Replaces path-hostile characters for use inside a flat filename.
///
/// Branch names routinely contain `/` (e.g. `caic/w1`); a literal `/`
/// would be interpreted as a directory separator, so it becomes `_`.
fn sanitize_component(component: &str) -> String {
    component
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Builds the on-disk filename for a task's log.
///
/// This is a display name only; the authoritative `task_id`, `repo`, and
/// `branch` values live in the file's [`LogHeader`] line.
pub fn log_filename(task_id: &TaskId, repo: &str, branch: &str) -> String {
    format!(
        "{}-{}-{}.jsonl",
        task_id.as_str(),
        sanitize_component(repo),
        sanitize_component(branch)
    )
}

pub fn log_path(log_dir: impl AsRef<Path>, task_id: &TaskId, repo: &str, branch: &str) -> PathBuf {
    log_dir.as_ref().join(log_filename(task_id, repo, branch))
}

/// Enumerates every `.jsonl` log file in `log_dir`, reading just its header
/// line (spec §4.5 "adoption": the daemon must discover every task log on
/// startup without replaying full history up front).
pub fn list_headers(log_dir: impl AsRef<Path>) -> Result<Vec<(PathBuf, LogHeader)>, StorageError> {
    let log_dir = log_dir.as_ref();
    let mut found = Vec::new();

    let entries = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(err) => return Err(err.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(std::ffi::OsStr::to_str) != Some("jsonl") {
            continue;
        }
        match read_header(&path) {
            Ok(header) => found.push((path, header)),
            Err(StorageError::MissingHeader(_)) => {
                tracing::warn!(path = %path.display(), "skipping empty log file during adoption scan");
            }
            Err(err) => return Err(err),
        }
    }

    Ok(found)
}

fn read_header(path: &Path) -> Result<LogHeader, StorageError> {
    let file = std::fs::File::open(path)?;
    let mut first_line = String::new();
    std::io::BufRead::read_line(&mut std::io::BufReader::new(file), &mut first_line)?;
    if first_line.trim().is_empty() {
        return Err(StorageError::MissingHeader(path.to_path_buf()));
    }
    serde_json::from_str(&first_line).map_err(StorageError::InvalidHeader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_slash_in_branch_name() {
        let filename = log_filename(&TaskId::from_string("tsk-abc".to_string()), "demo", "caic/w1");
        assert_eq!(filename, "tsk-abc-demo-caic_w1.jsonl");
        assert!(!filename.contains('/'));
    }

    #[test]
    fn list_headers_on_missing_directory_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("does-not-exist");
        let headers = list_headers(&missing).expect("list");
        assert!(headers.is_empty());
    }

    #[test]
    fn list_headers_finds_every_log_and_ignores_other_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let task_id = TaskId::new();
        let header = LogHeader::new(
            task_id.clone(),
            "prompt",
            "demo",
            "caic/w1",
            "claude",
            "claude-opus-4",
            chrono::Utc::now(),
        );
        let path = log_path(dir.path(), &task_id, "demo", "caic/w1");
        crate::log::TaskLog::create(&path, &header).expect("create log");
        std::fs::write(dir.path().join("notes.txt"), "ignore me").expect("write stray file");

        let headers = list_headers(dir.path()).expect("list");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].1.task_id, task_id);
    }
}
