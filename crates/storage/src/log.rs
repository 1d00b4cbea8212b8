// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only NDJSON task log (spec §3 "LogFile", §4.1 "append-only log").
//!
//! One file per task: a [`LogHeader`] on line 1, zero or more
//! [`caic_core::Message`] body lines, and an optional [`LogTrailer`] as the
//! last line once the task reaches a terminal state. The trailer is
//! distinguished from a body line by its `kind` field rather than by
//! position, so [`replay`] can be called on a log that is still being
//! appended to.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use caic_core::Message;

use crate::error::StorageError;
use crate::header::LogHeader;
use crate::trailer::{looks_like_trailer, LogTrailer};

/// A task's log, open for appending.
///
/// Every write is flushed immediately: log lines back `Task::subscribe`
/// replay and crash recovery, so a buffered write lost on process exit
/// would silently truncate history (spec invariant 2).
pub struct TaskLog {
    path: PathBuf,
    file: File,
}

impl TaskLog {
    /// Creates a new log file and writes its header as line 1.
    ///
    /// Fails if a file already exists at `path`; callers choose a fresh
    /// path per task (spec §6 "Log file format").
    pub fn create(path: impl Into<PathBuf>, header: &LogHeader) -> Result<Self, StorageError> {
        let path = path.into();
        let mut file = OpenOptions::new().create_new(true).append(true).open(&path)?;
        write_line(&mut file, header)?;
        Ok(Self { path, file })
    }

    /// Opens an existing log file for continued appending (adoption path).
    pub fn open_append(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one body line.
    pub fn append(&mut self, message: &Message) -> Result<(), StorageError> {
        write_line(&mut self.file, message)
    }

    /// Starts a new log segment in the same file by writing a second
    /// header line further down it (spec §4.2 `RestartSession`: "opens a
    /// new log segment (same file) with a new header"). `replay` always
    /// returns the *first* header, so this segment boundary is visible
    /// only as an ordinary line to a reader scanning the body.
    pub fn write_segment_header(&mut self, header: &LogHeader) -> Result<(), StorageError> {
        write_line(&mut self.file, header)
    }

    /// Appends the trailer and marks the log terminal. Callers must not
    /// call `append` or `write_trailer` again afterward.
    pub fn write_trailer(&mut self, trailer: &LogTrailer) -> Result<(), StorageError> {
        write_line(&mut self.file, trailer)
    }
}

fn write_line<T: serde::Serialize>(file: &mut File, value: &T) -> Result<(), StorageError> {
    let mut line = serde_json::to_vec(value).map_err(StorageError::Encode)?;
    line.push(b'\n');
    file.write_all(&line)?;
    file.flush()?;
    Ok(())
}

/// A fully- or partially-replayed log (spec §4.5 "restore messages" / adoption).
pub struct ReplayedLog {
    pub header: LogHeader,
    pub messages: Vec<Message>,
    pub trailer: Option<LogTrailer>,
}

/// Reads a log file from disk in full.
///
/// Line 1 must parse as a [`LogHeader`]; every subsequent line parses as a
/// [`Message`] unless it matches the trailer shape, in which case it must
/// be the last line. A line that is neither (truncated write mid-flush) is
/// silently dropped rather than failing the whole replay — the log is
/// append-only and the writer may have been killed mid-line.
pub fn replay(path: impl AsRef<Path>) -> Result<ReplayedLog, StorageError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut lines = BufReader::new(file).lines();

    let header_line = lines
        .next()
        .ok_or_else(|| StorageError::MissingHeader(path.to_path_buf()))??;
    let header: LogHeader =
        serde_json::from_str(&header_line).map_err(StorageError::InvalidHeader)?;

    let mut messages = Vec::new();
    let mut trailer = None;
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if looks_like_trailer(&value) {
            trailer = serde_json::from_value(value).ok();
            continue;
        }
        if let Ok(message) = serde_json::from_value(value) {
            messages.push(message);
        }
    }

    Ok(ReplayedLog { header, messages, trailer })
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
