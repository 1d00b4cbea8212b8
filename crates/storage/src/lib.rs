// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-task NDJSON logs (spec §3 "LogFile", §4.5 "adoption").
//!
//! A log is the durable record of one task: a header naming the task,
//! repo, branch, harness and model; a body of normalized [`caic_core::Message`]
//! values in arrival order; and an optional trailer marking the task
//! terminal. Every other crate in the workspace that needs to read a
//! task's history back — live subscribers replaying from the start, the
//! daemon rebuilding state on adoption — goes through [`log::replay`]
//! rather than re-parsing harness-specific wire formats.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dir;
pub mod error;
pub mod header;
pub mod log;
pub mod trailer;

pub use dir::{list_headers, log_filename, log_path};
pub use error::StorageError;
pub use header::LogHeader;
pub use log::{replay, ReplayedLog, TaskLog};
pub use trailer::LogTrailer;
