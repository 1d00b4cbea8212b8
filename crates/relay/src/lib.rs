// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Process-agnostic bidirectional NDJSON bridge over SSH to a long-lived
//! in-container daemon (spec §4.4 "Relay protocol").
//!
//! This crate knows nothing about containers or git; the container driver
//! (`caic-runtime`) deploys [`asset::RELAY_DAEMON_SOURCE`] and hands this
//! crate an [`ssh::SshTarget`] to reach it.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod asset;
mod error;
mod session;
mod ssh;

pub use asset::{
    RELAY_DAEMON_CONTAINER_PATH, RELAY_DAEMON_SOURCE, RELAY_OUTPUT_CONTAINER_PATH,
    RELAY_SOCKET_CONTAINER_PATH,
};
pub use error::RelayError;
pub use session::{Session, SessionError};
pub use ssh::{attach_offset, serve_attach, RelayWriter, SshTarget};
