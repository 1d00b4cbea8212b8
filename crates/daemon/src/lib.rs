// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Library surface of `caicd`, exposing just enough for `caic` (the CLI)
//! to build requests and decode responses without linking the binary
//! itself — mirrors the teacher's `oj-daemon` crate, which exposes
//! `protocol` the same way for `oj-cli`'s `DaemonClient` to depend on.

pub mod protocol;

pub use protocol::{EventFrame, Request, Response, ResponseBody, SyncOutcomeDto};
