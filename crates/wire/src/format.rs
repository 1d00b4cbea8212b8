// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The `WireFormat` capability set (spec §4.3 "Session encoding").

use crate::harness::Harness;
use caic_core::{Message, Prompt};

/// Per-backend prompt encoding and line parsing.
///
/// A `Session` owns exclusive access to one `WireFormat` implementation per
/// task; `encode_prompt` is called at most once per user turn and MUST
/// produce exactly one newline-terminated JSON record (spec §4.3).
pub trait WireFormat: Send + Sync {
    fn harness(&self) -> Harness;

    /// Whether this backend's `Session` can accept `sendInput` against a
    /// running session. `false` for the Codex exec one-shot variant (spec
    /// §9 Open Questions).
    fn supports_send_input(&self) -> bool;

    /// Encode a user prompt (optionally resuming a prior session id) as a
    /// single newline-terminated JSON record to write to the agent's stdin.
    fn encode_prompt(&self, prompt: &Prompt, resume_session_id: Option<&str>) -> Result<String, WireError>;

    /// Parse one line of agent stdout into a normalized `Message`.
    ///
    /// Never returns `Err`: unknown top-level types become `Message::Raw`,
    /// malformed lines become `Message::ParseError` (spec §4.3 invariants).
    fn parse_line(&self, line: &str) -> Message;
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("{harness} backend does not support sending input to a running session")]
    SendInputUnsupported { harness: Harness },
    #[error("encoding prompt: {0}")]
    Encode(#[from] serde_json::Error),
}
