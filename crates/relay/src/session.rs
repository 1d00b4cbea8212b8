// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! A `Session`: the engine's handle to one live agent process via a relay
//! attach (GLOSSARY). Owns the stdin writer, the stdout line reader,
//! cancellation, and a completion latch (spec §2 "Session" row).

use crate::ssh::RelayWriter;
use caic_core::{Message, Prompt};
use caic_wire::WireFormat;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Relay(#[from] crate::error::RelayError),
    #[error(transparent)]
    Wire(#[from] caic_wire::WireError),
    #[error("no session is attached")]
    NotAttached,
}

/// One live agent process, reached through a relay attach.
///
/// The stdin writer and the stdout line receiver are behind independent
/// locks: `send` must never stall behind a dispatch loop blocked on
/// `recv_line` waiting for the next byte (spec §5: "`Send` serializes
/// under a per-task mutex; write to the stdin pipe may block at most
/// until the agent reads").
pub struct Session {
    format: Arc<dyn WireFormat>,
    writer: Mutex<RelayWriter>,
    lines: Mutex<mpsc::Receiver<String>>,
    resume_session_id: parking_lot::Mutex<Option<String>>,
    cancel: CancellationToken,
    result_latch: Notify,
    result_seen: AtomicBool,
}

impl Session {
    pub fn new(format: Arc<dyn WireFormat>, writer: RelayWriter, lines: mpsc::Receiver<String>) -> Self {
        Self {
            format,
            writer: Mutex::new(writer),
            lines: Mutex::new(lines),
            resume_session_id: parking_lot::Mutex::new(None),
            cancel: CancellationToken::new(),
            result_latch: Notify::new(),
            result_seen: AtomicBool::new(false),
        }
    }

    /// Remember the agent-reported session id so a later `RestartSession`
    /// can resume it (spec §4.5: "resume semantics... using the captured
    /// `SessionID`").
    pub fn record_session_id(&self, id: impl Into<String>) {
        *self.resume_session_id.lock() = Some(id.into());
    }

    pub fn session_id(&self) -> Option<String> {
        self.resume_session_id.lock().clone()
    }

    /// Encode and send one user turn (spec §4.3: "`EncodePrompt` is called
    /// at most once per user turn").
    pub async fn send(&self, prompt: &Prompt) -> Result<(), SessionError> {
        let resume = self.session_id();
        let encoded = self.format.encode_prompt(prompt, resume.as_deref())?;
        self.writer.lock().await.send_line(&encoded).await?;
        Ok(())
    }

    /// Block until the relay forwards the next line, then parse it through
    /// this session's backend. Returns `None` once the relay connection
    /// ends (ssh exited, container gone).
    pub async fn recv(&self) -> Option<Message> {
        let line = self.lines.lock().await.recv().await?;
        Some(self.format.parse_line(&line))
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Mark that a terminal `Result` has been observed for the current
    /// turn/session (spec GLOSSARY "final-result latch"). Idempotent.
    pub fn signal_result(&self) {
        if !self.result_seen.swap(true, Ordering::SeqCst) {
            self.result_latch.notify_waiters();
        }
    }

    pub async fn await_result(&self) {
        if self.result_seen.load(Ordering::SeqCst) {
            return;
        }
        self.result_latch.notified().await;
    }

    pub async fn close(&self) -> Result<(), SessionError> {
        self.cancel();
        self.writer.lock().await.kill().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
