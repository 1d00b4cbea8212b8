// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-harness `WireFormat` implementations and the harness-to-format
//! registry (spec §9: "the engine holds a `Harness -> Backend` map").

mod claude;
mod codex_app_server;
mod codex_exec;
mod gemini;

pub use claude::ClaudeFormat;
pub use codex_app_server::CodexAppServerFormat;
pub use codex_exec::CodexExecFormat;
pub use gemini::GeminiFormat;

use crate::format::WireFormat;
use crate::harness::Harness;
use std::sync::Arc;

/// Construct the `WireFormat` for a harness tag.
///
/// This fixed `Harness -> Backend` mapping is the "registered backends
/// table" the engine holds (spec §9). It constructs a fresh instance per
/// call rather than handing out a shared one: `CodexAppServerFormat`
/// caches per-session token-usage state, and that state must not leak
/// between two tasks using the same harness.
pub fn backend_for(harness: Harness) -> Arc<dyn WireFormat> {
    match harness {
        Harness::Claude => Arc::new(ClaudeFormat),
        Harness::Gemini => Arc::new(GeminiFormat),
        Harness::CodexAppServer => Arc::new(CodexAppServerFormat::default()),
        Harness::CodexExec => Arc::new(CodexExecFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_harness() {
        for h in [Harness::Claude, Harness::Gemini, Harness::CodexAppServer, Harness::CodexExec] {
            assert_eq!(backend_for(h).harness(), h);
        }
    }

    #[test]
    fn codex_exec_backend_rejects_send_input() {
        assert!(!backend_for(Harness::CodexExec).supports_send_input());
    }

    #[test]
    fn other_backends_support_send_input() {
        for h in [Harness::Claude, Harness::Gemini, Harness::CodexAppServer] {
            assert!(backend_for(h).supports_send_input());
        }
    }
}
