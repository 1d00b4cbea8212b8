// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Harness tags: the identifier of an agent CLI (spec §4.3, GLOSSARY).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One supported agent CLI. The engine maps a harness to exactly one
/// [`crate::WireFormat`] (spec §9: "the engine holds a `Harness -> Backend`
/// map").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Harness {
    Claude,
    Gemini,
    /// `codex app-server` JSON-RPC, the variant that supports `SendInput`.
    CodexAppServer,
    /// `codex exec --json`, single-shot; `SendInput` always rejects.
    CodexExec,
}

caic_core::simple_display! {
    Harness {
        Claude => "claude",
        Gemini => "gemini",
        CodexAppServer => "codex_app_server",
        CodexExec => "codex_exec",
    }
}

/// Error returned when a harness tag string doesn't match a known harness.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown harness tag: {0}")]
pub struct UnknownHarness(pub String);

impl FromStr for Harness {
    type Err = UnknownHarness;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(Harness::Claude),
            "gemini" => Ok(Harness::Gemini),
            "codex_app_server" | "codex-app-server" => Ok(Harness::CodexAppServer),
            "codex_exec" | "codex-exec" => Ok(Harness::CodexExec),
            other => Err(UnknownHarness(other.to_string())),
        }
    }
}

impl Harness {
    /// Models supported by this harness. Narrow and hand-maintained; not an
    /// exhaustive discovery API (spec §4.3 "list of supported models").
    pub fn models(self) -> &'static [&'static str] {
        match self {
            Harness::Claude => &["claude-opus-4", "claude-sonnet-4"],
            Harness::Gemini => &["gemini-2.5-pro", "gemini-2.5-flash"],
            Harness::CodexAppServer | Harness::CodexExec => &["gpt-5-codex", "o4-mini"],
        }
    }

    pub fn accepts_images(self) -> bool {
        matches!(self, Harness::Claude | Harness::Gemini | Harness::CodexAppServer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        for h in [Harness::Claude, Harness::Gemini, Harness::CodexAppServer, Harness::CodexExec] {
            let parsed: Harness = h.to_string().parse().expect("parse");
            assert_eq!(parsed, h);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!("chatgpt-desktop".parse::<Harness>().is_err());
    }

    #[test]
    fn codex_exec_shares_models_with_app_server() {
        assert_eq!(Harness::CodexExec.models(), Harness::CodexAppServer.models());
    }
}
