// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Optional last line of a task's NDJSON log (spec §3 "LogFile", §6).
//!
//! Absence means the task was still alive at last write; presence marks
//! the task terminal (spec invariant, §3 "LogFile").

use caic_core::{DiffStat, TaskState, Usage};
use serde::{Deserialize, Serialize};

fn trailer_kind() -> String {
    "result".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogTrailer {
    #[serde(default = "trailer_kind")]
    pub kind: String,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    pub duration_ms: u64,
    pub num_turns: u32,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "DiffStat::is_empty")]
    pub diff_stat: DiffStat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogTrailer {
    pub fn terminated(usage: Usage, duration_ms: u64, num_turns: u32, diff_stat: DiffStat) -> Self {
        Self {
            kind: trailer_kind(),
            state: TaskState::Terminated,
            cost_usd: None,
            duration_ms,
            num_turns,
            usage,
            diff_stat,
            agent_result: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            kind: trailer_kind(),
            state: TaskState::Failed,
            cost_usd: None,
            duration_ms: 0,
            num_turns: 0,
            usage: Usage::default(),
            diff_stat: DiffStat::default(),
            agent_result: None,
            error: Some(error.into()),
        }
    }
}

/// A line parses as a trailer only if it has `"kind":"result"`; this
/// distinguishes it from an ordinary body `Message` line, which is always
/// tagged `"type"` (spec §3).
pub fn looks_like_trailer(value: &serde_json::Value) -> bool {
    value.get("kind").and_then(serde_json::Value::as_str) == Some("result")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminated_round_trips() {
        let trailer = LogTrailer::terminated(Usage::default(), 1500, 3, DiffStat::default());
        let json = serde_json::to_string(&trailer).expect("serialize");
        let parsed: LogTrailer = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, trailer);
    }

    #[test]
    fn looks_like_trailer_distinguishes_from_message_line() {
        let trailer_line: serde_json::Value = serde_json::json!({"kind": "result", "state": "terminated"});
        let message_line: serde_json::Value = serde_json::json!({"type": "assistant", "blocks": []});
        assert!(looks_like_trailer(&trailer_line));
        assert!(!looks_like_trailer(&message_line));
    }
}
