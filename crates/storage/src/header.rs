// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! First line of a task's NDJSON log (spec §3 "LogFile", §6 "Log file format").

use caic_core::TaskId;
use serde::{Deserialize, Serialize};

fn header_kind() -> String {
    "meta".to_string()
}

fn header_version() -> u32 {
    1
}

/// `{"kind":"meta","v":1,"taskId":...,"prompt":...,"repo":...,"branch":...,"harness":...,"model":...,"startedAt":...}`
///
/// `task_id` is not in spec.md's literal example payload but is required
/// to reconstruct a `Task` during adoption without relying on filename
/// decomposition, which breaks once a branch name contains `/` (see
/// `dir::log_filename`); recorded as a design decision in DESIGN.md.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogHeader {
    #[serde(default = "header_kind")]
    pub kind: String,
    #[serde(default = "header_version")]
    pub v: u32,
    pub task_id: TaskId,
    pub prompt: String,
    pub repo: String,
    pub branch: String,
    pub harness: String,
    pub model: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl LogHeader {
    pub fn new(
        task_id: TaskId,
        prompt: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        harness: impl Into<String>,
        model: impl Into<String>,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            kind: header_kind(),
            v: header_version(),
            task_id,
            prompt: prompt.into(),
            repo: repo.into(),
            branch: branch.into(),
            harness: harness.into(),
            model: model.into(),
            started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let header = LogHeader::new(
            TaskId::new(),
            "add README",
            "/repos/demo",
            "caic/w1",
            "claude",
            "claude-opus-4",
            chrono::Utc::now(),
        );
        let json = serde_json::to_string(&header).expect("serialize");
        let parsed: LogHeader = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, header);
        assert_eq!(parsed.kind, "meta");
        assert_eq!(parsed.v, 1);
    }
}
