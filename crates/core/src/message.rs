// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized message model produced by per-backend parsers.
//!
//! Every line an agent backend emits is dispatched into one [`Message`]
//! variant (spec §4.3). Unknown top-level types become [`Message::Raw`];
//! a malformed line becomes [`Message::ParseError`]. Neither ever
//! terminates the ingress stream.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A block inside an `Assistant` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
}

/// Token/cost accounting reported by a backend on a `Result` message.
///
/// For backends whose underlying protocol distinguishes a per-turn figure
/// from a running session total (the Codex app-server's
/// `thread/tokenUsage/updated` notification — see spec §9 Open Questions),
/// `last` carries the per-turn figure and `total` the session-wide one.
/// Backends that only ever report one figure set both fields equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl Usage {
    /// Element-wise max, used by `Task::live_stats` (spec invariant 7:
    /// reported stats are `max(session-reported, log-accumulated)`).
    pub fn max(self, other: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens.max(other.input_tokens),
            output_tokens: self.output_tokens.max(other.output_tokens),
            cache_creation_tokens: self.cache_creation_tokens.max(other.cache_creation_tokens),
            cache_read_tokens: self.cache_read_tokens.max(other.cache_read_tokens),
        }
    }
}

/// One file's line-count delta in a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: PathBuf,
    pub added: u64,
    pub deleted: u64,
    pub binary: bool,
}

/// Ordered sequence of per-file diff stats (spec §3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStat {
    pub files: Vec<FileDiff>,
}

impl DiffStat {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// True if any file in this diff was touched by a mutating tool
    /// (used by tests to assert DiffStat synthesis targeted the right path).
    pub fn touches(&self, path: &std::path::Path) -> bool {
        self.files.iter().any(|f| f.path == path)
    }
}

/// The canonical, backend-independent tool vocabulary (spec §4.3).
///
/// Per-backend adapters map their native tool names into this set via a
/// single lookup table; MCP tools pass through unchanged as `Mcp(name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalTool {
    Read,
    Write,
    Edit,
    Bash,
    Grep,
    Glob,
    WebFetch,
    WebSearch,
    AskUserQuestion,
    TodoWrite,
    NotebookEdit,
    Mcp(String),
}

impl CanonicalTool {
    /// Tools that mutate the filesystem and therefore trigger DiffStat
    /// synthesis after their result arrives (spec invariant 6).
    pub fn mutates_filesystem(&self) -> bool {
        matches!(
            self,
            CanonicalTool::Write | CanonicalTool::Edit | CanonicalTool::Bash | CanonicalTool::NotebookEdit
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            CanonicalTool::Read => "Read",
            CanonicalTool::Write => "Write",
            CanonicalTool::Edit => "Edit",
            CanonicalTool::Bash => "Bash",
            CanonicalTool::Grep => "Grep",
            CanonicalTool::Glob => "Glob",
            CanonicalTool::WebFetch => "WebFetch",
            CanonicalTool::WebSearch => "WebSearch",
            CanonicalTool::AskUserQuestion => "AskUserQuestion",
            CanonicalTool::TodoWrite => "TodoWrite",
            CanonicalTool::NotebookEdit => "NotebookEdit",
            CanonicalTool::Mcp(name) => name.as_str(),
        }
    }
}

/// Normalized message variant (spec §3 "Message").
///
/// Serializes with an internal `type` tag so it can be written directly as
/// one NDJSON line per the log file format (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    SystemInit {
        session_id: String,
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        #[serde(default)]
        tools: Vec<String>,
        cwd: PathBuf,
    },
    System {
        subtype: String,
    },
    Assistant {
        blocks: Vec<ContentBlock>,
    },
    /// `parent_tool_use_id` present => tool result, absent => user text/image input.
    User {
        content: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
    },
    Result {
        subtype: String,
        is_error: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        diff_stat: Option<DiffStat>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cost_usd: Option<f64>,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_duration_ms: Option<u64>,
        turns: u32,
        usage: Usage,
    },
    StreamEvent {
        text: String,
    },
    DiffStat {
        stat: DiffStat,
    },
    ParseError {
        err: String,
        raw_line: String,
    },
    Raw {
        #[serde(rename = "raw_type")]
        r#type: String,
        raw_line: String,
    },
}

impl Message {
    /// A short tag for logging (`tracing::debug!` on every `Task::append`).
    pub fn kind(&self) -> &'static str {
        match self {
            Message::SystemInit { .. } => "system_init",
            Message::System { .. } => "system",
            Message::Assistant { .. } => "assistant",
            Message::User { .. } => "user",
            Message::Result { .. } => "result",
            Message::StreamEvent { .. } => "stream_event",
            Message::DiffStat { .. } => "diff_stat",
            Message::ParseError { .. } => "parse_error",
            Message::Raw { .. } => "raw",
        }
    }

    /// True if this message is a tool result (a `User` message carrying
    /// `parent_tool_use_id`).
    pub fn as_tool_result(&self) -> Option<&str> {
        match self {
            Message::User { parent_tool_use_id: Some(id), .. } => Some(id.as_str()),
            _ => None,
        }
    }

    /// True if this is an `AskUserQuestion` tool-use block inside an
    /// `Assistant` message (drives the running -> asking transition).
    pub fn is_ask_user_question(&self) -> bool {
        match self {
            Message::Assistant { blocks } => blocks.iter().any(|b| {
                matches!(b, ContentBlock::ToolUse { name, .. } if name == "AskUserQuestion")
            }),
            _ => false,
        }
    }

    /// Tool-use ids introduced by this message, if it is an `Assistant`
    /// message containing tool-use blocks.
    pub fn tool_use_ids(&self) -> Vec<&str> {
        match self {
            Message::Assistant { blocks } => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                    ContentBlock::Text { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
