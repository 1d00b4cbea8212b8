// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `codex app-server` JSON-RPC wire format.
//!
//! This is the Codex variant that supports `SendInput` (spec §9 Open
//! Questions). Prompts are JSON-RPC requests; agent output arrives as
//! `codex/event` notifications wrapping a `msg` discriminated union. Paired
//! `exec_command_begin`/`exec_command_end` (and their MCP equivalents)
//! become a tool-use `Assistant` message followed by a tool-result `User`
//! message (spec §4.3: "Backends that emit paired started/completed
//! records... MUST produce an `AssistantMessage(ToolUse)` on start and a
//! `User(parentToolUseID=...)` on completion").

use crate::format::{WireError, WireFormat};
use crate::harness::Harness;
use crate::tools::normalize;
use caic_core::{CanonicalTool, ContentBlock, DiffStat, Message, Prompt, Usage};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

const TOOL_TABLE: &[(&str, CanonicalTool)] = &[("exec_command", CanonicalTool::Bash)];

/// `token_count` notifications only ever carry usage, not a full `Result`
/// shape; the session-wide total is cached here and surfaced on the next
/// `task_complete` (spec §9: "treat `last` as per-turn and `total` as
/// session-wide").
#[derive(Default)]
struct CodexState {
    total_usage: Usage,
    turns: u32,
}

pub struct CodexAppServerFormat {
    next_request_id: AtomicU64,
    state: parking_lot::Mutex<CodexState>,
}

impl Default for CodexAppServerFormat {
    fn default() -> Self {
        Self { next_request_id: AtomicU64::new(1), state: parking_lot::Mutex::new(CodexState::default()) }
    }
}

impl WireFormat for CodexAppServerFormat {
    fn harness(&self) -> Harness {
        Harness::CodexAppServer
    }

    fn supports_send_input(&self) -> bool {
        true
    }

    fn encode_prompt(&self, prompt: &Prompt, resume_session_id: Option<&str>) -> Result<String, WireError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let mut items: Vec<Value> = Vec::new();
        if !prompt.text.is_empty() {
            items.push(serde_json::json!({ "type": "text", "text": prompt.text }));
        }
        for img in &prompt.images {
            items.push(serde_json::json!({ "type": "image", "media_type": img.media_type, "data": img.data }));
        }
        let mut params = serde_json::json!({ "items": items });
        if let Some(session_id) = resume_session_id {
            params["thread_id"] = Value::String(session_id.to_string());
        }
        let record = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "thread/sendMessage",
            "params": params,
        });
        Ok(format!("{}\n", serde_json::to_string(&record)?))
    }

    fn parse_line(&self, line: &str) -> Message {
        self.parse(line)
    }
}

impl CodexAppServerFormat {
    fn parse(&self, line: &str) -> Message {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(err) => return Message::ParseError { err: err.to_string(), raw_line: line.to_string() },
        };
        if value.get("method").and_then(Value::as_str) != Some("codex/event") {
            let method = value.get("method").and_then(Value::as_str).unwrap_or("response");
            return Message::Raw { r#type: method.to_string(), raw_line: line.to_string() };
        }
        let Some(msg) = value.pointer("/params/msg") else {
            return Message::ParseError { err: "codex/event missing params.msg".into(), raw_line: line.to_string() };
        };
        let kind = msg.get("type").and_then(Value::as_str).unwrap_or("");
        match kind {
            "task_started" => Message::System { subtype: "task_started".to_string() },
            "agent_message" => parse_agent_message(msg, line),
            "exec_command_begin" => parse_exec_begin(msg, line),
            "exec_command_end" => parse_exec_end(msg),
            "token_count" => self.parse_token_count(msg),
            "task_complete" => self.parse_task_complete(msg),
            "error" => {
                let message = msg.get("message").and_then(Value::as_str).unwrap_or("codex error");
                Message::Result {
                    subtype: "error".to_string(),
                    is_error: true,
                    result: Some(message.to_string()),
                    diff_stat: None::<DiffStat>,
                    cost_usd: None,
                    duration_ms: 0,
                    api_duration_ms: None,
                    turns: 0,
                    usage: Usage::default(),
                }
            }
            other => Message::Raw { r#type: other.to_string(), raw_line: line.to_string() },
        }
    }

    fn parse_token_count(&self, msg: &Value) -> Message {
        if let Some(total) = msg.pointer("/info/total_token_usage") {
            let mut state = self.state.lock();
            state.total_usage = Usage {
                input_tokens: total.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
                output_tokens: total.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
                cache_creation_tokens: 0,
                cache_read_tokens: total.get("cached_input_tokens").and_then(Value::as_u64).unwrap_or(0),
            };
        }
        Message::Raw { r#type: "token_count".to_string(), raw_line: serde_json::to_string(msg).unwrap_or_default() }
    }

    fn parse_task_complete(&self, msg: &Value) -> Message {
        let mut state = self.state.lock();
        state.turns += 1;
        Message::Result {
            subtype: "success".to_string(),
            is_error: false,
            result: msg.get("last_agent_message").and_then(Value::as_str).map(str::to_string),
            diff_stat: None::<DiffStat>,
            cost_usd: None,
            duration_ms: 0,
            api_duration_ms: None,
            turns: state.turns,
            usage: state.total_usage,
        }
    }
}

fn parse_agent_message(msg: &Value, line: &str) -> Message {
    let Some(message) = msg.get("message").and_then(Value::as_str) else {
        return Message::ParseError { err: "agent_message missing message".into(), raw_line: line.to_string() };
    };
    Message::Assistant { blocks: vec![ContentBlock::Text { text: message.to_string() }] }
}

fn parse_exec_begin(msg: &Value, line: &str) -> Message {
    let Some(call_id) = msg.get("call_id").and_then(Value::as_str) else {
        return Message::ParseError { err: "exec_command_begin missing call_id".into(), raw_line: line.to_string() };
    };
    let input = serde_json::json!({ "command": msg.get("command").cloned().unwrap_or(Value::Null) });
    let canonical = normalize(TOOL_TABLE, "exec_command");
    Message::Assistant {
        blocks: vec![ContentBlock::ToolUse { id: call_id.to_string(), name: canonical.as_str().to_string(), input }],
    }
}

fn parse_exec_end(msg: &Value) -> Message {
    let call_id = msg.get("call_id").and_then(Value::as_str).map(str::to_string);
    let content = serde_json::json!({
        "output": msg.get("aggregated_output").cloned().unwrap_or(Value::Null),
        "exit_code": msg.get("exit_code").cloned().unwrap_or(Value::Null),
    });
    Message::User { content, parent_tool_use_id: call_id }
}

#[cfg(test)]
#[path = "codex_app_server_tests.rs"]
mod tests;
