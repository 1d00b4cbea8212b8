// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `codex exec --json` wire format: single-shot, no JSON-RPC envelope, no
//! mid-session input (spec §9 Open Questions: "An implementer targeting
//! the exec variant MUST document that `SendInput` rejects").

use crate::format::{WireError, WireFormat};
use crate::harness::Harness;
use crate::tools::normalize;
use caic_core::{CanonicalTool, ContentBlock, DiffStat, Message, Prompt, Usage};
use serde_json::Value;

const TOOL_TABLE: &[(&str, CanonicalTool)] = &[("exec_command", CanonicalTool::Bash)];

#[derive(Default)]
pub struct CodexExecFormat;

impl WireFormat for CodexExecFormat {
    fn harness(&self) -> Harness {
        Harness::CodexExec
    }

    fn supports_send_input(&self) -> bool {
        false
    }

    fn encode_prompt(&self, _prompt: &Prompt, _resume_session_id: Option<&str>) -> Result<String, WireError> {
        Err(WireError::SendInputUnsupported { harness: Harness::CodexExec })
    }

    fn parse_line(&self, line: &str) -> Message {
        parse(line)
    }
}

fn parse(line: &str) -> Message {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(err) => return Message::ParseError { err: err.to_string(), raw_line: line.to_string() },
    };
    let kind = value.get("type").and_then(Value::as_str).unwrap_or("");
    match kind {
        "agent_message" => parse_agent_message(&value, line),
        "exec_command_begin" => parse_exec_begin(&value, line),
        "exec_command_end" => parse_exec_end(&value),
        "task_complete" => parse_task_complete(&value),
        other => Message::Raw { r#type: other.to_string(), raw_line: line.to_string() },
    }
}

fn parse_agent_message(value: &Value, line: &str) -> Message {
    let Some(message) = value.get("message").and_then(Value::as_str) else {
        return Message::ParseError { err: "agent_message missing message".into(), raw_line: line.to_string() };
    };
    Message::Assistant { blocks: vec![ContentBlock::Text { text: message.to_string() }] }
}

fn parse_exec_begin(value: &Value, line: &str) -> Message {
    let Some(call_id) = value.get("call_id").and_then(Value::as_str) else {
        return Message::ParseError { err: "exec_command_begin missing call_id".into(), raw_line: line.to_string() };
    };
    let input = serde_json::json!({ "command": value.get("command").cloned().unwrap_or(Value::Null) });
    let canonical = normalize(TOOL_TABLE, "exec_command");
    Message::Assistant {
        blocks: vec![ContentBlock::ToolUse { id: call_id.to_string(), name: canonical.as_str().to_string(), input }],
    }
}

fn parse_exec_end(value: &Value) -> Message {
    let call_id = value.get("call_id").and_then(Value::as_str).map(str::to_string);
    let content = serde_json::json!({
        "output": value.get("aggregated_output").cloned().unwrap_or(Value::Null),
        "exit_code": value.get("exit_code").cloned().unwrap_or(Value::Null),
    });
    Message::User { content, parent_tool_use_id: call_id }
}

fn parse_task_complete(value: &Value) -> Message {
    Message::Result {
        subtype: "success".to_string(),
        is_error: false,
        result: value.get("last_agent_message").and_then(Value::as_str).map(str::to_string),
        diff_stat: None::<DiffStat>,
        cost_usd: None,
        duration_ms: 0,
        api_duration_ms: None,
        turns: 1,
        usage: Usage::default(),
    }
}

#[cfg(test)]
#[path = "codex_exec_tests.rs"]
mod tests;
