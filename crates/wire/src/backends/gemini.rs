// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini CLI's headless NDJSON wire format.
//!
//! Gemini's native event shape differs from Claude's in both field casing
//! and tool vocabulary, so this backend carries its own normalization table
//! rather than reusing Claude's (spec §4.3: "A per-backend table is the
//! sole site of this mapping").

use crate::format::{WireError, WireFormat};
use crate::harness::Harness;
use crate::tools::normalize;
use caic_core::{CanonicalTool, ContentBlock, DiffStat, Message, Prompt, Usage};
use serde_json::Value;

const TOOL_TABLE: &[(&str, CanonicalTool)] = &[
    ("read_file", CanonicalTool::Read),
    ("write_file", CanonicalTool::Write),
    ("replace", CanonicalTool::Edit),
    ("run_shell_command", CanonicalTool::Bash),
    ("search_file_content", CanonicalTool::Grep),
    ("glob", CanonicalTool::Glob),
    ("web_fetch", CanonicalTool::WebFetch),
    ("google_web_search", CanonicalTool::WebSearch),
];

pub struct GeminiFormat;

impl WireFormat for GeminiFormat {
    fn harness(&self) -> Harness {
        Harness::Gemini
    }

    fn supports_send_input(&self) -> bool {
        true
    }

    fn encode_prompt(&self, prompt: &Prompt, resume_session_id: Option<&str>) -> Result<String, WireError> {
        let parts: Vec<Value> = {
            let mut p = Vec::new();
            if !prompt.text.is_empty() {
                p.push(serde_json::json!({ "text": prompt.text }));
            }
            for img in &prompt.images {
                p.push(serde_json::json!({
                    "inline_data": { "mime_type": img.media_type, "data": img.data },
                }));
            }
            p
        };
        let mut record = serde_json::json!({ "type": "user_turn", "parts": parts });
        if let Some(id) = resume_session_id {
            record["session_id"] = Value::String(id.to_string());
        }
        Ok(format!("{}\n", serde_json::to_string(&record)?))
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
        "init" => parse_init(&value),
        "content" => parse_content(&value, line),
        "tool_call" => parse_tool_call(&value, line),
        "tool_result" => parse_tool_result(&value),
        "turn_complete" => parse_turn_complete(&value),
        other => Message::Raw { r#type: other.to_string(), raw_line: line.to_string() },
    }
}

fn parse_init(value: &Value) -> Message {
    Message::SystemInit {
        session_id: value.get("session_id").and_then(Value::as_str).unwrap_or_default().to_string(),
        model: value.get("model").and_then(Value::as_str).unwrap_or_default().to_string(),
        version: None,
        tools: Vec::new(),
        cwd: value.get("cwd").and_then(Value::as_str).unwrap_or_default().into(),
    }
}

fn parse_content(value: &Value, line: &str) -> Message {
    let Some(text) = value.get("text").and_then(Value::as_str) else {
        return Message::ParseError { err: "content event missing text".into(), raw_line: line.to_string() };
    };
    Message::Assistant { blocks: vec![ContentBlock::Text { text: text.to_string() }] }
}

fn parse_tool_call(value: &Value, line: &str) -> Message {
    let Some(call_id) = value.get("call_id").and_then(Value::as_str) else {
        return Message::ParseError { err: "tool_call missing call_id".into(), raw_line: line.to_string() };
    };
    let native_name = value.get("name").and_then(Value::as_str).unwrap_or_default();
    let input = value.get("args").cloned().unwrap_or(Value::Null);
    let canonical = normalize(TOOL_TABLE, native_name);
    Message::Assistant {
        blocks: vec![ContentBlock::ToolUse { id: call_id.to_string(), name: canonical.as_str().to_string(), input }],
    }
}

fn parse_tool_result(value: &Value) -> Message {
    let call_id = value.get("call_id").and_then(Value::as_str).map(str::to_string);
    let content = value.get("output").cloned().unwrap_or(Value::Null);
    Message::User { content, parent_tool_use_id: call_id }
}

fn parse_turn_complete(value: &Value) -> Message {
    let success = value.get("success").and_then(Value::as_bool).unwrap_or(true);
    let usage = value
        .get("usage")
        .map(|u| Usage {
            input_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
            output_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
        })
        .unwrap_or_default();
    Message::Result {
        subtype: if success { "success".to_string() } else { "error".to_string() },
        is_error: !success,
        result: value.get("summary").and_then(Value::as_str).map(str::to_string),
        diff_stat: None::<DiffStat>,
        cost_usd: None,
        duration_ms: value.get("duration_ms").and_then(Value::as_u64).unwrap_or(0),
        api_duration_ms: None,
        turns: value.get("turns").and_then(Value::as_u64).unwrap_or(0) as u32,
        usage,
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
