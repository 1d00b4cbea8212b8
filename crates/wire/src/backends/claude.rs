// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Claude Code's `--output-format stream-json` wire format.
//!
//! This is the backend the canonical `Message`/`CanonicalTool` vocabulary
//! was modeled after (spec §3), so its normalization table is close to an
//! identity mapping.

use crate::format::{WireError, WireFormat};
use crate::harness::Harness;
use crate::tools::normalize;
use caic_core::{CanonicalTool, ContentBlock, DiffStat, Message, Prompt, Usage};
use serde_json::Value;

const TOOL_TABLE: &[(&str, CanonicalTool)] = &[
    ("Read", CanonicalTool::Read),
    ("Write", CanonicalTool::Write),
    ("Edit", CanonicalTool::Edit),
    ("Bash", CanonicalTool::Bash),
    ("Grep", CanonicalTool::Grep),
    ("Glob", CanonicalTool::Glob),
    ("WebFetch", CanonicalTool::WebFetch),
    ("WebSearch", CanonicalTool::WebSearch),
    ("AskUserQuestion", CanonicalTool::AskUserQuestion),
    ("TodoWrite", CanonicalTool::TodoWrite),
    ("NotebookEdit", CanonicalTool::NotebookEdit),
];

pub struct ClaudeFormat;

impl WireFormat for ClaudeFormat {
    fn harness(&self) -> Harness {
        Harness::Claude
    }

    fn supports_send_input(&self) -> bool {
        true
    }

    fn encode_prompt(&self, prompt: &Prompt, resume_session_id: Option<&str>) -> Result<String, WireError> {
        let mut content: Vec<Value> = Vec::new();
        if !prompt.text.is_empty() {
            content.push(serde_json::json!({ "type": "text", "text": prompt.text }));
        }
        for img in &prompt.images {
            content.push(serde_json::json!({
                "type": "image",
                "source": { "type": "base64", "media_type": img.media_type, "data": img.data },
            }));
        }
        let mut record = serde_json::json!({
            "type": "user",
            "message": { "role": "user", "content": content },
        });
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
        "system" => parse_system(&value),
        "assistant" => parse_assistant(&value, line),
        "user" => parse_user(&value, line),
        "result" => parse_result(&value, line),
        "stream_event" => parse_stream_event(&value, line),
        other => Message::Raw { r#type: other.to_string(), raw_line: line.to_string() },
    }
}

fn parse_system(value: &Value) -> Message {
    if value.get("subtype").and_then(Value::as_str) == Some("init") {
        let session_id = value.get("session_id").and_then(Value::as_str).unwrap_or_default();
        let model = value.get("model").and_then(Value::as_str).unwrap_or_default();
        let cwd = value.get("cwd").and_then(Value::as_str).unwrap_or_default();
        let tools = value
            .get("tools")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        Message::SystemInit {
            session_id: session_id.to_string(),
            model: model.to_string(),
            version: value.get("version").and_then(Value::as_str).map(str::to_string),
            tools,
            cwd: cwd.into(),
        }
    } else {
        let subtype = value.get("subtype").and_then(Value::as_str).unwrap_or("unknown");
        Message::System { subtype: subtype.to_string() }
    }
}

fn parse_assistant(value: &Value, line: &str) -> Message {
    let Some(blocks) = value.pointer("/message/content").and_then(Value::as_array) else {
        return Message::ParseError { err: "assistant message missing content".into(), raw_line: line.to_string() };
    };
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = block.get("text").and_then(Value::as_str).unwrap_or_default();
                out.push(ContentBlock::Text { text: text.to_string() });
            }
            Some("tool_use") => {
                let id = block.get("id").and_then(Value::as_str).unwrap_or_default();
                let native_name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                let input = block.get("input").cloned().unwrap_or(Value::Null);
                let canonical = normalize(TOOL_TABLE, native_name);
                out.push(ContentBlock::ToolUse { id: id.to_string(), name: canonical.as_str().to_string(), input });
            }
            _ => {}
        }
    }
    Message::Assistant { blocks: out }
}

fn parse_user(value: &Value, _line: &str) -> Message {
    let content = value.pointer("/message/content").cloned().unwrap_or(Value::Null);
    let parent_tool_use_id = content
        .as_array()
        .and_then(|blocks| blocks.iter().find_map(|b| b.get("tool_use_id").and_then(Value::as_str)))
        .map(str::to_string);
    Message::User { content, parent_tool_use_id }
}

fn parse_result(value: &Value, _line: &str) -> Message {
    let usage = value
        .get("usage")
        .map(|u| Usage {
            input_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
            output_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
            cache_creation_tokens: u.get("cache_creation_input_tokens").and_then(Value::as_u64).unwrap_or(0),
            cache_read_tokens: u.get("cache_read_input_tokens").and_then(Value::as_u64).unwrap_or(0),
        })
        .unwrap_or_default();
    Message::Result {
        subtype: value.get("subtype").and_then(Value::as_str).unwrap_or_default().to_string(),
        is_error: value.get("is_error").and_then(Value::as_bool).unwrap_or(false),
        result: value.get("result").and_then(Value::as_str).map(str::to_string),
        diff_stat: None::<DiffStat>,
        cost_usd: value.get("cost_usd").and_then(Value::as_f64),
        duration_ms: value.get("duration_ms").and_then(Value::as_u64).unwrap_or(0),
        api_duration_ms: value.get("duration_api_ms").and_then(Value::as_u64),
        turns: value.get("num_turns").and_then(Value::as_u64).unwrap_or(0) as u32,
        usage,
    }
}

fn parse_stream_event(value: &Value, _line: &str) -> Message {
    let text = value
        .pointer("/event/delta/text")
        .or_else(|| value.pointer("/delta/text"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    Message::StreamEvent { text: text.to_string() }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
