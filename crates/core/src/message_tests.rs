// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn tool_result_extracts_parent_id() {
    let m = Message::User {
        content: serde_json::json!({"text": "ok"}),
        parent_tool_use_id: Some("tool-1".to_string()),
    };
    assert_eq!(m.as_tool_result(), Some("tool-1"));
}

#[test]
fn plain_user_input_is_not_a_tool_result() {
    let m = Message::User { content: serde_json::json!("hi"), parent_tool_use_id: None };
    assert_eq!(m.as_tool_result(), None);
}

#[test]
fn ask_user_question_detected_in_assistant_blocks() {
    let m = Message::Assistant {
        blocks: vec![ContentBlock::ToolUse {
            id: "t1".into(),
            name: "AskUserQuestion".into(),
            input: serde_json::json!({}),
        }],
    };
    assert!(m.is_ask_user_question());
}

#[test]
fn tool_use_ids_collects_all_blocks() {
    let m = Message::Assistant {
        blocks: vec![
            ContentBlock::Text { text: "thinking".into() },
            ContentBlock::ToolUse { id: "a".into(), name: "Read".into(), input: serde_json::json!({}) },
            ContentBlock::ToolUse { id: "b".into(), name: "Bash".into(), input: serde_json::json!({}) },
        ],
    };
    assert_eq!(m.tool_use_ids(), vec!["a", "b"]);
}

#[test]
fn mutating_tools_are_flagged() {
    assert!(CanonicalTool::Edit.mutates_filesystem());
    assert!(CanonicalTool::Write.mutates_filesystem());
    assert!(CanonicalTool::Bash.mutates_filesystem());
    assert!(CanonicalTool::NotebookEdit.mutates_filesystem());
    assert!(!CanonicalTool::Read.mutates_filesystem());
    assert!(!CanonicalTool::Grep.mutates_filesystem());
}

#[test]
fn usage_max_is_elementwise() {
    let a = Usage { input_tokens: 10, output_tokens: 100, cache_creation_tokens: 0, cache_read_tokens: 5 };
    let b = Usage { input_tokens: 20, output_tokens: 50, cache_creation_tokens: 3, cache_read_tokens: 1 };
    let m = a.max(b);
    assert_eq!(m.input_tokens, 20);
    assert_eq!(m.output_tokens, 100);
    assert_eq!(m.cache_creation_tokens, 3);
    assert_eq!(m.cache_read_tokens, 5);
}

#[test]
fn message_round_trips_through_json() {
    let m = Message::Result {
        subtype: "success".into(),
        is_error: false,
        result: Some("done".into()),
        diff_stat: None,
        cost_usd: Some(0.12),
        duration_ms: 4200,
        api_duration_ms: Some(3800),
        turns: 3,
        usage: Usage::default(),
    };
    let json = serde_json::to_string(&m).expect("serialize");
    let back: Message = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(m, back);
}

#[test]
fn raw_message_preserves_unknown_type_tag() {
    let line = r#"{"type":"raw","raw_type":"future_event","raw_line":"{}"}"#;
    let m: Message = serde_json::from_str(line).expect("deserialize");
    assert!(matches!(m, Message::Raw { r#type, .. } if r#type == "future_event"));
}
