use super::*;

fn fmt() -> ClaudeFormat {
    ClaudeFormat
}

#[test]
fn parses_system_init() {
    let line = r#"{"type":"system","subtype":"init","session_id":"abc123","model":"claude-opus-4","tools":["Read","Bash"],"cwd":"/work"}"#;
    let msg = fmt().parse_line(line);
    match msg {
        Message::SystemInit { session_id, model, tools, cwd, .. } => {
            assert_eq!(session_id, "abc123");
            assert_eq!(model, "claude-opus-4");
            assert_eq!(tools, vec!["Read".to_string(), "Bash".to_string()]);
            assert_eq!(cwd, std::path::PathBuf::from("/work"));
        }
        other => panic!("expected SystemInit, got {other:?}"),
    }
}

#[test]
fn parses_assistant_tool_use_and_normalizes_name() {
    let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"tu_1","name":"Bash","input":{"command":"ls"}}]}}"#;
    let msg = fmt().parse_line(line);
    match msg {
        Message::Assistant { blocks } => {
            assert_eq!(blocks.len(), 1);
            match &blocks[0] {
                ContentBlock::ToolUse { id, name, .. } => {
                    assert_eq!(id, "tu_1");
                    assert_eq!(name, "Bash");
                }
                other => panic!("expected ToolUse, got {other:?}"),
            }
        }
        other => panic!("expected Assistant, got {other:?}"),
    }
}

#[test]
fn parses_tool_result_as_user_with_parent_id() {
    let line = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"tu_1","content":"ok"}]}}"#;
    let msg = fmt().parse_line(line);
    assert_eq!(msg.as_tool_result(), Some("tu_1"));
}

#[test]
fn parses_result_with_usage() {
    let line = r#"{"type":"result","subtype":"success","is_error":false,"result":"done","cost_usd":0.05,"duration_ms":1200,"num_turns":2,"usage":{"input_tokens":10,"output_tokens":20}}"#;
    let msg = fmt().parse_line(line);
    match msg {
        Message::Result { is_error, turns, usage, cost_usd, .. } => {
            assert!(!is_error);
            assert_eq!(turns, 2);
            assert_eq!(usage.input_tokens, 10);
            assert_eq!(usage.output_tokens, 20);
            assert_eq!(cost_usd, Some(0.05));
        }
        other => panic!("expected Result, got {other:?}"),
    }
}

#[test]
fn unknown_type_becomes_raw() {
    let line = r#"{"type":"future_event","data":{}}"#;
    let msg = fmt().parse_line(line);
    match msg {
        Message::Raw { r#type, .. } => assert_eq!(r#type, "future_event"),
        other => panic!("expected Raw, got {other:?}"),
    }
}

#[test]
fn malformed_json_becomes_parse_error() {
    let line = "{not json";
    let msg = fmt().parse_line(line);
    assert!(matches!(msg, Message::ParseError { .. }));
}

#[test]
fn encode_prompt_produces_single_newline_terminated_record() {
    let prompt = Prompt::text("fix the bug");
    let encoded = fmt().encode_prompt(&prompt, None).expect("encode");
    assert_eq!(encoded.matches('\n').count(), 1);
    assert!(encoded.ends_with('\n'));
    let value: Value = serde_json::from_str(encoded.trim_end()).expect("valid json");
    assert_eq!(value["type"], "user");
}

#[test]
fn encode_prompt_includes_resume_session_id() {
    let prompt = Prompt::text("continue");
    let encoded = fmt().encode_prompt(&prompt, Some("sess-1")).expect("encode");
    let value: Value = serde_json::from_str(encoded.trim_end()).expect("valid json");
    assert_eq!(value["session_id"], "sess-1");
}
