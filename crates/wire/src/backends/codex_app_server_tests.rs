use super::*;

fn fmt() -> CodexAppServerFormat {
    CodexAppServerFormat::default()
}

#[test]
fn exec_begin_then_end_pairs_as_tool_use_and_tool_result() {
    let f = fmt();
    let begin = r#"{"method":"codex/event","params":{"msg":{"type":"exec_command_begin","call_id":"c1","command":["ls"]}}}"#;
    let end = r#"{"method":"codex/event","params":{"msg":{"type":"exec_command_end","call_id":"c1","exit_code":0,"aggregated_output":"a.txt\n"}}}"#;

    match f.parse_line(begin) {
        Message::Assistant { blocks } => match &blocks[0] {
            ContentBlock::ToolUse { id, name, .. } => {
                assert_eq!(id, "c1");
                assert_eq!(name, "Bash");
            }
            other => panic!("expected ToolUse, got {other:?}"),
        },
        other => panic!("expected Assistant, got {other:?}"),
    }

    assert_eq!(f.parse_line(end).as_tool_result(), Some("c1"));
}

#[test]
fn task_complete_uses_cached_total_usage_from_token_count() {
    let f = fmt();
    let token_count = r#"{"method":"codex/event","params":{"msg":{"type":"token_count","info":{"total_token_usage":{"input_tokens":100,"output_tokens":50}}}}}"#;
    let complete = r#"{"method":"codex/event","params":{"msg":{"type":"task_complete","last_agent_message":"done"}}}"#;

    f.parse_line(token_count);
    match f.parse_line(complete) {
        Message::Result { usage, turns, result, .. } => {
            assert_eq!(usage.input_tokens, 100);
            assert_eq!(usage.output_tokens, 50);
            assert_eq!(turns, 1);
            assert_eq!(result, Some("done".to_string()));
        }
        other => panic!("expected Result, got {other:?}"),
    }
}

#[test]
fn turns_increments_across_multiple_task_complete_events() {
    let f = fmt();
    let complete = r#"{"method":"codex/event","params":{"msg":{"type":"task_complete","last_agent_message":"x"}}}"#;
    f.parse_line(complete);
    match f.parse_line(complete) {
        Message::Result { turns, .. } => assert_eq!(turns, 2),
        other => panic!("expected Result, got {other:?}"),
    }
}

#[test]
fn non_codex_event_method_becomes_raw() {
    let line = r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#;
    assert!(matches!(fmt().parse_line(line), Message::Raw { .. }));
}

#[test]
fn encode_prompt_is_a_json_rpc_request() {
    let prompt = Prompt::text("go");
    let encoded = fmt().encode_prompt(&prompt, None).expect("encode");
    let value: Value = serde_json::from_str(encoded.trim_end()).expect("valid json");
    assert_eq!(value["method"], "thread/sendMessage");
    assert_eq!(value["jsonrpc"], "2.0");
}
