use super::*;

fn fmt() -> CodexExecFormat {
    CodexExecFormat
}

#[test]
fn send_input_is_unsupported() {
    let prompt = Prompt::text("hi");
    let err = fmt().encode_prompt(&prompt, None).expect_err("must reject");
    assert!(matches!(err, WireError::SendInputUnsupported { harness: Harness::CodexExec }));
}

#[test]
fn parses_agent_message() {
    let line = r#"{"type":"agent_message","message":"hello"}"#;
    match fmt().parse_line(line) {
        Message::Assistant { blocks } => match &blocks[0] {
            ContentBlock::Text { text } => assert_eq!(text, "hello"),
            other => panic!("expected Text, got {other:?}"),
        },
        other => panic!("expected Assistant, got {other:?}"),
    }
}

#[test]
fn task_complete_reports_one_turn() {
    let line = r#"{"type":"task_complete","last_agent_message":"done"}"#;
    match fmt().parse_line(line) {
        Message::Result { turns, is_error, .. } => {
            assert_eq!(turns, 1);
            assert!(!is_error);
        }
        other => panic!("expected Result, got {other:?}"),
    }
}

#[test]
fn unknown_type_becomes_raw() {
    assert!(matches!(fmt().parse_line(r#"{"type":"shutdown"}"#), Message::Raw { .. }));
}
