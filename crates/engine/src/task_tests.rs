// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use caic_core::{ContentBlock, Prompt};
use caic_wire::Harness;

fn identity(id: TaskId) -> TaskIdentity {
    TaskIdentity {
        id,
        repo_id: RepoId::new(),
        harness: Harness::Claude,
        model: "claude".to_string(),
        prompt: Prompt::text("do the thing"),
        created_at_ms: 0,
    }
}

fn result_message() -> Message {
    Message::Result {
        subtype: "success".to_string(),
        is_error: false,
        result: Some("done".to_string()),
        diff_stat: None,
        cost_usd: Some(0.5),
        duration_ms: 1000,
        api_duration_ms: None,
        turns: 1,
        usage: Usage { input_tokens: 10, output_tokens: 5, ..Default::default() },
    }
}

#[test]
fn append_moves_to_waiting_on_result_and_accumulates_stats() {
    let task = Task::new(identity(TaskId::new()), None);
    task.force_state(TaskState::Provisioning);
    task.force_state(TaskState::Starting);
    task.force_state(TaskState::Running);

    task.append(result_message());

    assert_eq!(task.state(), TaskState::Waiting);
    let stats = task.live_stats();
    assert_eq!(stats.cost_usd, Some(0.5));
    assert_eq!(stats.turns, 1);
}

#[test]
fn live_stats_take_elementwise_max_across_results() {
    let task = Task::new(identity(TaskId::new()), None);
    task.force_state(TaskState::Provisioning);
    task.force_state(TaskState::Starting);
    task.force_state(TaskState::Running);

    task.append(result_message());
    task.append(Message::Result {
        subtype: "success".to_string(),
        is_error: false,
        result: None,
        diff_stat: None,
        cost_usd: Some(0.2),
        duration_ms: 2000,
        api_duration_ms: None,
        turns: 2,
        usage: Usage { input_tokens: 3, output_tokens: 50, ..Default::default() },
    });

    let stats = task.live_stats();
    // cost_usd is the max across results (0.5 vs 0.2), not the latest.
    assert_eq!(stats.cost_usd, Some(0.5));
    assert_eq!(stats.duration_ms, 2000);
    assert_eq!(stats.turns, 2);
    assert_eq!(stats.usage.input_tokens, 10);
    assert_eq!(stats.usage.output_tokens, 50);
}

#[test]
fn ask_user_question_tool_use_moves_to_asking() {
    let task = Task::new(identity(TaskId::new()), None);
    task.force_state(TaskState::Provisioning);
    task.force_state(TaskState::Starting);
    task.force_state(TaskState::Running);

    task.append(Message::Assistant {
        blocks: vec![ContentBlock::ToolUse {
            id: "call-1".to_string(),
            name: "AskUserQuestion".to_string(),
            input: serde_json::json!({}),
        }],
    });

    assert_eq!(task.state(), TaskState::Asking);
    assert_eq!(task.pending_tool_calls(), 1);
}

#[test]
fn turn_boundary_force_completes_pending_tool_calls() {
    let task = Task::new(identity(TaskId::new()), None);
    task.force_state(TaskState::Provisioning);
    task.force_state(TaskState::Starting);
    task.force_state(TaskState::Running);

    task.append(Message::Assistant {
        blocks: vec![ContentBlock::ToolUse {
            id: "call-1".to_string(),
            name: "Bash".to_string(),
            input: serde_json::json!({}),
        }],
    });
    assert_eq!(task.pending_tool_calls(), 1);

    task.append(result_message());
    assert_eq!(task.pending_tool_calls(), 0);
}

#[test]
fn subscribe_snapshot_includes_prior_history() {
    let task = Task::new(identity(TaskId::new()), None);
    task.append(Message::System { subtype: "queued".to_string() });

    let sub = task.subscribe();
    assert_eq!(sub.replay.len(), 1);
}

#[tokio::test]
async fn subscribe_then_append_delivers_on_channel() {
    let task = Task::new(identity(TaskId::new()), None);
    let mut sub = task.subscribe();

    task.append(Message::System { subtype: "queued".to_string() });

    let delivered = sub.receiver.recv().await.expect("message delivered");
    assert_eq!(delivered.kind(), "system");
}

#[tokio::test]
async fn send_without_session_is_rejected() {
    let task = Task::new(identity(TaskId::new()), None);
    let err = task.send(Prompt::text("hello")).await.unwrap_err();
    assert!(matches!(err, TaskError::NoSession(_)));
}

#[tokio::test]
async fn send_after_terminate_is_still_attempted_until_terminal_state_set() {
    // `terminate()` only cancels the done token; it does not by itself flip
    // state to Terminated (that is the runner's job after cleanup). Absent a
    // session, `send` still reports NoSession rather than Terminal.
    let task = Task::new(identity(TaskId::new()), None);
    task.terminate();
    assert!(task.is_done());
    let err = task.send(Prompt::text("hello")).await.unwrap_err();
    assert!(matches!(err, TaskError::NoSession(_)));
}

#[test]
fn clear_messages_resets_history_and_stats_but_keeps_identity() {
    let task = Task::new(identity(TaskId::new()), None);
    task.force_state(TaskState::Provisioning);
    task.force_state(TaskState::Starting);
    task.force_state(TaskState::Running);
    task.append(result_message());
    assert!(task.live_stats().cost_usd.is_some());

    task.clear_messages();

    assert_eq!(task.history_len(), 1);
    assert_eq!(task.live_stats().cost_usd, None);
    assert_eq!(task.pending_tool_calls(), 0);
}

#[test]
fn restore_messages_does_not_write_to_log_or_deliver() {
    let task = Task::new(identity(TaskId::new()), None);
    let sub = task.subscribe();

    task.restore_messages(vec![
        Message::System { subtype: "queued".to_string() },
        result_message(),
    ]);

    assert_eq!(task.history_len(), 2);
    assert_eq!(task.state(), TaskState::Waiting);
    // Nothing was delivered because restore_messages bypasses fan-out.
    drop(sub);
}

#[test]
fn mutates_on_tool_result_reports_write_edit_bash_notebook_edit_only() {
    let task = Task::new(identity(TaskId::new()), None);
    task.append(Message::Assistant {
        blocks: vec![
            ContentBlock::ToolUse { id: "w1".to_string(), name: "Write".to_string(), input: serde_json::json!({}) },
            ContentBlock::ToolUse { id: "r1".to_string(), name: "Read".to_string(), input: serde_json::json!({}) },
            ContentBlock::ToolUse {
                id: "n1".to_string(),
                name: "NotebookEdit".to_string(),
                input: serde_json::json!({}),
            },
        ],
    });

    assert!(task.mutates_on_tool_result("w1"));
    assert!(!task.mutates_on_tool_result("r1"));
    assert!(task.mutates_on_tool_result("n1"));
    assert!(!task.mutates_on_tool_result("unknown"));
}

#[test]
fn branch_and_container_name_are_set_after_allocation() {
    let task = Task::new(identity(TaskId::new()), None);
    assert_eq!(task.branch(), None);

    task.set_branch("caic/w3", 3);
    task.set_container_name("caic-tsk-abc");

    assert_eq!(task.branch(), Some("caic/w3".to_string()));
    assert_eq!(task.container_name(), Some("caic-tsk-abc".to_string()));
}

#[test]
fn terminate_is_idempotent() {
    let task = Task::new(identity(TaskId::new()), None);
    task.terminate();
    task.terminate();
    assert!(task.is_done());
}
