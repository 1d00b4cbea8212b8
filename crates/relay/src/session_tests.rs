use super::*;
use crate::ssh::spawn_test_echo;
use caic_wire::ClaudeFormat;

async fn test_session() -> Session {
    let (writer, lines) = spawn_test_echo().await;
    Session::new(Arc::new(ClaudeFormat), writer, lines)
}

#[tokio::test]
async fn send_then_recv_round_trips_through_echo() {
    let session = test_session().await;
    session.send(&Prompt::text("hello")).await.expect("send");
    let msg = session.recv().await.expect("line");
    assert!(matches!(msg, Message::User { .. }));
}

#[tokio::test]
async fn record_and_read_back_session_id() {
    let session = test_session().await;
    assert_eq!(session.session_id(), None);
    session.record_session_id("sess-42");
    assert_eq!(session.session_id(), Some("sess-42".to_string()));
}

#[tokio::test]
async fn signal_result_is_idempotent_and_unblocks_waiters() {
    let session = test_session().await;
    session.signal_result();
    session.signal_result();
    // Must not hang: the latch was already set before await_result was called.
    session.await_result().await;
}

#[tokio::test]
async fn cancel_token_reflects_cancellation() {
    let session = test_session().await;
    let token = session.cancel_token();
    assert!(!token.is_cancelled());
    session.cancel();
    assert!(token.is_cancelled());
}
