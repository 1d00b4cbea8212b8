use super::*;
use caic_core::{DiffStat, TaskId, Usage};
use tempfile::tempdir;

fn test_header() -> LogHeader {
    LogHeader::new(
        TaskId::new(),
        "add README",
        "/repos/demo",
        "caic/w1",
        "claude",
        "claude-opus-4",
        chrono::Utc::now(),
    )
}

#[test]
fn create_writes_header_as_first_line() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("test.jsonl");
    let header = test_header();

    TaskLog::create(&path, &header).expect("create");

    let replayed = replay(&path).expect("replay");
    assert_eq!(replayed.header, header);
    assert!(replayed.messages.is_empty());
    assert!(replayed.trailer.is_none());
}

#[test]
fn create_fails_if_file_already_exists() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("test.jsonl");
    let header = test_header();

    TaskLog::create(&path, &header).expect("first create");
    let second = TaskLog::create(&path, &header);
    assert!(second.is_err());
}

#[test]
fn appended_messages_replay_in_order() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("test.jsonl");
    let mut log = TaskLog::create(&path, &test_header()).expect("create");

    log.append(&Message::StreamEvent { text: "hello".into() }).expect("append 1");
    log.append(&Message::StreamEvent { text: "world".into() }).expect("append 2");

    let replayed = replay(&path).expect("replay");
    assert_eq!(replayed.messages.len(), 2);
    assert_eq!(
        replayed.messages[0],
        Message::StreamEvent { text: "hello".into() }
    );
    assert_eq!(
        replayed.messages[1],
        Message::StreamEvent { text: "world".into() }
    );
}

#[test]
fn trailer_is_detected_regardless_of_how_many_messages_precede_it() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("test.jsonl");
    let mut log = TaskLog::create(&path, &test_header()).expect("create");

    log.append(&Message::StreamEvent { text: "working".into() }).expect("append");
    log.write_trailer(&LogTrailer::terminated(Usage::default(), 2500, 4, DiffStat::default()))
        .expect("trailer");

    let replayed = replay(&path).expect("replay");
    assert_eq!(replayed.messages.len(), 1);
    let trailer = replayed.trailer.expect("trailer present");
    assert_eq!(trailer.num_turns, 4);
    assert_eq!(trailer.duration_ms, 2500);
}

#[test]
fn open_append_continues_an_existing_log() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("test.jsonl");
    {
        let mut log = TaskLog::create(&path, &test_header()).expect("create");
        log.append(&Message::StreamEvent { text: "first session".into() }).expect("append");
    }

    {
        let mut log = TaskLog::open_append(&path).expect("reopen");
        log.append(&Message::StreamEvent { text: "after adoption".into() }).expect("append");
    }

    let replayed = replay(&path).expect("replay");
    assert_eq!(replayed.messages.len(), 2);
}

#[test]
fn replay_skips_truncated_trailing_line() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("test.jsonl");
    let mut log = TaskLog::create(&path, &test_header()).expect("create");
    log.append(&Message::StreamEvent { text: "complete line".into() }).expect("append");
    drop(log);

    use std::io::Write as _;
    let mut file = std::fs::OpenOptions::new().append(true).open(&path).expect("open");
    write!(file, "{{\"type\":\"stream_event\",\"tex").expect("write partial line");

    let replayed = replay(&path).expect("replay should not fail on a truncated tail");
    assert_eq!(replayed.messages.len(), 1);
}

#[test]
fn missing_header_line_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("empty.jsonl");
    std::fs::File::create(&path).expect("create empty file");

    let result = replay(&path);
    assert!(matches!(result, Err(StorageError::MissingHeader(_))));
}
