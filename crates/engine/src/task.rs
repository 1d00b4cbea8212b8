// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `Task`: the durable unit of work (spec §3 "Task", §4.1).
//!
//! A single [`parking_lot::Mutex`] guards state, history, the subscriber
//! set, and the attached session pointer (spec §4.1 "Concurrency"). The
//! log writer lives under the same lock so an `Append` call's three
//! effects — memory, disk, fan-out — stay consistent with each other even
//! though a slow subscriber is evicted rather than awaited.

use std::collections::HashMap;
use std::sync::Arc;

use caic_core::{DiffStat, Message, Prompt, RepoId, TaskId, TaskState, Usage};
use caic_relay::Session;
use caic_storage::{LogTrailer, TaskLog};
use caic_wire::Harness;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::subscriber::{try_deliver, SubscriberId, Subscription, SUBSCRIBER_BUFFER};
use crate::tool_timing::ToolTimingTracker;

/// Immutable identity established at creation (spec §3 "Task" attributes).
///
/// `branch`/`container_name` are deliberately absent: they are allocated by
/// the runner during the `branching`/`provisioning` steps (spec §4.2
/// `Start`), after the `Task` already exists and is reporting that state.
pub struct TaskIdentity {
    pub id: TaskId,
    pub repo_id: RepoId,
    pub harness: Harness,
    pub model: String,
    pub prompt: Prompt,
    pub created_at_ms: u64,
}

/// Running max over every `Result` observed in the current log segment
/// (spec invariant 7: "`max(session-reported, log-accumulated)`").
#[derive(Debug, Clone, Default)]
struct StatsAccumulator {
    cost_usd: Option<f64>,
    duration_ms: u64,
    turns: u32,
    usage: Usage,
}

impl StatsAccumulator {
    fn observe(&mut self, subtype_cost: Option<f64>, duration_ms: u64, turns: u32, usage: Usage) {
        self.cost_usd = match (self.cost_usd, subtype_cost) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.duration_ms = self.duration_ms.max(duration_ms);
        self.turns = self.turns.max(turns);
        self.usage = self.usage.max(usage);
    }
}

/// Snapshot returned by [`Task::live_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LiveStats {
    pub cost_usd: Option<f64>,
    pub duration_ms: u64,
    pub turns: u32,
    pub usage: Usage,
}

struct TaskInner {
    state: TaskState,
    history: Vec<Message>,
    subscribers: HashMap<SubscriberId, mpsc::Sender<Message>>,
    next_subscriber_id: SubscriberId,
    session: Option<Arc<Session>>,
    session_id: Option<String>,
    relay_offset: u64,
    branch: Option<String>,
    branch_seqnum: Option<u64>,
    container_name: Option<String>,
    tool_timing: ToolTimingTracker,
    stats: StatsAccumulator,
    log: Option<TaskLog>,
    subscriber_buffer: usize,
}

pub struct Task {
    pub identity: TaskIdentity,
    inner: Mutex<TaskInner>,
    /// Serializes `Send` calls (spec §4.1: "a single sender
    /// goroutine/coroutine per task"). Held across the `await` that writes
    /// to the agent's stdin, so it must not be the same lock guarding
    /// `history`/`subscribers` (those are taken and released synchronously).
    send_lock: tokio::sync::Mutex<()>,
    done: CancellationToken,
}

impl Task {
    pub fn new(identity: TaskIdentity, log: Option<TaskLog>) -> Self {
        Self {
            identity,
            inner: Mutex::new(TaskInner {
                state: TaskState::Branching,
                history: Vec::new(),
                subscribers: HashMap::new(),
                next_subscriber_id: 0,
                session: None,
                session_id: None,
                relay_offset: 0,
                branch: None,
                branch_seqnum: None,
                container_name: None,
                tool_timing: ToolTimingTracker::new(),
                stats: StatsAccumulator::default(),
                log,
                subscriber_buffer: SUBSCRIBER_BUFFER,
            }),
            send_lock: tokio::sync::Mutex::new(()),
            done: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.identity.id
    }

    pub fn state(&self) -> TaskState {
        self.inner.lock().state
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.lock().session_id.clone()
    }

    pub fn relay_offset(&self) -> u64 {
        self.inner.lock().relay_offset
    }

    pub fn set_relay_offset(&self, offset: u64) {
        self.inner.lock().relay_offset = offset;
    }

    pub fn attach_session(&self, session: Arc<Session>) {
        self.inner.lock().session = Some(session);
    }

    /// Records the branch allocated during the `branching` step (spec §4.2
    /// `Start` step 1). Set once; preserved across `RestartSession`.
    pub fn set_branch(&self, branch: impl Into<String>, seqnum: u64) {
        let mut inner = self.inner.lock();
        inner.branch = Some(branch.into());
        inner.branch_seqnum = Some(seqnum);
    }

    pub fn branch(&self) -> Option<String> {
        self.inner.lock().branch.clone()
    }

    pub fn set_container_name(&self, name: impl Into<String>) {
        self.inner.lock().container_name = Some(name.into());
    }

    pub fn container_name(&self) -> Option<String> {
        self.inner.lock().container_name.clone()
    }

    pub fn current_session(&self) -> Option<Arc<Session>> {
        self.inner.lock().session.clone()
    }

    /// Overrides the default subscriber channel capacity with
    /// `Config::subscriber_buffer` (SPEC_FULL §3.1). Callers set this right
    /// after construction, before any `subscribe` call.
    pub fn set_subscriber_buffer(&self, capacity: usize) {
        self.inner.lock().subscriber_buffer = capacity;
    }

    /// Forces a state transition (used by the runner for driver-side
    /// progress: branching -> provisioning -> starting -> running).
    ///
    /// Silently ignored if it would violate monotonic progression (spec
    /// invariant 1) — callers drive this from a single runner task so this
    /// is a defensive check, not the primary synchronization mechanism.
    pub fn force_state(&self, next: TaskState) {
        let mut inner = self.inner.lock();
        if inner.state.can_advance_to(next) {
            tracing::info!(task_id = %self.identity.id, from = %inner.state, to = %next, "task state transition");
            inner.state = next;
        }
    }

    /// Ordered insert of one normalized message (spec §4.1 `Append`).
    pub fn append(&self, message: Message) {
        let mut inner = self.inner.lock();
        Self::append_locked(&self.identity.id, &mut inner, message);
    }

    fn append_locked(task_id: &TaskId, inner: &mut TaskInner, message: Message) {
        tracing::debug!(task_id = %task_id, kind = message.kind(), "task append");

        derive_tool_timing(&mut inner.tool_timing, &message);

        let next_state = derive_next_state(inner.state, &message);
        if let Some(next) = next_state {
            if inner.state.can_advance_to(next) {
                tracing::info!(task_id = %task_id, from = %inner.state, to = %next, "task state transition");
                inner.state = next;
            }
        }

        if let Message::Result { cost_usd, duration_ms, turns, usage, .. } = &message {
            inner.stats.observe(*cost_usd, *duration_ms, *turns, *usage);
        }
        if let Message::SystemInit { session_id, .. } = &message {
            inner.session_id = Some(session_id.clone());
        }

        if let Some(log) = inner.log.as_mut() {
            if let Err(err) = log.append(&message) {
                // Spec §4.6: a log-writer failure never blocks memory or
                // fan-out; durability is recovered by replay on restart.
                tracing::error!(task_id = %task_id, %err, "failed to append to task log");
            }
        }

        inner.history.push(message.clone());

        inner.subscribers.retain(|_, sender| try_deliver(sender, &message));
    }

    /// Snapshot-plus-live-stream subscribe (spec §4.1 `Subscribe`).
    ///
    /// The snapshot and the channel registration happen under the same
    /// lock acquisition so no append can land between them (spec: "Replay
    /// and live stream MUST be stitched without gaps and without
    /// duplicates").
    pub fn subscribe(&self) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;
        let (tx, rx) = mpsc::channel(inner.subscriber_buffer);
        inner.subscribers.insert(id, tx);
        Subscription { id, replay: inner.history.clone(), receiver: rx }
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.lock().subscribers.remove(&id);
    }

    /// Serializes one user turn through the attached session (spec §4.1
    /// `Send`).
    pub async fn send(&self, prompt: Prompt) -> Result<(), TaskError> {
        let _serialize = self.send_lock.lock().await;

        let session = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return Err(TaskError::Terminal(self.identity.id.clone()));
            }
            let Some(session) = inner.session.clone() else {
                return Err(TaskError::NoSession(self.identity.id.clone()));
            };
            // The prompt is observed by clients before the bytes reach the
            // agent (spec §4.1: "before the bytes are written to the agent
            // so clients observe the prompt in-order").
            Self::append_locked(
                &self.identity.id,
                &mut inner,
                Message::User {
                    content: serde_json::json!({ "text": prompt.text }),
                    parent_tool_use_id: None,
                },
            );
            session
        };

        session.send(&prompt).await?;
        Ok(())
    }

    /// Replays parsed history during adoption, without log writes or
    /// subscriber delivery (spec §4.1 `RestoreMessages`: "used only during
    /// adoption before any subscribers exist").
    pub fn restore_messages(&self, messages: Vec<Message>) {
        let mut inner = self.inner.lock();
        for message in messages {
            derive_tool_timing(&mut inner.tool_timing, &message);
            if let Some(next) = derive_next_state(inner.state, &message) {
                if inner.state.can_advance_to(next) {
                    inner.state = next;
                }
            }
            if let Message::Result { cost_usd, duration_ms, turns, usage, .. } = &message {
                inner.stats.observe(*cost_usd, *duration_ms, *turns, *usage);
            }
            if let Message::SystemInit { session_id, .. } = &message {
                inner.session_id = Some(session_id.clone());
            }
            inner.history.push(message);
        }
    }

    /// `RestartSession` support: appends a `context_cleared` marker,
    /// truncates in-memory history to it, and resets per-segment state
    /// (spec §4.1 `ClearMessages`). The on-disk log is NOT truncated.
    pub fn clear_messages(&self) {
        let mut inner = self.inner.lock();
        let marker = Message::System { subtype: "context_cleared".to_string() };
        if let Some(log) = inner.log.as_mut() {
            if let Err(err) = log.append(&marker) {
                tracing::error!(task_id = %self.identity.id, %err, "failed to append context_cleared marker");
            }
        }
        inner.history = vec![marker];
        inner.tool_timing = ToolTimingTracker::new();
        inner.stats = StatsAccumulator::default();
        inner.session_id = None;
    }

    pub fn live_stats(&self) -> LiveStats {
        let inner = self.inner.lock();
        LiveStats {
            cost_usd: inner.stats.cost_usd,
            duration_ms: inner.stats.duration_ms,
            turns: inner.stats.turns,
            usage: inner.stats.usage,
        }
    }

    pub fn pending_tool_calls(&self) -> usize {
        self.inner.lock().tool_timing.pending_count()
    }

    /// Whether the tool-use still pending under `tool_use_id` mutated the
    /// filesystem (spec invariant 6 / §4.2 dispatch loop: "If it is a
    /// `User` with `parentToolUseID` referring to a mutating tool-use,
    /// emit a synthetic `DiffStat`"). Must be called before `append`,
    /// which clears the pending entry.
    pub fn mutates_on_tool_result(&self, tool_use_id: &str) -> bool {
        self.inner
            .lock()
            .tool_timing
            .peek(tool_use_id)
            .is_some_and(|name| matches!(name, "Write" | "Edit" | "Bash" | "NotebookEdit"))
    }

    /// Starts a new log segment in place (same file, new header) for
    /// `RestartSession` (spec §4.2 "opens a new log segment (same file)
    /// with a new header").
    pub fn replace_log(&self, log: TaskLog) {
        self.inner.lock().log = Some(log);
    }

    /// Writes a new header line into the existing log segment without
    /// opening a new file (spec §4.2 `RestartSession`: "opens a new log
    /// segment (same file) with a new header").
    pub fn write_segment_header(&self, header: &caic_storage::LogHeader) {
        let mut inner = self.inner.lock();
        if let Some(log) = inner.log.as_mut() {
            if let Err(err) = log.write_segment_header(header) {
                tracing::error!(task_id = %self.identity.id, %err, "failed to write log segment header");
            }
        }
    }

    pub fn write_trailer(&self, trailer: &LogTrailer) {
        let mut inner = self.inner.lock();
        if let Some(log) = inner.log.as_mut() {
            if let Err(err) = log.write_trailer(trailer) {
                tracing::error!(task_id = %self.identity.id, %err, "failed to write log trailer");
            }
        }
    }

    pub fn done(&self) -> CancellationToken {
        self.done.clone()
    }

    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Idempotent: calling this twice is observationally indistinguishable
    /// from calling it once (spec §8 round-trip property).
    pub fn terminate(&self) {
        self.done.cancel();
    }
}

/// Updates the tool-timing tracker for one incoming message (spec
/// invariant 5).
fn derive_tool_timing(tracker: &mut ToolTimingTracker, message: &Message) {
    match message {
        Message::Assistant { blocks } => {
            for block in blocks {
                if let caic_core::ContentBlock::ToolUse { id, name, .. } = block {
                    tracker.record_tool_use(id.clone(), name.clone());
                }
            }
        }
        Message::User { parent_tool_use_id: Some(id), .. } => {
            tracker.record_tool_result(id);
        }
        Message::Result { .. } => {
            tracker.complete_turn();
        }
        _ => {}
    }
}

/// State-machine update driven purely by message content (spec §4.2
/// "Dispatch loop" + §3 "Lifecycles").
fn derive_next_state(current: TaskState, message: &Message) -> Option<TaskState> {
    match message {
        Message::Assistant { .. } if message.is_ask_user_question() => Some(TaskState::Asking),
        Message::Result { .. } => Some(TaskState::Waiting),
        Message::User { parent_tool_use_id: None, .. } => {
            // A plain user-text message (not a tool result) is the start of
            // a new turn.
            if matches!(current, TaskState::Waiting | TaskState::Asking) {
                Some(TaskState::Running)
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
