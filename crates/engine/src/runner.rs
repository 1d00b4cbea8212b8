// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Task factory and lifecycle coordinator (spec §2 "Runner", §4.2).
//!
//! Owns branch allocation, container provisioning, session start, the
//! per-task ingress dispatch loop, and cleanup. The branch mutex is the
//! single serialization point across every task in every repo (spec §5
//! "Shared resources": "The branch-allocation mutex serializes branch
//! creation and container start across all tasks").

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use caic_core::{Clock, Config, Message, Prompt, RepoId, SystemClock, TaskId, TaskState};
use caic_relay::{Session, SshTarget};
use caic_runtime::{ContainerDriver, ContainerSpec, GitDriver};
use caic_storage::{LogHeader, LogTrailer, TaskLog};
use caic_wire::{backend_for, Harness};
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::error::RunnerError;
use crate::repository::{Repository, RepositoryRegistry};
use crate::safety;
use crate::task::{Task, TaskIdentity};

/// Parameters for `createTask` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskParams {
    pub repo_id: RepoId,
    pub harness: Harness,
    pub model: String,
    pub prompt: Prompt,
    pub container_image: String,
}

impl CreateTaskParams {
    /// `createTask` validates "non-empty prompt-or-images, non-empty repo,
    /// non-empty harness" (spec §6).
    fn validate(&self) -> Result<(), RunnerError> {
        if self.prompt.is_empty() {
            return Err(RunnerError::Validation("prompt and images are both empty".to_string()));
        }
        if self.container_image.trim().is_empty() {
            return Err(RunnerError::Validation("container image is empty".to_string()));
        }
        Ok(())
    }
}

/// Outcome of `syncTask` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// Issues found; integration withheld unless the caller retries with
    /// `force`.
    Blocked(Vec<caic_core::SafetyIssue>),
    /// Safety check passed (or `force` was set) and the branch was pushed.
    Integrated,
}

/// Background task handles kept alive for the lifetime of a running task,
/// so `Runner` can join/abort them during cleanup (spec §9: "No back-pointer
/// from `Task` to `Runner`" — these handles live on the runner side only).
struct TaskHandles {
    ingress: Option<JoinHandle<()>>,
    cleanup: JoinHandle<()>,
}

/// Task factory and lifecycle coordinator (spec §4.2).
pub struct Runner<C: Clock = SystemClock> {
    config: Config,
    registry: Arc<RepositoryRegistry>,
    git: Arc<dyn GitDriver>,
    container: Arc<dyn ContainerDriver>,
    clock: C,
    /// Serializes branch allocation and container start across every task
    /// in every repo (spec §5).
    branch_mutex: Arc<AsyncMutex<()>>,
    tasks: RwLock<HashMap<TaskId, Arc<Task>>>,
    handles: parking_lot::Mutex<HashMap<TaskId, TaskHandles>>,
}

/// Summary row for `listTasks` (spec §6), active-first / id-desc ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub repo_id: RepoId,
    pub harness: Harness,
    pub model: String,
    pub state: TaskState,
    pub branch: Option<String>,
    pub created_at_ms: u64,
}

impl<C: Clock + 'static> Runner<C> {
    pub fn new(
        config: Config,
        registry: Arc<RepositoryRegistry>,
        git: Arc<dyn GitDriver>,
        container: Arc<dyn ContainerDriver>,
        clock: C,
    ) -> Self {
        Self {
            config,
            registry,
            git,
            container,
            clock,
            branch_mutex: Arc::new(AsyncMutex::new(())),
            tasks: RwLock::new(HashMap::new()),
            handles: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn get(&self, id: &TaskId) -> Option<Arc<Task>> {
        self.tasks.read().get(id).cloned()
    }

    /// Adds a task the adoption routine rebuilt from disk (spec §4.5),
    /// without running `start`'s branch/container/session provisioning.
    pub fn insert_adopted(&self, task: Arc<Task>) {
        self.tasks.write().insert(task.id().clone(), task);
    }

    /// Registers background handles for an adopted task whose relay
    /// reattached live (spec §4.5) — mirrors what `start` wires up for a
    /// freshly created task.
    pub fn insert_handles(&self, id: TaskId, ingress: Option<JoinHandle<()>>, cleanup: JoinHandle<()>) {
        self.handles.lock().insert(id, TaskHandles { ingress, cleanup });
    }

    /// `listTasks() -> TaskSummary[]`: "snapshot with active-first, id-desc
    /// ordering" (spec §6).
    pub fn list(&self) -> Vec<TaskSummary> {
        let mut rows: Vec<TaskSummary> = self
            .tasks
            .read()
            .values()
            .map(|t| TaskSummary {
                id: t.id().clone(),
                repo_id: t.identity.repo_id.clone(),
                harness: t.identity.harness,
                model: t.identity.model.clone(),
                state: t.state(),
                branch: t.branch(),
                created_at_ms: t.identity.created_at_ms,
            })
            .collect();
        rows.sort_by(|a, b| {
            let active_a = !a.state.is_terminal();
            let active_b = !b.state.is_terminal();
            active_b.cmp(&active_a).then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });
        rows
    }

    fn repo(&self, repo_id: &RepoId) -> Result<Repository, RunnerError> {
        self.registry.get(repo_id).ok_or_else(|| RunnerError::UnknownRepository(repo_id.clone()))
    }

    pub(crate) fn ssh_target(&self, container_name: &str) -> SshTarget {
        SshTarget {
            host: container_name.to_string(),
            port: self.config.ssh_port,
            user: self.config.ssh_user.clone(),
            identity_file: self.config.ssh_identity_file.clone(),
        }
    }

    /// Allocates the next free branch name under the branch mutex (spec
    /// invariant 4: "allocation uses `max(existing-seqnum)+1`"), retrying
    /// past collisions up to `branch_retry_bound` (spec §4.2 step 1).
    async fn allocate_branch(&self, repo: &Repository) -> Result<(String, u64), RunnerError> {
        self.git.fetch(&repo.path, &repo.integration_remote).await?;
        let base_ref = format!("{}/{}", repo.integration_remote, repo.base_branch);

        let mut seqnum = self.git.max_seqnum(&repo.path, &self.config.branch_prefix).await? + 1;
        for _ in 0..self.config.branch_retry_bound {
            let branch = format!("{}{}", self.config.branch_prefix, seqnum);
            match self.git.create_branch(&repo.path, &branch, &base_ref).await {
                Ok(()) => return Ok((branch, seqnum)),
                Err(_) => seqnum += 1,
            }
        }
        Err(RunnerError::BranchAllocationExhausted(self.config.branch_retry_bound))
    }

    /// `Start` (spec §4.2): branch allocation through session start. Returns
    /// the new task's id once it has reached `running`.
    pub async fn create_task(self: &Arc<Self>, params: CreateTaskParams) -> Result<TaskId, RunnerError> {
        params.validate()?;
        let repo = self.repo(&params.repo_id)?;

        let identity = TaskIdentity {
            id: TaskId::new(),
            repo_id: params.repo_id.clone(),
            harness: params.harness,
            model: params.model.clone(),
            prompt: params.prompt.clone(),
            created_at_ms: self.clock.epoch_ms(),
        };
        let task = Arc::new(Task::new(identity, None));
        task.set_subscriber_buffer(self.config.subscriber_buffer);
        let task_id = task.id().clone();
        self.tasks.write().insert(task_id.clone(), task.clone());

        match self.provision(&task, &repo, &params).await {
            Ok(()) => Ok(task_id),
            Err(err) => {
                tracing::error!(task_id = %task_id, %err, "task provisioning failed");
                task.force_state(TaskState::Failed);
                task.write_trailer(&LogTrailer::failed(err.to_string()));
                Err(err)
            }
        }
    }

    async fn provision(
        &self,
        task: &Arc<Task>,
        repo: &Repository,
        params: &CreateTaskParams,
    ) -> Result<(), RunnerError> {
        // Steps 1-3 are one serialized critical section (spec §5: the
        // branch mutex "serializes branch creation and container start
        // across all tasks so the working-tree checkout is deterministic").
        let _branch_guard = self.branch_mutex.lock().await;

        task.force_state(TaskState::Branching);
        let (branch, seqnum) = self.allocate_branch(repo).await?;
        task.set_branch(&branch, seqnum);

        task.force_state(TaskState::Provisioning);
        let spec = ContainerSpec {
            task_id: task.id().clone(),
            image: params.container_image.clone(),
            repo_path: repo.path.clone(),
            branch: branch.clone(),
        };
        self.container.create(&spec).await?;
        task.set_container_name(spec.container_name());
        self.container
            .deploy_file(
                &spec.container_name(),
                caic_relay::RELAY_DAEMON_CONTAINER_PATH,
                caic_relay::RELAY_DAEMON_SOURCE,
            )
            .await?;

        self.git.checkout(&repo.path, &repo.base_branch).await?;
        drop(_branch_guard);

        task.force_state(TaskState::Starting);
        let log_path =
            caic_storage::log_path(&self.config.log_dir, task.id(), &repo.path.display().to_string(), &branch);
        std::fs::create_dir_all(&self.config.log_dir).map_err(caic_storage::StorageError::Io)?;
        let header = LogHeader::new(
            task.id().clone(),
            task.identity.prompt.text.clone(),
            repo.path.display().to_string(),
            branch.clone(),
            params.harness.to_string(),
            params.model.clone(),
            chrono::Utc::now(),
        );
        let log = TaskLog::create(&log_path, &header)?;
        task.replace_log(log);

        let format = backend_for(params.harness);
        let argv = agent_argv(params.harness, &params.model);
        let target = self.ssh_target(&spec.container_name());
        let (writer, lines) = caic_relay::serve_attach(&target, &argv).await?;
        let session = Arc::new(Session::new(format, writer, lines));
        task.attach_session(session.clone());

        task.force_state(TaskState::Running);
        task.send(params.prompt.clone()).await?;

        let ingress = tokio::spawn(dispatch_loop(
            task.clone(),
            session,
            Arc::clone(&self.git),
            repo.path.clone(),
            repo.integration_remote.clone(),
            repo.base_branch.clone(),
            branch.clone(),
            self.config.max_turns,
        ));
        let cleanup = tokio::spawn(cleanup_task(
            task.clone(),
            Arc::clone(&self.container),
            Arc::clone(&self.git),
            repo.path.clone(),
            repo.integration_remote.clone(),
            repo.base_branch.clone(),
            branch,
            self.config.cleanup_grace(),
            self.config.backup_ref_prefix.clone(),
        ));
        self.handles.lock().insert(task.id().clone(), TaskHandles { ingress: Some(ingress), cleanup });

        Ok(())
    }

    /// `sendInput(id, Prompt)`: legal only when `waiting`/`asking` (spec §6).
    pub async fn send_input(&self, id: &TaskId, prompt: Prompt) -> Result<(), RunnerError> {
        let task = self.tasks.read().get(id).cloned().ok_or_else(|| RunnerError::UnknownTask(id.clone()))?;
        if !task.state().accepts_input() {
            return Err(RunnerError::Task(crate::error::TaskError::Terminal(id.clone())));
        }
        task.send(prompt).await.map_err(RunnerError::from)
    }

    /// `terminateTask(id)`: signals `Done()` (spec §6).
    pub fn terminate(&self, id: &TaskId) -> Result<(), RunnerError> {
        let task = self.tasks.read().get(id).cloned().ok_or_else(|| RunnerError::UnknownTask(id.clone()))?;
        task.terminate();
        Ok(())
    }

    /// `restartTask(id, Prompt)` (spec §4.2 `RestartSession`): legal only
    /// from `waiting`/`asking`.
    pub async fn restart_session(self: &Arc<Self>, id: &TaskId, prompt: Prompt) -> Result<(), RunnerError> {
        let task = self.tasks.read().get(id).cloned().ok_or_else(|| RunnerError::UnknownTask(id.clone()))?;
        let state = task.state();
        if !state.accepts_input() {
            return Err(RunnerError::NotRestartable(id.clone(), state));
        }
        let repo = self.repo(&task.identity.repo_id)?;
        let branch = task.branch().ok_or_else(|| RunnerError::UnknownTask(id.clone()))?;
        let container_name =
            task.container_name().ok_or_else(|| RunnerError::UnknownTask(id.clone()))?;

        if let Some(old) = task.current_session() {
            let _ = old.close().await;
        }
        if let Some(handles) = self.handles.lock().get_mut(id) {
            if let Some(ingress) = handles.ingress.take() {
                ingress.abort();
            }
        }

        task.clear_messages();

        let header = LogHeader::new(
            task.id().clone(),
            prompt.text.clone(),
            repo.path.display().to_string(),
            branch.clone(),
            task.identity.harness.to_string(),
            task.identity.model.clone(),
            chrono::Utc::now(),
        );
        task.write_segment_header(&header);

        let format = backend_for(task.identity.harness);
        let argv = agent_argv(task.identity.harness, &task.identity.model);
        let target = self.ssh_target(&container_name);
        let (writer, lines) = caic_relay::serve_attach(&target, &argv).await?;
        let session = Arc::new(Session::new(format, writer, lines));
        task.attach_session(session.clone());
        task.force_state(TaskState::Running);
        task.send(prompt).await?;

        let ingress = tokio::spawn(dispatch_loop(
            task.clone(),
            session,
            Arc::clone(&self.git),
            repo.path.clone(),
            repo.integration_remote.clone(),
            repo.base_branch.clone(),
            branch,
            self.config.max_turns,
        ));
        if let Some(handles) = self.handles.lock().get_mut(id) {
            handles.ingress = Some(ingress);
        }

        Ok(())
    }

    /// `syncTask(id, {force?})` (spec §4.2 "Safety check", §6).
    pub async fn sync_task(&self, id: &TaskId, force: bool) -> Result<SyncOutcome, RunnerError> {
        let task = self.tasks.read().get(id).cloned().ok_or_else(|| RunnerError::UnknownTask(id.clone()))?;
        let repo = self.repo(&task.identity.repo_id)?;
        let branch = task.branch().ok_or_else(|| RunnerError::UnknownTask(id.clone()))?;
        let base_ref = format!("{}/{}", repo.integration_remote, repo.base_branch);

        let diff_stat = self.git.numstat_diff(&repo.path, &base_ref, &branch).await?;
        let issues = safety::check(
            self.git.as_ref(),
            &repo.path,
            &base_ref,
            &branch,
            &diff_stat,
            self.config.large_binary_threshold_bytes,
        )
        .await?;

        if !issues.is_empty() && !force {
            return Ok(SyncOutcome::Blocked(issues));
        }

        let refspec = format!("{branch}:{branch}");
        self.git.push(&repo.path, &repo.integration_remote, &refspec).await?;
        Ok(SyncOutcome::Integrated)
    }

    /// Engine-wide graceful shutdown (spec §5 "Cancellation": "signal
    /// `Done()` on all running tasks, bounded-wait on cleanup"). Signals
    /// every task's termination latch, then waits for each task's cleanup
    /// (and, once cleanup has unblocked the relay connection, its ingress
    /// loop) to finish before returning.
    pub async fn shutdown(&self) {
        let ids: Vec<TaskId> = self.tasks.read().keys().cloned().collect();
        for id in &ids {
            if let Some(task) = self.tasks.read().get(id).cloned() {
                task.terminate();
            }
        }

        let drained: Vec<TaskHandles> = self.handles.lock().drain().map(|(_, v)| v).collect();
        for handles in drained {
            let _ = handles.cleanup.await;
            if let Some(ingress) = handles.ingress {
                let _ = ingress.await;
            }
        }
    }
}

/// Builds the argv the relay spawns the agent with (SPEC_FULL §4.3): a thin
/// per-harness mapping from harness tag to its CLI binary name. `pub(crate)`
/// so adoption can reuse it when it has to start a replacement agent
/// process for a task whose relay died (spec §4.5 step 4).
pub(crate) fn agent_argv(harness: Harness, model: &str) -> Vec<String> {
    let binary = match harness {
        Harness::Claude => "claude",
        Harness::Gemini => "gemini",
        Harness::CodexAppServer => "codex",
        Harness::CodexExec => "codex",
    };
    let mut argv = vec![binary.to_string()];
    match harness {
        Harness::CodexAppServer => argv.push("app-server".to_string()),
        Harness::CodexExec => {
            argv.push("exec".to_string());
            argv.push("--json".to_string());
        }
        _ => argv.push("--output-format=stream-json".to_string()),
    }
    argv.push("--model".to_string());
    argv.push(model.to_string());
    argv
}

/// Ingress reader + dispatch loop (spec §4.2 "Dispatch loop"): drains one
/// session's parsed lines into `Task::append`, synthesizing `DiffStat`
/// messages after mutating tool-results and after every `Result`.
///
/// `pub(crate)` so the adoption routine can wire the same loop onto a
/// session it reattaches rather than duplicating this logic.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn dispatch_loop(
    task: Arc<Task>,
    session: Arc<Session>,
    git: Arc<dyn GitDriver>,
    repo_dir: std::path::PathBuf,
    remote: String,
    base_branch: String,
    branch: String,
    max_turns: Option<u32>,
) {
    let base_ref = format!("{remote}/{base_branch}");
    loop {
        let Some(message) = session.recv().await else {
            tracing::info!(task_id = %task.id(), "relay connection ended");
            break;
        };

        if let Message::SystemInit { session_id, .. } = &message {
            session.record_session_id(session_id.clone());
        }

        let synthesize_diff = match &message {
            Message::User { parent_tool_use_id: Some(tool_use_id), .. } => {
                task.mutates_on_tool_result(tool_use_id)
            }
            Message::Result { .. } => true,
            _ => false,
        };
        let is_result = matches!(message, Message::Result { .. });

        task.append(message);

        if synthesize_diff {
            match git.numstat_diff(&repo_dir, &base_ref, &branch).await {
                Ok(stat) => task.append(Message::DiffStat { stat }),
                Err(err) => tracing::warn!(task_id = %task.id(), %err, "diff-stat synthesis failed"),
            }
        }
        if is_result {
            session.signal_result();
            // spec §4.2 "max-turns hit (→terminating)": the same latch
            // `terminateTask` uses, so cleanup proceeds identically either
            // way.
            if max_turns_reached(task.live_stats().turns, max_turns) {
                tracing::info!(task_id = %task.id(), ?max_turns, "max-turns reached, terminating");
                task.terminate();
            }
        }
    }
}

fn max_turns_reached(turns: u32, max_turns: Option<u32>) -> bool {
    max_turns.is_some_and(|limit| turns >= limit)
}

/// Cleanup waiter: blocks on the task's `Done()` latch, then runs the
/// terminate path (spec §4.2 "Cleanup").
#[allow(clippy::too_many_arguments)]
pub(crate) async fn cleanup_task(
    task: Arc<Task>,
    container: Arc<dyn ContainerDriver>,
    git: Arc<dyn GitDriver>,
    repo_dir: std::path::PathBuf,
    remote: String,
    base_branch: String,
    branch: String,
    grace: std::time::Duration,
    backup_ref_prefix: String,
) {
    task.done().cancelled().await;
    tracing::info!(task_id = %task.id(), "terminate requested, starting cleanup");
    // Spec §3 Lifecycles: "… → terminating → (terminated | failed)". Force
    // the transition here, before the grace wait, so a client watching
    // `listTasks`/`taskEvents` observes it instead of jumping straight from
    // `waiting`/`running` to a terminal state.
    task.force_state(TaskState::Terminating);

    if let Some(session) = task.current_session() {
        tokio::select! {
            () = session.await_result() => {}
            () = tokio::time::sleep(grace) => {
                tracing::warn!(task_id = %task.id(), "grace window elapsed waiting for final result");
            }
        }
        let _ = session.close().await;
    }

    let container_name = task.container_name();
    let final_state = match run_backup_check(
        &task,
        git.as_ref(),
        &repo_dir,
        &remote,
        &base_branch,
        &branch,
        &backup_ref_prefix,
    )
    .await
    {
        Ok(()) => TaskState::Terminated,
        Err(err) => {
            tracing::error!(task_id = %task.id(), %err, "backup/reachability check failed during cleanup");
            TaskState::Failed
        }
    };

    if let Some(name) = container_name {
        if let Err(err) = container.kill(&name).await {
            tracing::error!(task_id = %task.id(), %err, "failed to kill container during cleanup");
        }
    }

    let base_ref = format!("{remote}/{base_branch}");
    let diff_stat = git.numstat_diff(&repo_dir, &base_ref, &branch).await.unwrap_or_default();
    let stats = task.live_stats();
    let trailer = if final_state == TaskState::Terminated {
        LogTrailer::terminated(stats.usage, stats.duration_ms, stats.turns, diff_stat)
    } else {
        LogTrailer::failed("cleanup failed; see log for detail")
    };
    task.force_state(final_state);
    task.write_trailer(&trailer);
}

/// Spec invariant 8 / §4.2 cleanup step 3: "if that commit is NOT reachable
/// from the integration remote, create `caic-backup/<branch>` pointing to
/// it before the container is destroyed." Reachability must be checked
/// before container destruction; this function never kills the container.
#[allow(clippy::too_many_arguments)]
async fn run_backup_check(
    task: &Task,
    git: &dyn GitDriver,
    repo_dir: &std::path::Path,
    remote: &str,
    base_branch: &str,
    branch: &str,
    backup_ref_prefix: &str,
) -> Result<(), caic_runtime::RuntimeError> {
    let tip = git.rev_parse(repo_dir, branch).await?;
    let base_ref = format!("{remote}/{base_branch}");
    if !git.is_reachable(repo_dir, &tip, &base_ref).await? {
        let backup_ref = format!("refs/{backup_ref_prefix}{branch}");
        git.update_ref(repo_dir, &backup_ref, &tip).await?;
        tracing::info!(task_id = %task.id(), backup_ref = %backup_ref, "preserved unreachable branch tip");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use caic_core::{FakeClock, Prompt};
    use caic_runtime::{FakeContainerDriver, FakeGitDriver};

    fn test_config(dir: &std::path::Path) -> Config {
        let mut c = Config::default();
        c.log_dir = dir.to_path_buf();
        c
    }

    fn make_runner(dir: &std::path::Path) -> (Arc<Runner<FakeClock>>, RepoId, Arc<FakeGitDriver>, Arc<FakeContainerDriver>) {
        let registry = Arc::new(RepositoryRegistry::new());
        let repo_id = registry.register(dir.join("repo"), "main", "origin");
        let git = Arc::new(FakeGitDriver::new());
        let container = Arc::new(FakeContainerDriver::new());
        let runner = Arc::new(Runner::new(
            test_config(dir),
            registry,
            git.clone(),
            container.clone(),
            FakeClock::new(),
        ));
        (runner, repo_id, git, container)
    }

    #[test]
    fn list_orders_active_first_then_id_desc() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (runner, repo_id, _git, _container) = make_runner(dir.path());

        let identity_a = TaskIdentity {
            id: TaskId::from_string("tsk-aaaaaaaaaaaaaaaaaaaaaaa"),
            repo_id: repo_id.clone(),
            harness: Harness::Claude,
            model: "claude".to_string(),
            prompt: Prompt::text("a"),
            created_at_ms: 0,
        };
        let task_a = Arc::new(Task::new(identity_a, None));
        task_a.force_state(TaskState::Provisioning);
        task_a.force_state(TaskState::Starting);
        task_a.force_state(TaskState::Running);
        task_a.force_state(TaskState::Waiting);
        task_a.force_state(TaskState::Terminating);
        task_a.force_state(TaskState::Terminated);
        runner.insert_adopted(task_a);

        let identity_b = TaskIdentity {
            id: TaskId::from_string("tsk-bbbbbbbbbbbbbbbbbbbbbbb"),
            repo_id,
            harness: Harness::Claude,
            model: "claude".to_string(),
            prompt: Prompt::text("b"),
            created_at_ms: 0,
        };
        let task_b = Arc::new(Task::new(identity_b, None));
        runner.insert_adopted(task_b);

        let list = runner.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id.as_str(), "tsk-bbbbbbbbbbbbbbbbbbbbbbb");
        assert_eq!(list[0].state, TaskState::Branching);
        assert_eq!(list[1].state, TaskState::Terminated);
    }

    #[tokio::test]
    async fn create_task_rejects_unknown_repo() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (runner, _repo_id, _git, _container) = make_runner(dir.path());
        let params = CreateTaskParams {
            repo_id: RepoId::new(),
            harness: Harness::Claude,
            model: "claude".to_string(),
            prompt: Prompt::text("do it"),
            container_image: "caic-agent:latest".to_string(),
        };
        let err = runner.create_task(params).await.unwrap_err();
        assert!(matches!(err, RunnerError::UnknownRepository(_)));
    }

    #[tokio::test]
    async fn create_task_rejects_empty_prompt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (runner, repo_id, _git, _container) = make_runner(dir.path());
        let params = CreateTaskParams {
            repo_id,
            harness: Harness::Claude,
            model: "claude".to_string(),
            prompt: Prompt::default(),
            container_image: "caic-agent:latest".to_string(),
        };
        let err = runner.create_task(params).await.unwrap_err();
        assert!(matches!(err, RunnerError::Validation(_)));
    }

    #[tokio::test]
    async fn restart_rejects_from_non_waiting_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (runner, repo_id, _git, _container) = make_runner(dir.path());
        let identity = TaskIdentity {
            id: TaskId::new(),
            repo_id,
            harness: Harness::Claude,
            model: "claude".to_string(),
            prompt: Prompt::text("a"),
            created_at_ms: 0,
        };
        let task = Arc::new(Task::new(identity, None));
        let id = task.id().clone();
        runner.insert_adopted(task);

        let err = runner.restart_session(&id, Prompt::text("again")).await.unwrap_err();
        assert!(matches!(err, RunnerError::NotRestartable(_, TaskState::Branching)));
    }

    #[test]
    fn max_turns_reached_respects_unlimited_and_boundary() {
        assert!(!max_turns_reached(3, None));
        assert!(!max_turns_reached(3, Some(4)));
        assert!(max_turns_reached(4, Some(4)));
        assert!(max_turns_reached(5, Some(4)));
    }

    fn waiting_task(repo_id: RepoId, branch: &str) -> Arc<Task> {
        let identity = TaskIdentity {
            id: TaskId::new(),
            repo_id,
            harness: Harness::Claude,
            model: "claude".to_string(),
            prompt: Prompt::text("a"),
            created_at_ms: 0,
        };
        let task = Arc::new(Task::new(identity, None));
        task.force_state(TaskState::Provisioning);
        task.force_state(TaskState::Starting);
        task.force_state(TaskState::Running);
        task.force_state(TaskState::Waiting);
        task.set_branch(branch, 1);
        task
    }

    /// Spec §3 Lifecycles / §4.2 Cleanup: `terminateTask` must be observed
    /// passing through `terminating` on its way to `terminated`, not jump
    /// straight there.
    #[tokio::test]
    async fn cleanup_task_passes_through_terminating_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_runner, repo_id, git, container) = make_runner(dir.path());
        let task = waiting_task(repo_id, "caic/w1");
        task.terminate();

        cleanup_task(
            task.clone(),
            container.clone(),
            git.clone(),
            dir.path().to_path_buf(),
            "origin".to_string(),
            "main".to_string(),
            "caic/w1".to_string(),
            std::time::Duration::from_millis(10),
            "caic-backup/".to_string(),
        )
        .await;

        assert_eq!(task.state(), TaskState::Terminated);
    }

    /// `Config::backup_ref_prefix` must actually drive the ref name a
    /// config-less prior revision hardcoded (spec SPEC_FULL §3.1).
    #[tokio::test]
    async fn cleanup_task_honors_configured_backup_ref_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_runner, repo_id, git, container) = make_runner(dir.path());
        git.set_reachable(false);
        git.set_rev_parse_result("abc123");
        let task = waiting_task(repo_id, "caic/w1");
        task.terminate();

        cleanup_task(
            task.clone(),
            container.clone(),
            git.clone(),
            dir.path().to_path_buf(),
            "origin".to_string(),
            "main".to_string(),
            "caic/w1".to_string(),
            std::time::Duration::from_millis(10),
            "custom-backup/".to_string(),
        )
        .await;

        assert_eq!(git.updated_ref("refs/custom-backup/caic/w1"), Some("abc123".to_string()));
    }
}
