// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-recovery: rebuilding in-memory [`Task`]s from disk logs and
//! whatever containers are still running (spec §4.5 "Adoption").
//!
//! Runs once at daemon startup, before any client request is served. For
//! every log file under the configured log directory:
//!
//! 1. A trailer present means the task already reached a terminal state;
//!    materialize it as `Terminated`/`Failed` with no live session.
//! 2. No trailer and no matching container: the task died mid-flight with
//!    nothing left to attach to; mark `Failed`.
//! 3. No trailer, container present and its relay daemon alive: read the
//!    container's `output.jsonl` in full, re-parse it through the task's
//!    own harness backend, and reattach a live session at the offset the
//!    file ends at.
//! 4. No trailer, container present but relay not running: replay the
//!    task's own on-disk log and leave it `waiting` for an explicit
//!    `sendInput`/`restartTask` to bring it back.

use std::sync::Arc;

use caic_core::{Message, TaskState};
use caic_relay::{attach_offset, Session, SshTarget};
use caic_runtime::{ContainerDriver, GitDriver};
use caic_storage::{LogHeader, TaskLog};
use caic_wire::backend_for;

use crate::repository::{Repository, RepositoryRegistry};
use crate::runner::{agent_argv, cleanup_task, dispatch_loop, Runner};
use crate::task::{Task, TaskIdentity};

/// One log file's adoption result, for the daemon's startup log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdoptedAs {
    Terminal,
    FailedNoContainer,
    ReattachedLive,
    ReplayedDead,
}

/// Config knobs adoption needs that aren't already on [`Runner`]: the SSH
/// coordinates to reach a container's relay daemon.
pub struct AdoptionContext {
    pub ssh_user: String,
    pub ssh_port: u16,
    pub ssh_identity_file: Option<std::path::PathBuf>,
}

/// Scans `log_dir` and rebuilds every non-terminal task into `runner`
/// (spec §4.5). Returns one `(TaskId, AdoptedAs)` per log file found.
pub async fn adopt<C: caic_core::Clock + 'static>(
    runner: &Arc<Runner<C>>,
    registry: &RepositoryRegistry,
    container: &Arc<dyn ContainerDriver>,
    git: &Arc<dyn GitDriver>,
    ctx: &AdoptionContext,
    log_dir: &std::path::Path,
) -> Result<Vec<(caic_core::TaskId, AdoptedAs)>, crate::error::RunnerError> {
    let mut results = Vec::new();

    for (path, header) in caic_storage::list_headers(log_dir)? {
        let replayed = caic_storage::replay(&path)?;
        let (task, outcome, reattach) = adopt_one(container, git, ctx, registry, &path, header, replayed).await?;
        results.push((task.identity.id.clone(), outcome));
        task.set_subscriber_buffer(runner.config().subscriber_buffer);
        runner.insert_adopted(task.clone());

        if let Some((session, repo)) = reattach {
            task.attach_session(session.clone());
            let ingress = tokio::spawn(dispatch_loop(
                task.clone(),
                session,
                Arc::clone(git),
                repo.path.clone(),
                repo.integration_remote.clone(),
                repo.base_branch.clone(),
                task.branch().unwrap_or_default(),
                runner.config().max_turns,
            ));
            let cleanup = tokio::spawn(cleanup_task(
                task.clone(),
                Arc::clone(container),
                Arc::clone(git),
                repo.path,
                repo.integration_remote,
                repo.base_branch,
                task.branch().unwrap_or_default(),
                runner.config().cleanup_grace(),
                runner.config().backup_ref_prefix.clone(),
            ));
            runner.insert_handles(task.identity.id.clone(), Some(ingress), cleanup);
        }
    }

    Ok(results)
}

type AdoptOneResult = (Arc<Task>, AdoptedAs, Option<(Arc<Session>, Repository)>);

async fn adopt_one(
    container: &Arc<dyn ContainerDriver>,
    git: &Arc<dyn GitDriver>,
    ctx: &AdoptionContext,
    registry: &RepositoryRegistry,
    log_path: &std::path::Path,
    header: LogHeader,
    replayed: caic_storage::ReplayedLog,
) -> Result<AdoptOneResult, crate::error::RunnerError> {
    let harness: caic_wire::Harness = header.harness.parse().map_err(|_| {
        crate::error::RunnerError::Validation(format!("unknown harness tag in log header: {}", header.harness))
    })?;

    // The log header only records the repo's working-tree path; the daemon
    // must have registered that repository before adoption runs, or this
    // task's repo-scoped operations (diff-stat synthesis, sync) have
    // nothing to resolve against and it is re-registered as a bare
    // placeholder (base branch `main`, remote `origin`) so adoption never
    // fails outright over a missing registration.
    let repo_path = std::path::PathBuf::from(&header.repo);
    let repo = registry
        .find_by_path(&repo_path)
        .unwrap_or_else(|| Repository {
            id: registry.register(repo_path.clone(), "main", "origin"),
            path: repo_path,
            base_branch: "main".to_string(),
            integration_remote: "origin".to_string(),
        });

    let identity = TaskIdentity {
        id: header.task_id.clone(),
        repo_id: repo.id.clone(),
        harness,
        model: header.model.clone(),
        prompt: caic_core::Prompt::text(header.prompt.clone()),
        created_at_ms: header.started_at.timestamp_millis().max(0) as u64,
    };

    if let Some(trailer) = replayed.trailer {
        let log = TaskLog::open_append(log_path)?;
        let task = Arc::new(Task::new(identity, Some(log)));
        task.restore_messages(replayed.messages);
        task.set_branch(&header.branch, 0);
        let final_state = if trailer.state == TaskState::Terminated {
            TaskState::Terminated
        } else {
            TaskState::Failed
        };
        advance_to(&task, final_state);
        tracing::info!(task_id = %task.identity.id, "adopted terminal task from log trailer");
        return Ok((task, AdoptedAs::Terminal, None));
    }

    let container_name = format!("caic-{}", header.task_id.as_str());
    let info = container.inspect(&container_name).await?;

    let Some(info) = info.filter(|i| i.running) else {
        let log = TaskLog::open_append(log_path)?;
        let task = Arc::new(Task::new(identity, Some(log)));
        task.set_branch(&header.branch, 0);
        task.restore_messages(replayed.messages);
        advance_to(&task, TaskState::Failed);
        task.write_trailer(&caic_storage::LogTrailer::failed("container not found during adoption"));
        tracing::warn!(task_id = %task.identity.id, "adopted task has no running container; marked failed");
        return Ok((task, AdoptedAs::FailedNoContainer, None));
    };
    let _ = info;

    // Relay liveness has no dedicated RPC in the container driver; a
    // running container is treated as a proxy for "relay alive" (see
    // DESIGN.md for this simplification).
    match container.read_file(&container_name, caic_relay::RELAY_OUTPUT_CONTAINER_PATH).await {
        Ok(output) => {
            let log = TaskLog::open_append(log_path)?;
            let task = Arc::new(Task::new(identity, Some(log)));
            task.set_branch(&header.branch, 0);
            task.set_container_name(container_name.clone());

            let format = backend_for(harness);
            let messages: Vec<Message> = output.lines().map(|line| format.parse_line(line)).collect();
            task.restore_messages(messages);
            // A live relay is about to be reattached below, so this task
            // resumes straight into `Running` rather than parking in
            // `waiting` the way the dead-relay branches below do.
            advance_to(&task, TaskState::Running);

            let resume_header = LogHeader::new(
                header.task_id.clone(),
                header.prompt.clone(),
                header.repo.clone(),
                header.branch.clone(),
                header.harness.clone(),
                header.model.clone(),
                chrono::Utc::now(),
            );
            task.write_segment_header(&resume_header);

            let target = SshTarget {
                host: container_name.clone(),
                port: ctx.ssh_port,
                user: ctx.ssh_user.clone(),
                identity_file: ctx.ssh_identity_file.clone(),
            };
            // `attach --offset N` seeks `output.jsonl` as raw bytes (spec
            // §4.5 step 4: "AttachRelay(offset=size)"), so the offset must
            // be the byte length just read, not the number of messages it
            // parsed into.
            let offset = output.len() as u64;
            let (writer, lines) = attach_offset(&target, offset).await?;
            let session = Arc::new(Session::new(format, writer, lines));
            task.set_relay_offset(offset);

            tracing::info!(task_id = %task.identity.id, "reattached live relay during adoption");
            Ok((task, AdoptedAs::ReattachedLive, Some((session, repo))))
        }
        Err(err) => {
            tracing::warn!(task_id = %header.task_id, %err, "container present but relay unreachable; restarting agent session");
            let log = TaskLog::open_append(log_path)?;
            let task = Arc::new(Task::new(identity, Some(log)));
            task.set_branch(&header.branch, 0);
            task.set_container_name(container_name.clone());
            task.restore_messages(replayed.messages);
            advance_to_from_waiting(&task);

            // spec §4.5 step 4 "If dead: start a fresh agent session in the
            // same container via the backend's resume semantics (using the
            // captured SessionID)". The client's next `sendInput`/
            // `restartTask` prompt is what actually gets encoded and sent;
            // here we only need the relay (and, if it crashed along with
            // the agent, the agent itself) running again, with the
            // recovered session id primed on the new `Session` so that
            // first encode carries `resume_session_id`.
            let resume_session_id = task.session_id();
            let resume_header = LogHeader::new(
                header.task_id.clone(),
                header.prompt.clone(),
                header.repo.clone(),
                header.branch.clone(),
                header.harness.clone(),
                header.model.clone(),
                chrono::Utc::now(),
            );
            task.write_segment_header(&resume_header);

            let target = SshTarget {
                host: container_name.clone(),
                port: ctx.ssh_port,
                user: ctx.ssh_user.clone(),
                identity_file: ctx.ssh_identity_file.clone(),
            };
            let argv = agent_argv(harness, &header.model);
            if let Err(err) = container
                .deploy_file(&container_name, caic_relay::RELAY_DAEMON_CONTAINER_PATH, caic_relay::RELAY_DAEMON_SOURCE)
                .await
            {
                tracing::warn!(task_id = %task.identity.id, %err, "failed to redeploy relay daemon during adoption");
            }

            match caic_relay::serve_attach(&target, &argv).await {
                Ok((writer, lines)) => {
                    let format = backend_for(harness);
                    let session = Arc::new(Session::new(format, writer, lines));
                    if let Some(session_id) = resume_session_id {
                        session.record_session_id(session_id);
                    }
                    tracing::info!(
                        task_id = %task.identity.id,
                        "started replacement agent session for dead relay, awaiting client prompt to resume"
                    );
                    Ok((task, AdoptedAs::ReplayedDead, Some((session, repo))))
                }
                Err(spawn_err) => {
                    tracing::warn!(
                        task_id = %task.identity.id,
                        %spawn_err,
                        "failed to start replacement agent session; parked with no live session"
                    );
                    Ok((task, AdoptedAs::ReplayedDead, None))
                }
            }
        }
    }
}

/// `force_state` only moves a task forward; adoption needs to land exactly
/// on the target state regardless of what `restore_messages` derived, so
/// this walks through every intermediate rank first.
fn advance_to(task: &Task, target: TaskState) {
    for step in
        [TaskState::Branching, TaskState::Provisioning, TaskState::Starting, TaskState::Running, target]
    {
        task.force_state(step);
    }
}

/// A container whose relay is gone can't keep streaming, so a task that
/// `restore_messages` parked in `Running` is corrected down to `waiting`
/// (spec §4.5: an adopted task with no live relay "is waiting" for a
/// client to drive it forward).
fn advance_to_from_waiting(task: &Task) {
    advance_to(task, TaskState::Waiting);
}

#[cfg(test)]
mod tests {
    use super::*;
    use caic_core::{FakeClock, Prompt};
    use caic_runtime::{FakeContainerDriver, FakeGitDriver};

    fn make_runner(
        dir: &std::path::Path,
    ) -> (Arc<Runner<FakeClock>>, Arc<FakeContainerDriver>, Arc<dyn ContainerDriver>, Arc<dyn GitDriver>) {
        let registry = Arc::new(RepositoryRegistry::new());
        let fake_container = Arc::new(FakeContainerDriver::new());
        let container: Arc<dyn ContainerDriver> = fake_container.clone();
        let git: Arc<dyn GitDriver> = Arc::new(FakeGitDriver::new());
        let mut config = caic_core::Config::default();
        config.log_dir = dir.to_path_buf();
        let runner =
            Arc::new(Runner::new(config, registry, git.clone(), container.clone(), FakeClock::new()));
        (runner, fake_container, container, git)
    }

    fn write_log(
        dir: &std::path::Path,
        task_id: &caic_core::TaskId,
        branch: &str,
        with_trailer: bool,
    ) -> std::path::PathBuf {
        let header = LogHeader::new(
            task_id.clone(),
            "do the thing",
            "/repos/demo",
            branch,
            "claude",
            "claude-opus-4",
            chrono::Utc::now(),
        );
        let path = caic_storage::log_path(dir, task_id, "/repos/demo", branch);
        let mut log = TaskLog::create(&path, &header).expect("create log");
        log.append(&Message::SystemInit {
            session_id: "sess-1".to_string(),
            model: "claude-opus-4".to_string(),
            version: None,
            tools: vec![],
            cwd: "/repo".into(),
        })
        .expect("append");
        if with_trailer {
            log.write_trailer(&caic_storage::LogTrailer::terminated(
                caic_core::Usage::default(),
                1000,
                1,
                caic_core::DiffStat::default(),
            ))
            .expect("trailer");
        }
        path
    }

    fn adoption_ctx() -> AdoptionContext {
        AdoptionContext { ssh_user: "root".to_string(), ssh_port: 22, ssh_identity_file: None }
    }

    #[tokio::test]
    async fn terminal_log_adopts_without_touching_containers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (runner, _fake_container, container, git) = make_runner(dir.path());
        let task_id = caic_core::TaskId::new();
        write_log(dir.path(), &task_id, "caic/w1", true);

        let results = adopt(&runner, &RepositoryRegistry::new(), &container, &git, &adoption_ctx(), dir.path())
            .await
            .expect("adopt");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, AdoptedAs::Terminal);
        let task = runner.get(&task_id).expect("task present");
        assert_eq!(task.state(), TaskState::Terminated);
    }

    #[tokio::test]
    async fn missing_container_marks_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (runner, _fake_container, container, git) = make_runner(dir.path());
        let task_id = caic_core::TaskId::new();
        write_log(dir.path(), &task_id, "caic/w2", false);

        let results = adopt(&runner, &RepositoryRegistry::new(), &container, &git, &adoption_ctx(), dir.path())
            .await
            .expect("adopt");

        assert_eq!(results[0].1, AdoptedAs::FailedNoContainer);
        let task = runner.get(&task_id).expect("task present");
        assert_eq!(task.state(), TaskState::Failed);
    }

    #[tokio::test]
    async fn running_container_with_no_relay_output_replays_own_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (runner, fake_container, container, git) = make_runner(dir.path());
        let task_id = caic_core::TaskId::new();
        write_log(dir.path(), &task_id, "caic/w3", false);

        let spec = caic_runtime::ContainerSpec {
            task_id: task_id.clone(),
            image: "caic-agent:latest".to_string(),
            repo_path: "/repos/demo".into(),
            branch: "caic/w3".to_string(),
        };
        fake_container.create(&spec).await.expect("create container");

        let results = adopt(&runner, &RepositoryRegistry::new(), &container, &git, &adoption_ctx(), dir.path())
            .await
            .expect("adopt");

        assert_eq!(results[0].1, AdoptedAs::ReplayedDead);
        let task = runner.get(&task_id).expect("task present");
        assert_eq!(task.state(), TaskState::Waiting);
        assert!(task.history_len() >= 1);
    }
}
