// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `Api`: the facade spec.md's named operations are driven through (SPEC_FULL
//! §6 "a plain async trait / struct with methods — not an HTTP server").
//!
//! This is the seam a CLI or a future HTTP layer drives directly; it owns no
//! transport of its own and simply forwards to [`Runner`] and
//! [`RepositoryRegistry`].

use std::path::PathBuf;
use std::sync::Arc;

use caic_core::{Clock, Message, Prompt, RepoId, TaskId};

use crate::repository::{RepositoryRegistry, RepositorySummary};
use crate::runner::{CreateTaskParams, Runner, SyncOutcome, TaskSummary};

/// Live event stream returned by `taskEvents` (spec §6 `Subscribe`): a
/// point-in-time replay followed by the live tail, stitched without gaps.
pub struct TaskEvents {
    pub replay: Vec<Message>,
    pub receiver: tokio::sync::mpsc::Receiver<Message>,
}

pub struct Api<C: Clock + 'static> {
    runner: Arc<Runner<C>>,
    registry: Arc<RepositoryRegistry>,
}

impl<C: Clock + 'static> Api<C> {
    pub fn new(runner: Arc<Runner<C>>, registry: Arc<RepositoryRegistry>) -> Self {
        Self { runner, registry }
    }

    pub fn list_tasks(&self) -> Vec<TaskSummary> {
        self.runner.list()
    }

    pub async fn create_task(&self, params: CreateTaskParams) -> Result<TaskId, crate::error::RunnerError> {
        self.runner.create_task(params).await
    }

    /// `taskEvents(id)` (spec §6 `Subscribe`): snapshot-plus-live-stream,
    /// same contract as `Task::subscribe`.
    pub fn task_events(&self, id: &TaskId) -> Result<TaskEvents, crate::error::RunnerError> {
        let task = self.runner.get(id).ok_or_else(|| crate::error::RunnerError::UnknownTask(id.clone()))?;
        let subscription = task.subscribe();
        Ok(TaskEvents { replay: subscription.replay, receiver: subscription.receiver })
    }

    pub async fn send_input(&self, id: &TaskId, prompt: Prompt) -> Result<(), crate::error::RunnerError> {
        self.runner.send_input(id, prompt).await
    }

    pub async fn sync_task(&self, id: &TaskId, force: bool) -> Result<SyncOutcome, crate::error::RunnerError> {
        self.runner.sync_task(id, force).await
    }

    pub fn terminate_task(&self, id: &TaskId) -> Result<(), crate::error::RunnerError> {
        self.runner.terminate(id)
    }

    pub async fn restart_task(
        self: &Arc<Self>,
        id: &TaskId,
        prompt: Prompt,
    ) -> Result<(), crate::error::RunnerError> {
        self.runner.restart_session(id, prompt).await
    }

    pub fn list_repositories(&self) -> Vec<RepositorySummary> {
        self.registry.list()
    }

    /// Resolves a working-tree path (as given to `--repo` / `createTask`)
    /// to the `RepoId` it was registered under. `createTask` is reachable
    /// through a client that only ever knows a repo by path — the
    /// registry mints a fresh `RepoId` on every `register_repository`
    /// call, so nothing durable names one ahead of time (SPEC_FULL §6).
    pub fn resolve_repository_path(
        &self,
        path: &std::path::Path,
    ) -> Result<RepoId, crate::error::RunnerError> {
        self.registry
            .find_by_path(path)
            .map(|repo| repo.id)
            .ok_or_else(|| crate::error::RunnerError::UnknownRepositoryPath(path.to_path_buf()))
    }

    /// Added for completeness, not a spec.md feature (SPEC_FULL §6):
    /// `createTask` needs an already-registered repo and spec.md never says
    /// how one gets registered.
    pub fn register_repository(
        &self,
        path: impl Into<PathBuf>,
        base_branch: impl Into<String>,
        integration_remote: impl Into<String>,
    ) -> RepoId {
        self.registry.register(path, base_branch, integration_remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caic_core::{Config, FakeClock};
    use caic_runtime::{FakeContainerDriver, FakeGitDriver};

    fn make_api(dir: &std::path::Path) -> (Arc<Api<FakeClock>>, RepoId) {
        let registry = Arc::new(RepositoryRegistry::new());
        let repo_id = registry.register(dir.join("repo"), "main", "origin");
        let git = Arc::new(FakeGitDriver::new());
        let container = Arc::new(FakeContainerDriver::new());
        let mut config = Config::default();
        config.log_dir = dir.to_path_buf();
        let runner = Arc::new(Runner::new(config, registry.clone(), git, container, FakeClock::new()));
        (Arc::new(Api::new(runner, registry)), repo_id)
    }

    #[test]
    fn list_tasks_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (api, _repo_id) = make_api(dir.path());
        assert!(api.list_tasks().is_empty());
    }

    #[test]
    fn list_repositories_reflects_registration() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (api, repo_id) = make_api(dir.path());
        let repos = api.list_repositories();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].id, repo_id);
    }

    #[test]
    fn register_repository_adds_a_new_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (api, _repo_id) = make_api(dir.path());
        api.register_repository(dir.join("other"), "main", "origin");
        assert_eq!(api.list_repositories().len(), 2);
    }

    #[tokio::test]
    async fn create_task_rejects_unknown_repo() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (api, _repo_id) = make_api(dir.path());
        let params = CreateTaskParams {
            repo_id: RepoId::new(),
            harness: caic_wire::Harness::Claude,
            model: "claude".to_string(),
            prompt: Prompt::text("do it"),
            container_image: "caic-agent:latest".to_string(),
        };
        let err = api.create_task(params).await.unwrap_err();
        assert!(matches!(err, crate::error::RunnerError::UnknownRepository(_)));
    }

    #[test]
    fn resolve_repository_path_finds_a_registered_repo() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (api, repo_id) = make_api(dir.path());
        let resolved = api.resolve_repository_path(&dir.path().join("repo")).expect("resolved");
        assert_eq!(resolved, repo_id);
    }

    #[test]
    fn resolve_repository_path_rejects_unregistered_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (api, _repo_id) = make_api(dir.path());
        let err = api.resolve_repository_path(&dir.path().join("not-registered")).unwrap_err();
        assert!(matches!(err, crate::error::RunnerError::UnknownRepositoryPath(_)));
    }

    #[test]
    fn task_events_rejects_unknown_task() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (api, _repo_id) = make_api(dir.path());
        let err = api.task_events(&TaskId::new()).unwrap_err();
        assert!(matches!(err, crate::error::RunnerError::UnknownTask(_)));
    }
}
