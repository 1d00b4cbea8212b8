// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`ContainerDriver`]/[`GitDriver`] for engine/runner tests,
//! gated behind `test-support` the same way `caic-core`'s builders are.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use caic_core::{DiffStat, TaskId};
use parking_lot::Mutex;

use crate::container::{ContainerDriver, ContainerInfo, ContainerSpec};
use crate::error::RuntimeError;
use crate::git::GitDriver;

#[derive(Default)]
pub struct FakeContainerDriver {
    containers: Mutex<HashMap<String, ContainerInfo>>,
    fail_create: Mutex<bool>,
    deployed_files: Mutex<HashMap<String, String>>,
}

impl FakeContainerDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_create(&self, fail: bool) {
        *self.fail_create.lock() = fail;
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.containers.lock().get(name).is_some_and(|c| c.running)
    }

    pub fn deployed_file(&self, name: &str, dest_path: &str) -> Option<String> {
        self.deployed_files.lock().get(&format!("{name}:{dest_path}")).cloned()
    }
}

#[async_trait]
impl ContainerDriver for FakeContainerDriver {
    async fn create(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        if *self.fail_create.lock() {
            return Err(RuntimeError::CommandFailed {
                binary: "md",
                args: "create".to_string(),
                stderr: "fake failure".to_string(),
            });
        }
        let name = spec.container_name();
        self.containers.lock().insert(
            name.clone(),
            ContainerInfo { name, task_id: Some(spec.task_id.clone()), running: true },
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
        Ok(self.containers.lock().values().cloned().collect())
    }

    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        Ok(self.containers.lock().get(name).cloned())
    }

    async fn kill(&self, name: &str) -> Result<(), RuntimeError> {
        if let Some(c) = self.containers.lock().get_mut(name) {
            c.running = false;
        }
        Ok(())
    }

    async fn deploy_file(
        &self,
        name: &str,
        dest_path: &str,
        contents: &str,
    ) -> Result<(), RuntimeError> {
        self.deployed_files.lock().insert(format!("{name}:{dest_path}"), contents.to_string());
        Ok(())
    }

    async fn read_file(&self, name: &str, src_path: &str) -> Result<String, RuntimeError> {
        self.deployed_files
            .lock()
            .get(&format!("{name}:{src_path}"))
            .cloned()
            .ok_or_else(|| RuntimeError::CommandFailed {
                binary: "md",
                args: format!("cp {name}:{src_path} -"),
                stderr: "no such file".to_string(),
            })
    }
}

#[cfg(any(test, feature = "test-support"))]
impl FakeContainerDriver {
    /// Seeds a file as if it had been written inside the container, for
    /// adoption tests that read back a relay's `output.jsonl` without a
    /// prior `deploy_file` call.
    pub fn seed_file(&self, name: &str, path: &str, contents: impl Into<String>) {
        self.deployed_files.lock().insert(format!("{name}:{path}"), contents.into());
    }
}

/// In-memory [`GitDriver`] for runner/safety-check tests: every method
/// reads from or mutates a canned value rather than touching a real
/// working tree.
#[derive(Default)]
pub struct FakeGitDriver {
    max_seqnum: Mutex<u64>,
    branches_created: Mutex<Vec<(String, String)>>,
    branches_deleted: Mutex<Vec<String>>,
    fetch_calls: Mutex<u32>,
    pushed_refspecs: Mutex<Vec<(String, String)>>,
    numstat: Mutex<DiffStat>,
    reachable: Mutex<bool>,
    rev_parse_result: Mutex<String>,
    updated_refs: Mutex<HashMap<String, String>>,
    blob_sizes: Mutex<HashMap<String, u64>>,
    added_lines_result: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl FakeGitDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_max_seqnum(&self, n: u64) {
        *self.max_seqnum.lock() = n;
    }

    pub fn set_numstat(&self, stat: DiffStat) {
        *self.numstat.lock() = stat;
    }

    pub fn set_reachable(&self, reachable: bool) {
        *self.reachable.lock() = reachable;
    }

    pub fn set_rev_parse_result(&self, value: impl Into<String>) {
        *self.rev_parse_result.lock() = value.into();
    }

    pub fn set_blob_size(&self, path: impl Into<String>, size: u64) {
        self.blob_sizes.lock().insert(path.into(), size);
    }

    pub fn set_added_lines(&self, lines: Vec<(PathBuf, Vec<String>)>) {
        *self.added_lines_result.lock() = lines;
    }

    pub fn branches_created(&self) -> Vec<(String, String)> {
        self.branches_created.lock().clone()
    }

    pub fn branches_deleted(&self) -> Vec<String> {
        self.branches_deleted.lock().clone()
    }

    pub fn fetch_calls(&self) -> u32 {
        *self.fetch_calls.lock()
    }

    pub fn pushed_refspecs(&self) -> Vec<(String, String)> {
        self.pushed_refspecs.lock().clone()
    }

    pub fn updated_ref(&self, name: &str) -> Option<String> {
        self.updated_refs.lock().get(name).cloned()
    }
}

#[async_trait]
impl GitDriver for FakeGitDriver {
    async fn fetch(&self, _repo_dir: &Path, _remote: &str) -> Result<(), RuntimeError> {
        *self.fetch_calls.lock() += 1;
        Ok(())
    }

    async fn push(&self, _repo_dir: &Path, remote: &str, refspec: &str) -> Result<(), RuntimeError> {
        self.pushed_refspecs.lock().push((remote.to_string(), refspec.to_string()));
        Ok(())
    }

    async fn create_branch(
        &self,
        _repo_dir: &Path,
        branch: &str,
        base_ref: &str,
    ) -> Result<(), RuntimeError> {
        self.branches_created.lock().push((branch.to_string(), base_ref.to_string()));
        Ok(())
    }

    async fn delete_branch(&self, _repo_dir: &Path, branch: &str) -> Result<(), RuntimeError> {
        self.branches_deleted.lock().push(branch.to_string());
        Ok(())
    }

    async fn checkout(&self, _repo_dir: &Path, _branch: &str) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn max_seqnum(&self, _repo_dir: &Path, _prefix: &str) -> Result<u64, RuntimeError> {
        Ok(*self.max_seqnum.lock())
    }

    async fn numstat_diff(
        &self,
        _repo_dir: &Path,
        _base_ref: &str,
        _head_ref: &str,
    ) -> Result<DiffStat, RuntimeError> {
        Ok(self.numstat.lock().clone())
    }

    async fn is_reachable(
        &self,
        _repo_dir: &Path,
        _commit: &str,
        _remote_ref: &str,
    ) -> Result<bool, RuntimeError> {
        Ok(*self.reachable.lock())
    }

    async fn rev_parse(&self, _repo_dir: &Path, _reference: &str) -> Result<String, RuntimeError> {
        Ok(self.rev_parse_result.lock().clone())
    }

    async fn update_ref(
        &self,
        _repo_dir: &Path,
        ref_name: &str,
        commit: &str,
    ) -> Result<(), RuntimeError> {
        self.updated_refs.lock().insert(ref_name.to_string(), commit.to_string());
        Ok(())
    }

    async fn blob_size(&self, _repo_dir: &Path, _rev: &str, path: &str) -> Result<u64, RuntimeError> {
        Ok(self.blob_sizes.lock().get(path).copied().unwrap_or(0))
    }

    async fn added_lines(
        &self,
        _repo_dir: &Path,
        _base_ref: &str,
        _head_ref: &str,
    ) -> Result<Vec<(PathBuf, Vec<String>)>, RuntimeError> {
        Ok(self.added_lines_result.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_inspect_round_trips() {
        let driver = FakeContainerDriver::new();
        let spec = ContainerSpec {
            task_id: TaskId::from_string("tsk-1"),
            image: "img".to_string(),
            repo_path: "/repo".into(),
            branch: "caic/w1".to_string(),
        };
        driver.create(&spec).await.expect("create");
        let info = driver.inspect(&spec.container_name()).await.expect("inspect");
        assert!(info.expect("present").running);
    }

    #[tokio::test]
    async fn kill_marks_not_running() {
        let driver = FakeContainerDriver::new();
        let spec = ContainerSpec {
            task_id: TaskId::from_string("tsk-1"),
            image: "img".to_string(),
            repo_path: "/repo".into(),
            branch: "caic/w1".to_string(),
        };
        driver.create(&spec).await.expect("create");
        driver.kill(&spec.container_name()).await.expect("kill");
        assert!(!driver.is_running(&spec.container_name()));
    }

    #[tokio::test]
    async fn fake_git_driver_records_branch_creation() {
        let git = FakeGitDriver::new();
        git.set_max_seqnum(4);
        let repo_dir = Path::new("/repo");
        assert_eq!(git.max_seqnum(repo_dir, "caic/w").await.expect("seqnum"), 4);
        git.create_branch(repo_dir, "caic/w5", "origin/main").await.expect("create");
        assert_eq!(git.branches_created(), vec![("caic/w5".to_string(), "origin/main".to_string())]);
    }

    #[tokio::test]
    async fn fake_git_driver_reports_configured_reachability() {
        let git = FakeGitDriver::new();
        git.set_reachable(false);
        let repo_dir = Path::new("/repo");
        assert!(!git.is_reachable(repo_dir, "abc123", "origin/main").await.expect("reachable"));
    }
}
