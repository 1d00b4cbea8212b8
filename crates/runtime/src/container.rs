// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Container driver: create, list, inspect and kill per-task containers
//! via the `md` CLI (spec §2, §4.2, §6 "Container labels").
//!
//! Every container started by the engine carries a `caic=<taskID>` label
//! so the adoption routine (spec §4.5) can match running containers back
//! to task logs after a restart.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use caic_core::TaskId;

use crate::error::RuntimeError;

/// Label key every container carries (spec §6 "Container labels").
pub const TASK_LABEL_KEY: &str = "caic";

/// Parameters for starting one task's container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub task_id: TaskId,
    pub image: String,
    pub repo_path: PathBuf,
    pub branch: String,
}

impl ContainerSpec {
    /// Deterministic container name derived from the task id, so a restart
    /// can look the container up without a separate name-to-task index.
    pub fn container_name(&self) -> String {
        format!("caic-{}", self.task_id.as_str())
    }

    fn label(&self) -> String {
        format!("{TASK_LABEL_KEY}={}", self.task_id.as_str())
    }
}

/// What the driver reports about one running or exited container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub name: String,
    pub task_id: Option<TaskId>,
    pub running: bool,
}

/// Narrow abstraction over the container runtime (spec §2 "Container
/// driver": "Create container on branch, list, inspect labels, kill").
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    async fn create(&self, spec: &ContainerSpec) -> Result<(), RuntimeError>;
    async fn list(&self) -> Result<Vec<ContainerInfo>, RuntimeError>;
    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError>;
    async fn kill(&self, name: &str) -> Result<(), RuntimeError>;

    /// Writes `contents` to `dest_path` inside the named container (SPEC_FULL
    /// §4.4: "the in-container daemon script is... deployed by the
    /// container driver on first task start").
    async fn deploy_file(
        &self,
        name: &str,
        dest_path: &str,
        contents: &str,
    ) -> Result<(), RuntimeError>;

    /// Reads `src_path` out of the named container, the inverse of
    /// `deploy_file` (spec §4.5 adoption: reading a live relay's
    /// `output.jsonl` in full to rebuild in-memory state).
    async fn read_file(&self, name: &str, src_path: &str) -> Result<String, RuntimeError>;
}

/// Shells out to the `md` binary (spec §1: "the container CLI (`md`)").
pub struct MdContainerDriver {
    binary: String,
    timeout: Duration,
}

impl MdContainerDriver {
    pub fn new(timeout: Duration) -> Self {
        Self { binary: "md".to_string(), timeout }
    }

    /// Override the binary name, for tests that stub `md` with a fake script.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run(&self, args: &[&str]) -> Result<String, RuntimeError> {
        let rendered = args.join(" ");
        let fut = tokio::process::Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output();
        let output = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RuntimeError::Timeout {
                binary: "md",
                args: rendered.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| RuntimeError::Spawn { binary: "md", source })?;

        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                binary: "md",
                args: rendered,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_with_stdin(&self, args: &[&str], stdin_data: &str) -> Result<(), RuntimeError> {
        use tokio::io::AsyncWriteExt;

        let rendered = args.join(" ");
        let mut child = tokio::process::Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| RuntimeError::Spawn { binary: "md", source })?;
        let mut stdin = child.stdin.take().ok_or_else(|| RuntimeError::UnexpectedOutput {
            binary: "md",
            args: rendered.clone(),
            detail: "child stdin unavailable".to_string(),
        })?;

        let fut = async {
            stdin.write_all(stdin_data.as_bytes()).await?;
            drop(stdin);
            child.wait_with_output().await
        };
        let output = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RuntimeError::Timeout {
                binary: "md",
                args: rendered.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| RuntimeError::Spawn { binary: "md", source })?;

        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                binary: "md",
                args: rendered,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerDriver for MdContainerDriver {
    async fn create(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        let name = spec.container_name();
        let label = spec.label();
        let repo_path = spec.repo_path.display().to_string();
        tracing::info!(task_id = %spec.task_id, name = %name, branch = %spec.branch, "creating container");
        self.run(&[
            "create",
            "--name",
            &name,
            "--label",
            &label,
            "--branch",
            &spec.branch,
            "--repo",
            &repo_path,
            "--image",
            &spec.image,
        ])
        .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let stdout = self.run(&["ls", "--format", "json"]).await?;
        if stdout.is_empty() {
            return Ok(Vec::new());
        }
        parse_list_output(&stdout)
    }

    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        match self.run(&["inspect", name, "--format", "json"]).await {
            Ok(stdout) if stdout.is_empty() => Ok(None),
            Ok(stdout) => parse_list_output(&stdout).map(|mut v| v.pop()),
            Err(RuntimeError::CommandFailed { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn kill(&self, name: &str) -> Result<(), RuntimeError> {
        tracing::info!(name = %name, "killing container");
        self.run(&["kill", name]).await?;
        Ok(())
    }

    async fn deploy_file(
        &self,
        name: &str,
        dest_path: &str,
        contents: &str,
    ) -> Result<(), RuntimeError> {
        let target = format!("{name}:{dest_path}");
        tracing::info!(name = %name, dest_path = %dest_path, "deploying file into container");
        self.run_with_stdin(&["cp", "-", &target], contents).await
    }

    async fn read_file(&self, name: &str, src_path: &str) -> Result<String, RuntimeError> {
        let source = format!("{name}:{src_path}");
        self.run(&["cp", &source, "-"]).await
    }
}

#[derive(serde::Deserialize)]
struct RawContainer {
    name: String,
    #[serde(default)]
    labels: std::collections::HashMap<String, String>,
    #[serde(default)]
    running: bool,
}

fn parse_list_output(stdout: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
    let parse_one = |line: &str| -> Result<RawContainer, RuntimeError> {
        serde_json::from_str(line).map_err(|err| RuntimeError::UnexpectedOutput {
            binary: "md",
            args: "ls/inspect".to_string(),
            detail: err.to_string(),
        })
    };

    // `md` emits either a JSON array (`ls`) or one object per line (`inspect`).
    let raw: Vec<RawContainer> = if stdout.trim_start().starts_with('[') {
        serde_json::from_str(stdout).map_err(|err| RuntimeError::UnexpectedOutput {
            binary: "md",
            args: "ls".to_string(),
            detail: err.to_string(),
        })?
    } else {
        stdout.lines().filter(|l| !l.trim().is_empty()).map(parse_one).collect::<Result<_, _>>()?
    };

    Ok(raw
        .into_iter()
        .map(|c| ContainerInfo {
            task_id: c.labels.get(TASK_LABEL_KEY).map(TaskId::from_string),
            name: c.name,
            running: c.running,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_name_is_derived_from_task_id() {
        let spec = ContainerSpec {
            task_id: TaskId::from_string("tsk-abc123"),
            image: "caic-agent:latest".to_string(),
            repo_path: "/repos/demo".into(),
            branch: "caic/w1".to_string(),
        };
        assert_eq!(spec.container_name(), "caic-tsk-abc123");
        assert_eq!(spec.label(), "caic=tsk-abc123");
    }

    #[test]
    fn parses_array_output_from_ls() {
        let json = r#"[{"name":"caic-tsk-1","labels":{"caic":"tsk-1"},"running":true}]"#;
        let parsed = parse_list_output(json).expect("parse");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].task_id, Some(TaskId::from_string("tsk-1")));
        assert!(parsed[0].running);
    }

    #[test]
    fn parses_newline_delimited_object_from_inspect() {
        let json = r#"{"name":"caic-tsk-2","labels":{"caic":"tsk-2"},"running":false}"#;
        let parsed = parse_list_output(json).expect("parse");
        assert_eq!(parsed.len(), 1);
        assert!(!parsed[0].running);
    }

    #[test]
    fn container_with_no_caic_label_has_no_task_id() {
        let json = r#"[{"name":"unrelated","labels":{},"running":true}]"#;
        let parsed = parse_list_output(json).expect("parse");
        assert_eq!(parsed[0].task_id, None);
    }
}
