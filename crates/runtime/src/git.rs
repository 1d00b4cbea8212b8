// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Git driver: fetch, branch allocation, numstat diffs, reachability, and
//! the raw primitives the safety check needs (spec §2 "Git driver", §4.2
//! "Safety check").
//!
//! Every operation shells out to the `git` binary against a shared working
//! tree; callers serialize branch-affecting calls under the engine's branch
//! mutex (spec §5 "Shared resources") — this crate has no locking of its
//! own.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use caic_core::{DiffStat, FileDiff};

use crate::error::RuntimeError;

/// Narrow abstraction over the `git` binary (spec §2 "Git driver").
#[async_trait]
pub trait GitDriver: Send + Sync {
    async fn fetch(&self, repo_dir: &Path, remote: &str) -> Result<(), RuntimeError>;

    /// Pushes `refspec` to `remote`, used by `syncTask`'s integration step
    /// once the safety check passes (spec §4.2 "performs integration").
    async fn push(&self, repo_dir: &Path, remote: &str, refspec: &str) -> Result<(), RuntimeError>;

    async fn create_branch(
        &self,
        repo_dir: &Path,
        branch: &str,
        base_ref: &str,
    ) -> Result<(), RuntimeError>;

    async fn delete_branch(&self, repo_dir: &Path, branch: &str) -> Result<(), RuntimeError>;

    async fn checkout(&self, repo_dir: &Path, branch: &str) -> Result<(), RuntimeError>;

    /// Highest `N` among local/remote branches matching `{prefix}N` (spec
    /// invariant 4: "allocation uses `max(existing-seqnum)+1`").
    async fn max_seqnum(&self, repo_dir: &Path, prefix: &str) -> Result<u64, RuntimeError>;

    /// `git diff --numstat base...head`, synthesized into a [`DiffStat`]
    /// (spec invariant 6, §4.2 dispatch loop).
    async fn numstat_diff(
        &self,
        repo_dir: &Path,
        base_ref: &str,
        head_ref: &str,
    ) -> Result<DiffStat, RuntimeError>;

    /// Whether `commit` is an ancestor reachable from `remote_ref` (spec
    /// invariant 8, §4.2 cleanup step 3).
    async fn is_reachable(
        &self,
        repo_dir: &Path,
        commit: &str,
        remote_ref: &str,
    ) -> Result<bool, RuntimeError>;

    async fn rev_parse(&self, repo_dir: &Path, reference: &str) -> Result<String, RuntimeError>;

    /// Creates (or overwrites) a ref pointing at `commit` (spec §6 "Backup
    /// refs": `refs/caic-backup/<branch>`).
    async fn update_ref(
        &self,
        repo_dir: &Path,
        ref_name: &str,
        commit: &str,
    ) -> Result<(), RuntimeError>;

    /// Byte size of a blob at `rev:path`, used by the safety check's
    /// large-binary scan (spec §4.2: "`git cat-file -s`").
    async fn blob_size(&self, repo_dir: &Path, rev: &str, path: &str) -> Result<u64, RuntimeError>;

    /// `+`-prefixed added lines per file between `base_ref...head_ref`,
    /// used by the safety check's secret scan (spec §4.2).
    async fn added_lines(
        &self,
        repo_dir: &Path,
        base_ref: &str,
        head_ref: &str,
    ) -> Result<Vec<(PathBuf, Vec<String>)>, RuntimeError>;
}

/// Shells out to the system `git` binary.
pub struct ProcessGitDriver {
    binary: String,
    timeout: Duration,
}

impl ProcessGitDriver {
    pub fn new(timeout: Duration) -> Self {
        Self { binary: "git".to_string(), timeout }
    }

    async fn run(&self, repo_dir: &Path, args: &[&str]) -> Result<String, RuntimeError> {
        let rendered = args.join(" ");
        let fut = tokio::process::Command::new(&self.binary)
            .args(args)
            .current_dir(repo_dir)
            .stdin(Stdio::null())
            .output();
        let output = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RuntimeError::Timeout {
                binary: "git",
                args: rendered.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| RuntimeError::Spawn { binary: "git", source })?;

        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                binary: "git",
                args: rendered,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl GitDriver for ProcessGitDriver {
    async fn fetch(&self, repo_dir: &Path, remote: &str) -> Result<(), RuntimeError> {
        self.run(repo_dir, &["fetch", remote]).await?;
        Ok(())
    }

    async fn push(&self, repo_dir: &Path, remote: &str, refspec: &str) -> Result<(), RuntimeError> {
        self.run(repo_dir, &["push", remote, refspec]).await?;
        Ok(())
    }

    async fn create_branch(
        &self,
        repo_dir: &Path,
        branch: &str,
        base_ref: &str,
    ) -> Result<(), RuntimeError> {
        self.run(repo_dir, &["branch", branch, base_ref]).await?;
        Ok(())
    }

    async fn delete_branch(&self, repo_dir: &Path, branch: &str) -> Result<(), RuntimeError> {
        self.run(repo_dir, &["branch", "-D", branch]).await?;
        Ok(())
    }

    async fn checkout(&self, repo_dir: &Path, branch: &str) -> Result<(), RuntimeError> {
        self.run(repo_dir, &["checkout", branch]).await?;
        Ok(())
    }

    async fn max_seqnum(&self, repo_dir: &Path, prefix: &str) -> Result<u64, RuntimeError> {
        let refs = self
            .run(repo_dir, &["for-each-ref", "--format=%(refname:short)", "refs/heads/", "refs/remotes/"])
            .await?;
        Ok(max_seqnum_in_refs(&refs, prefix))
    }

    async fn numstat_diff(
        &self,
        repo_dir: &Path,
        base_ref: &str,
        head_ref: &str,
    ) -> Result<DiffStat, RuntimeError> {
        let range = format!("{base_ref}...{head_ref}");
        let stdout = self.run(repo_dir, &["diff", "--numstat", &range]).await?;
        Ok(parse_numstat(&stdout))
    }

    async fn is_reachable(
        &self,
        repo_dir: &Path,
        commit: &str,
        remote_ref: &str,
    ) -> Result<bool, RuntimeError> {
        match self.run(repo_dir, &["merge-base", "--is-ancestor", commit, remote_ref]).await {
            Ok(_) => Ok(true),
            // `merge-base --is-ancestor` exits nonzero both when `commit` is
            // genuinely not an ancestor and when `remote_ref` doesn't resolve;
            // disambiguate so a typo'd ref doesn't silently read as "unreachable".
            Err(RuntimeError::CommandFailed { .. }) => {
                self.run(repo_dir, &["rev-parse", "--verify", remote_ref]).await?;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn rev_parse(&self, repo_dir: &Path, reference: &str) -> Result<String, RuntimeError> {
        let out = self.run(repo_dir, &["rev-parse", reference]).await?;
        Ok(out.trim().to_string())
    }

    async fn update_ref(
        &self,
        repo_dir: &Path,
        ref_name: &str,
        commit: &str,
    ) -> Result<(), RuntimeError> {
        self.run(repo_dir, &["update-ref", ref_name, commit]).await?;
        Ok(())
    }

    async fn blob_size(&self, repo_dir: &Path, rev: &str, path: &str) -> Result<u64, RuntimeError> {
        let spec = format!("{rev}:{path}");
        let out = self.run(repo_dir, &["cat-file", "-s", &spec]).await?;
        out.trim().parse::<u64>().map_err(|err| RuntimeError::UnexpectedOutput {
            binary: "git",
            args: format!("cat-file -s {spec}"),
            detail: err.to_string(),
        })
    }

    async fn added_lines(
        &self,
        repo_dir: &Path,
        base_ref: &str,
        head_ref: &str,
    ) -> Result<Vec<(PathBuf, Vec<String>)>, RuntimeError> {
        let range = format!("{base_ref}...{head_ref}");
        let stdout = self.run(repo_dir, &["diff", "--unified=0", &range]).await?;
        Ok(parse_added_lines(&stdout))
    }
}

fn max_seqnum_in_refs(refs: &str, prefix: &str) -> u64 {
    refs.lines()
        .filter_map(|line| {
            let name = line.trim().rsplit('/').next().unwrap_or(line.trim());
            let full = line.trim();
            let candidate = if full.starts_with(prefix) { full } else { name };
            candidate.strip_prefix(prefix)?.parse::<u64>().ok()
        })
        .max()
        .unwrap_or(0)
}

fn parse_numstat(stdout: &str) -> DiffStat {
    let mut files = Vec::new();
    for line in stdout.lines() {
        let mut parts = line.splitn(3, '\t');
        let (Some(added), Some(deleted), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let binary = added == "-" && deleted == "-";
        files.push(FileDiff {
            path: PathBuf::from(path),
            added: added.parse().unwrap_or(0),
            deleted: deleted.parse().unwrap_or(0),
            binary,
        });
    }
    DiffStat { files }
}

/// Parses `git diff --unified=0` output into `(file, added-lines)` pairs,
/// stripping the leading `+` the safety check's regex table scans past.
fn parse_added_lines(stdout: &str) -> Vec<(PathBuf, Vec<String>)> {
    let mut out: Vec<(PathBuf, Vec<String>)> = Vec::new();
    let mut current: Option<PathBuf> = None;
    for line in stdout.lines() {
        if let Some(path) = line.strip_prefix("+++ b/") {
            current = Some(PathBuf::from(path));
            continue;
        }
        if line.starts_with("+++ ") || line.starts_with("--- ") {
            continue;
        }
        if let Some(text) = line.strip_prefix('+') {
            if let Some(path) = &current {
                match out.last_mut() {
                    Some((p, lines)) if p == path => lines.push(text.to_string()),
                    _ => out.push((path.clone(), vec![text.to_string()])),
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_seqnum_picks_highest_matching_branch() {
        let refs = "caic/w1\ncaic/w7\nmain\norigin/caic/w3\n";
        assert_eq!(max_seqnum_in_refs(refs, "caic/w"), 7);
    }

    #[test]
    fn max_seqnum_defaults_to_zero_with_no_matches() {
        assert_eq!(max_seqnum_in_refs("main\ndevelop\n", "caic/w"), 0);
    }

    #[test]
    fn parses_numstat_with_binary_marker() {
        let stdout = "3\t1\tREADME.md\n-\t-\tassets/logo.png\n";
        let stat = parse_numstat(stdout);
        assert_eq!(stat.files.len(), 2);
        assert_eq!(stat.files[0].added, 3);
        assert!(!stat.files[0].binary);
        assert!(stat.files[1].binary);
    }

    #[test]
    fn parses_added_lines_per_file() {
        let diff = "diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -0,0 +1,2 @@\n+hello\n+world\n";
        let added = parse_added_lines(diff);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].0, PathBuf::from("a.txt"));
        assert_eq!(added[0].1, vec!["hello".to_string(), "world".to_string()]);
    }
}
