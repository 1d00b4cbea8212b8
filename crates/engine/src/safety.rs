// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-integration safety check (spec §4.2 "Safety check").
//!
//! Scans a candidate branch for two things before it is allowed to
//! integrate: binary files over a size threshold, and secret-shaped
//! strings introduced by the diff. Findings are advisory — the caller
//! decides whether an empty result or an explicit `force` flag is
//! required to proceed (spec §7 "Safety").

use std::sync::LazyLock;

use caic_core::{DiffStat, SafetyIssue};
use caic_runtime::{GitDriver, RuntimeError};
use regex::Regex;

#[allow(clippy::expect_used)]
static AWS_ACCESS_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"AKIA[0-9A-Z]{16}").expect("constant regex pattern is valid"));

#[allow(clippy::expect_used)]
static PRIVATE_KEY_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-----BEGIN (RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----")
        .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static GITHUB_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"gh[pousr]_[A-Za-z0-9]{36,}").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static GENERIC_SK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sk-[A-Za-z0-9]{20,}").expect("constant regex pattern is valid"));

#[allow(clippy::expect_used)]
static ASSIGNED_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(password|secret|token|api[_-]?key)\s*[:=]\s*['"][^'"]{8,}['"]"#)
        .expect("constant regex pattern is valid")
});

/// One (description, pattern) entry in the fixed scan table (spec §4.2:
/// "a fixed regex table").
fn patterns() -> [(&'static str, &'static LazyLock<Regex>); 5] {
    [
        ("AWS access key", &AWS_ACCESS_KEY),
        ("private key PEM header", &PRIVATE_KEY_HEADER),
        ("GitHub token", &GITHUB_TOKEN),
        ("generic API key", &GENERIC_SK_TOKEN),
        ("assigned password/secret/token/apiKey", &ASSIGNED_SECRET),
    ]
}

/// Runs the safety check against `(repo_dir, head_ref, base_ref,
/// diff_stat)` (spec §4.2 signature). Non-fatal to the diff itself: a
/// driver error here means the check itself failed to run, not that the
/// branch is unsafe.
pub async fn check(
    git: &dyn GitDriver,
    repo_dir: &std::path::Path,
    base_ref: &str,
    head_ref: &str,
    diff_stat: &DiffStat,
    large_binary_threshold_bytes: u64,
) -> Result<Vec<SafetyIssue>, RuntimeError> {
    let mut issues = Vec::new();

    for file in &diff_stat.files {
        if !file.binary {
            continue;
        }
        let path_str = file.path.to_string_lossy();
        let size = git.blob_size(repo_dir, head_ref, &path_str).await?;
        if size > large_binary_threshold_bytes {
            issues.push(SafetyIssue::large_binary(file.path.clone(), size));
        }
    }

    let added = git.added_lines(repo_dir, base_ref, head_ref).await?;
    for (path, lines) in added {
        for line in &lines {
            if let Some((description, _)) = patterns().into_iter().find(|(_, re)| re.is_match(line)) {
                issues.push(SafetyIssue::secret(path.clone(), description));
                // One flagged line is enough evidence for this file; move on
                // rather than reporting every matching line individually.
                break;
            }
        }
    }

    Ok(dedup_by_file_and_kind(issues))
}

/// Deduplicates by `(file, kind)`, keeping the first occurrence (spec
/// §4.2: "Deduplicate by (file, kind)").
fn dedup_by_file_and_kind(issues: Vec<SafetyIssue>) -> Vec<SafetyIssue> {
    let mut seen = std::collections::HashSet::new();
    issues.into_iter().filter(|issue| seen.insert(issue.dedup_key())).collect()
}

#[cfg(test)]
#[path = "safety_tests.rs"]
mod tests;
