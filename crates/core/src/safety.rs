// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Types shared between the engine and the pre-integration safety check.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of issue flagged by the safety check (spec §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyIssueKind {
    LargeBinary,
    Secret,
}

crate::simple_display! {
    SafetyIssueKind {
        LargeBinary => "large_binary",
        Secret => "secret",
    }
}

/// A single issue found while scanning a branch for integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyIssue {
    pub file: PathBuf,
    pub kind: SafetyIssueKind,
    pub detail: String,
}

impl SafetyIssue {
    pub fn large_binary(file: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            file: file.into(),
            kind: SafetyIssueKind::LargeBinary,
            detail: format!("{size_bytes} bytes exceeds threshold"),
        }
    }

    pub fn secret(file: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self { file: file.into(), kind: SafetyIssueKind::Secret, detail: detail.into() }
    }

    /// Dedup key per spec §4.2 ("Deduplicate by (file, kind)").
    pub fn dedup_key(&self) -> (PathBuf, SafetyIssueKind) {
        (self.file.clone(), self.kind)
    }
}
