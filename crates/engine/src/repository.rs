// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Repository registry (SPEC_FULL §3.1 "Repository", §4.2 "the **Repository
//! registry**... owns a `HashMap<RepoId, Repository>`").

use std::collections::HashMap;
use std::path::PathBuf;

use caic_core::RepoId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A registered git repository a task can be created against.
#[derive(Debug, Clone)]
pub struct Repository {
    pub id: RepoId,
    pub path: PathBuf,
    pub base_branch: String,
    pub integration_remote: String,
}

/// Summary returned by `listRepositories` (SPEC_FULL §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub id: RepoId,
    pub path: PathBuf,
    pub base_branch: String,
}

impl From<&Repository> for RepositorySummary {
    fn from(r: &Repository) -> Self {
        Self { id: r.id.clone(), path: r.path.clone(), base_branch: r.base_branch.clone() }
    }
}

/// The set of known repositories (spec §2 leaves table: "Repository
/// registry"). Guarded independently from the branch-allocation mutex —
/// registration is rare and uncontended, unlike branch creation.
#[derive(Default)]
pub struct RepositoryRegistry {
    repos: RwLock<HashMap<RepoId, Repository>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        path: impl Into<PathBuf>,
        base_branch: impl Into<String>,
        integration_remote: impl Into<String>,
    ) -> RepoId {
        let id = RepoId::new();
        let repo = Repository {
            id: id.clone(),
            path: path.into(),
            base_branch: base_branch.into(),
            integration_remote: integration_remote.into(),
        };
        self.repos.write().insert(id.clone(), repo);
        id
    }

    pub fn get(&self, id: &RepoId) -> Option<Repository> {
        self.repos.read().get(id).cloned()
    }

    pub fn list(&self) -> Vec<RepositorySummary> {
        self.repos.read().values().map(RepositorySummary::from).collect()
    }

    /// Looks up a registered repository by its working-tree path, used by
    /// adoption to map a log header's recorded `repo` path back to the
    /// `RepoId` the daemon registered it under at startup (SPEC_FULL §4.5).
    pub fn find_by_path(&self, path: &std::path::Path) -> Option<Repository> {
        self.repos.read().values().find(|r| r.path == path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_get_round_trips() {
        let registry = RepositoryRegistry::new();
        let id = registry.register("/repos/demo", "main", "origin");
        let repo = registry.get(&id).expect("present");
        assert_eq!(repo.base_branch, "main");
        assert_eq!(repo.integration_remote, "origin");
    }

    #[test]
    fn unknown_repo_id_returns_none() {
        let registry = RepositoryRegistry::new();
        assert!(registry.get(&RepoId::new()).is_none());
    }

    #[test]
    fn list_reflects_every_registration() {
        let registry = RepositoryRegistry::new();
        registry.register("/a", "main", "origin");
        registry.register("/b", "main", "origin");
        assert_eq!(registry.list().len(), 2);
    }
}
