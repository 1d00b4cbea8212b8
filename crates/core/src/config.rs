// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-wide configuration (SPEC_FULL §2, §3.1).
//!
//! Loaded once at startup from a TOML file and passed around as an
//! immutable value — no component mutates it at runtime (SPEC_FULL
//! invariant 10).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_git_timeout_secs() -> u64 {
    60
}

fn default_container_start_timeout_secs() -> u64 {
    3600
}

fn default_cleanup_grace_secs() -> u64 {
    10
}

fn default_branch_retry_bound() -> u32 {
    50
}

fn default_branch_prefix() -> String {
    "caic/w".to_string()
}

fn default_backup_ref_prefix() -> String {
    "caic-backup/".to_string()
}

fn default_large_binary_threshold_bytes() -> u64 {
    500 * 1024
}

fn default_subscriber_buffer() -> usize {
    256
}

fn default_max_turns() -> Option<u32> {
    None
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("caic")
        .join("caicd.sock")
}

/// A repository to register with the daemon at startup (SPEC_FULL §6
/// "registerRepository"), so an operator doesn't have to re-register every
/// repo by hand after each restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    pub path: PathBuf,
    pub base_branch: String,
    pub integration_remote: String,
}

/// Engine-wide tunables (SPEC_FULL §3.1 "Config").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one append-only log file per task.
    pub log_dir: PathBuf,
    /// Unix socket the daemon listens on and the CLI connects to.
    #[serde(rename = "socket_path", default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Repositories registered at daemon startup (SPEC_FULL §6).
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
    #[serde(rename = "git_write_timeout_secs", default = "default_git_timeout_secs")]
    git_write_timeout_secs: u64,
    #[serde(
        rename = "container_start_timeout_secs",
        default = "default_container_start_timeout_secs"
    )]
    container_start_timeout_secs: u64,
    #[serde(rename = "cleanup_grace_secs", default = "default_cleanup_grace_secs")]
    cleanup_grace_secs: u64,
    #[serde(default = "default_branch_retry_bound")]
    pub branch_retry_bound: u32,
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    #[serde(default = "default_backup_ref_prefix")]
    pub backup_ref_prefix: String,
    #[serde(default = "default_large_binary_threshold_bytes")]
    pub large_binary_threshold_bytes: u64,
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// Turn ceiling that drives the "max-turns hit" `→ terminating`
    /// transition (spec §4.2). `None` means unlimited.
    #[serde(default = "default_max_turns")]
    pub max_turns: Option<u32>,
    /// How the relay's SSH client reaches a container (spec §4.4): the
    /// container name itself resolves as a host on the runtime's internal
    /// network, so only the login user/port/key are configurable.
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default)]
    pub ssh_identity_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            socket_path: default_socket_path(),
            repos: Vec::new(),
            git_write_timeout_secs: default_git_timeout_secs(),
            container_start_timeout_secs: default_container_start_timeout_secs(),
            cleanup_grace_secs: default_cleanup_grace_secs(),
            branch_retry_bound: default_branch_retry_bound(),
            branch_prefix: default_branch_prefix(),
            backup_ref_prefix: default_backup_ref_prefix(),
            large_binary_threshold_bytes: default_large_binary_threshold_bytes(),
            subscriber_buffer: default_subscriber_buffer(),
            max_turns: default_max_turns(),
            ssh_user: default_ssh_user(),
            ssh_port: default_ssh_port(),
            ssh_identity_file: None,
        }
    }
}

fn default_log_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("caic").join("logs")
}

impl Config {
    pub fn git_write_timeout(&self) -> Duration {
        Duration::from_secs(self.git_write_timeout_secs)
    }

    pub fn container_start_timeout(&self) -> Duration {
        Duration::from_secs(self.container_start_timeout_secs)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.cleanup_grace_secs)
    }

    /// Load from a TOML file, falling back to built-in defaults for any
    /// field the file omits.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_timeouts() {
        let c = Config::default();
        assert_eq!(c.git_write_timeout(), Duration::from_secs(60));
        assert_eq!(c.container_start_timeout(), Duration::from_secs(3600));
        assert_eq!(c.cleanup_grace(), Duration::from_secs(10));
    }

    #[test]
    fn load_overrides_only_specified_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "cleanup_grace_secs = 30\n").expect("write");
        let c = Config::load(&path).expect("load");
        assert_eq!(c.cleanup_grace(), Duration::from_secs(30));
        assert_eq!(c.branch_prefix, "caic/w");
    }
}
