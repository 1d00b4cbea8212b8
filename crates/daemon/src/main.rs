// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `caicd`: the long-lived process that owns every task's live relay
//! session (spec §1 "the orchestrator mediates between HTTP/SSE clients
//! and the agents... survives server restarts without losing in-flight
//! work"). `caic` (the CLI) is an ephemeral client talking to this process
//! over a Unix socket (see [`caic_daemon::protocol`]); the daemon is what actually runs
//! [`caic_engine::adoption::adopt`] at startup and keeps dispatch/cleanup
//! tasks alive across CLI invocations.

mod listener;

use std::path::PathBuf;
use std::sync::Arc;

use caic_core::{Config, SystemClock};
use caic_engine::adoption::{adopt, AdoptionContext};
use caic_engine::{Api, RepositoryRegistry, Runner};
use caic_runtime::{ContainerDriver, GitDriver, MdContainerDriver, ProcessGitDriver};
use clap::Parser;

#[derive(Parser)]
#[command(name = "caicd", version, about = "Coding-agent task orchestration daemon")]
struct Cli {
    /// Path to a TOML config file. Missing file falls back to built-in
    /// defaults (SPEC_FULL §2 "Configuration").
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing(log_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "caicd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    std::fs::create_dir_all(&config.log_dir)?;
    let _tracing_guard = init_tracing(&config.log_dir);

    tracing::info!(socket = %config.socket_path.display(), log_dir = %config.log_dir.display(), "caicd starting");

    let registry = Arc::new(RepositoryRegistry::new());
    for entry in &config.repos {
        registry.register(entry.path.clone(), entry.base_branch.clone(), entry.integration_remote.clone());
    }

    let git: Arc<dyn GitDriver> = Arc::new(ProcessGitDriver::new(config.git_write_timeout()));
    let container: Arc<dyn ContainerDriver> =
        Arc::new(MdContainerDriver::new(config.container_start_timeout()));

    let runner = Arc::new(Runner::new(config.clone(), registry.clone(), git.clone(), container.clone(), SystemClock));

    let adoption_ctx = AdoptionContext {
        ssh_user: config.ssh_user.clone(),
        ssh_port: config.ssh_port,
        ssh_identity_file: config.ssh_identity_file.clone(),
    };
    match adopt(&runner, &registry, &container, &git, &adoption_ctx, &config.log_dir).await {
        Ok(results) => {
            for (task_id, outcome) in &results {
                tracing::info!(task_id = %task_id, outcome = ?outcome, "adopted task");
            }
            tracing::info!(count = results.len(), "adoption complete");
        }
        Err(err) => tracing::error!(%err, "adoption failed"),
    }

    let api = Arc::new(Api::new(runner.clone(), registry));
    let listener = listener::bind(&config.socket_path)?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let serve_handle = tokio::spawn(listener::serve(listener, api, shutdown_rx));

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining tasks");
    let _ = shutdown_tx.send(true);
    let _ = serve_handle.await;
    runner.shutdown().await;
    let _ = std::fs::remove_file(&config.socket_path);
    tracing::info!("caicd stopped");

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(%err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
