// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `caic`: an ephemeral Unix-socket client of `caicd` (SPEC_FULL §6: "a CLI
//! ... drives [the `Api` facade] directly" — `caicd` is the process that
//! actually holds that facade; `caic` reaches it over the socket protocol
//! `caic_daemon::protocol` defines, the same way the teacher's `oj-cli`
//! drives `oj-daemon` through `DaemonClient`).
//!
//! `caicd` must already be running against the same `--config` (and
//! therefore the same `socket_path`) for any `task` subcommand to work —
//! `caicd` is the sole process that runs startup adoption (spec §4.5) and
//! keeps a task's dispatch/cleanup loops alive between requests. `repo
//! list`/`repo add` are the one exception: they read and write the config
//! file directly, since that file is how a repository gets into `caicd`'s
//! registry in the first place (a running daemon only sees registrations
//! made before its own startup, or via a future `repo add --live` request).

mod client;
mod output;

use std::path::PathBuf;

use caic_core::{Config, Prompt, TaskId};
use caic_daemon::protocol::{EventFrame, Request, ResponseBody};
use caic_wire::Harness;
use clap::{Parser, Subcommand, ValueEnum};

use client::DaemonClient;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "caic", version = env!("BUILD_GIT_HASH"), about = "Coding-agent task orchestration CLI")]
struct Cli {
    /// Path to a TOML config file; same format `caicd` reads (SPEC_FULL §2).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for commands that print structured data.
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Repository registry operations (SPEC_FULL §6 "registerRepository").
    #[command(subcommand)]
    Repo(RepoCommand),
    /// Task lifecycle operations (spec §6), dispatched to `caicd` over its
    /// Unix socket.
    #[command(subcommand)]
    Task(TaskCommand),
}

#[derive(Subcommand)]
enum RepoCommand {
    /// List repositories registered in the config file.
    List,
    /// Register a repository and persist it to the config file. Only
    /// picked up by a `caicd` that (re)starts after this runs.
    Add {
        path: PathBuf,
        #[arg(long, default_value = "main")]
        base_branch: String,
        #[arg(long, default_value = "origin")]
        integration_remote: String,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// `listTasks()` (spec §6): active-first, id-desc.
    List,
    /// `createTask(prompt, repo, harness, model?, images?)` (spec §6).
    Create {
        /// Working-tree path of a repo already registered with `repo add`
        /// (resolved to a `RepoId` by `caicd`, SPEC_FULL §6).
        #[arg(long)]
        repo: PathBuf,
        #[arg(long, value_enum)]
        harness: HarnessArg,
        #[arg(long)]
        model: String,
        /// Prompt text; pass `-` to read from stdin.
        prompt: String,
        #[arg(long, default_value = "caic-agent:latest")]
        container_image: String,
    },
    /// `taskEvents(id)` (spec §6): replay then, with `--follow`, the live tail.
    Events {
        id: String,
        #[arg(long)]
        follow: bool,
    },
    /// `sendInput(id, Prompt)` (spec §6): legal only in `waiting`/`asking`.
    Send {
        id: String,
        prompt: String,
    },
    /// `syncTask(id, {force?})` (spec §6).
    Sync {
        id: String,
        #[arg(long)]
        force: bool,
    },
    /// `terminateTask(id)` (spec §6).
    Terminate {
        id: String,
    },
    /// `restartTask(id, Prompt)` (spec §4.2 `RestartSession`).
    Restart {
        id: String,
        prompt: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HarnessArg {
    Claude,
    Gemini,
    CodexAppServer,
    CodexExec,
}

impl From<HarnessArg> for Harness {
    fn from(value: HarnessArg) -> Self {
        match value {
            HarnessArg::Claude => Harness::Claude,
            HarnessArg::Gemini => Harness::Gemini,
            HarnessArg::CodexAppServer => Harness::CodexAppServer,
            HarnessArg::CodexExec => Harness::CodexExec,
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_path = cli.config.clone();
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Repo(RepoCommand::List) => repo_list(&config, cli.format),
        Command::Repo(RepoCommand::Add { path, base_branch, integration_remote }) => {
            repo_add(&config_path, config, path, base_branch, integration_remote, cli.format)
        }
        Command::Task(task_cmd) => run_task_command(&config, task_cmd, cli.format).await,
    }
}

fn repo_list(config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    output::print_repos(&config.repos, format);
    Ok(())
}

/// Persists a new [`caic_core::config::RepoEntry`] into the config file
/// (read-modify-write), since `Config` itself is immutable at runtime
/// (SPEC_FULL invariant 10).
fn repo_add(
    config_path: &Option<PathBuf>,
    mut config: Config,
    path: PathBuf,
    base_branch: String,
    integration_remote: String,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let path = path.canonicalize().unwrap_or(path);
    config.repos.push(caic_core::RepoEntry { path: path.clone(), base_branch, integration_remote });

    let Some(config_path) = config_path else {
        anyhow::bail!("--config is required to persist a new repository registration");
    };
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&config)?;
    std::fs::write(config_path, text)?;

    output::print_repo_added(&path, format);
    Ok(())
}

async fn run_task_command(config: &Config, cmd: TaskCommand, format: OutputFormat) -> anyhow::Result<()> {
    let client = DaemonClient::new(config.socket_path.clone());

    match cmd {
        TaskCommand::List => {
            let ResponseBody::Tasks { tasks } = client.send(&Request::ListTasks).await? else {
                anyhow::bail!("caicd returned an unexpected response to listTasks");
            };
            output::print_tasks(&tasks, format);
            Ok(())
        }
        TaskCommand::Create { repo, harness, model, prompt, container_image } => {
            let prompt_text = if prompt == "-" { read_stdin()? } else { prompt };
            let repo_path = repo.canonicalize().unwrap_or(repo);
            let request = Request::CreateTask {
                repo_path,
                harness: harness.into(),
                model,
                prompt: Prompt::text(prompt_text),
                container_image,
            };
            let ResponseBody::TaskCreated { id } = client.send(&request).await? else {
                anyhow::bail!("caicd returned an unexpected response to createTask");
            };
            output::print_task_created(&id, format);
            Ok(())
        }
        TaskCommand::Events { id, follow } => {
            let task_id = TaskId::from(id.as_str());
            let mut events = client.stream_events(task_id).await?;
            while let Some(frame) = events.recv().await {
                match frame {
                    EventFrame::Message { message } => output::print_event(&message, format),
                    EventFrame::Ready if !follow => break,
                    EventFrame::Ready => {}
                    EventFrame::Error { message } => anyhow::bail!("caicd: {message}"),
                }
            }
            Ok(())
        }
        TaskCommand::Send { id, prompt } => {
            let task_id = TaskId::from(id.as_str());
            let request = Request::SendInput { id: task_id, prompt: Prompt::text(prompt) };
            expect_accepted(&client, &request).await?;
            output::print_accepted(format);
            Ok(())
        }
        TaskCommand::Sync { id, force } => {
            let task_id = TaskId::from(id.as_str());
            let ResponseBody::Synced { outcome } = client.send(&Request::SyncTask { id: task_id, force }).await?
            else {
                anyhow::bail!("caicd returned an unexpected response to syncTask");
            };
            output::print_sync_outcome(&outcome, format);
            Ok(())
        }
        TaskCommand::Terminate { id } => {
            let task_id = TaskId::from(id.as_str());
            expect_accepted(&client, &Request::TerminateTask { id: task_id }).await?;
            output::print_accepted(format);
            Ok(())
        }
        TaskCommand::Restart { id, prompt } => {
            let task_id = TaskId::from(id.as_str());
            let request = Request::RestartTask { id: task_id, prompt: Prompt::text(prompt) };
            expect_accepted(&client, &request).await?;
            output::print_accepted(format);
            Ok(())
        }
    }
}

async fn expect_accepted(client: &DaemonClient, request: &Request) -> anyhow::Result<()> {
    match client.send(request).await? {
        ResponseBody::Accepted => Ok(()),
        _ => anyhow::bail!("caicd returned an unexpected response"),
    }
}

fn read_stdin() -> anyhow::Result<String> {
    use std::io::Read;
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
