// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Text/JSON rendering for `caic` subcommands, mirroring the teacher's
//! `--format text|json` convention (SPEC_FULL §2 ambient CLI ergonomics).

use caic_core::{Message, RepoEntry, TaskId};
use caic_daemon::protocol::SyncOutcomeDto;
use caic_engine::TaskSummary;
use clap::ValueEnum;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_repos(repos: &[RepoEntry], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(repos),
        OutputFormat::Text => {
            if repos.is_empty() {
                println!("no repositories registered");
                return;
            }
            for repo in repos {
                println!(
                    "{}  base={}  remote={}",
                    repo.path.display(),
                    repo.base_branch,
                    repo.integration_remote
                );
            }
        }
    }
}

pub fn print_repo_added(path: &std::path::Path, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "registered": path })),
        OutputFormat::Text => println!("registered {}", path.display()),
    }
}

pub fn print_tasks(tasks: &[TaskSummary], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(tasks),
        OutputFormat::Text => {
            if tasks.is_empty() {
                println!("no tasks");
                return;
            }
            for task in tasks {
                println!(
                    "{}  {:<12}  {}  {}",
                    task.id,
                    task.state.to_string(),
                    task.branch.as_deref().unwrap_or("-"),
                    task.model,
                );
            }
        }
    }
}

pub fn print_task_created(id: &TaskId, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "id": id })),
        OutputFormat::Text => println!("{id}"),
    }
}

pub fn print_accepted(format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "status": "accepted" })),
        OutputFormat::Text => println!("ok"),
    }
}

pub fn print_sync_outcome(outcome: &SyncOutcomeDto, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(outcome),
        OutputFormat::Text => {
            if outcome.integrated {
                println!("integrated");
            } else {
                println!("blocked: {} issue(s)", outcome.issues.len());
                for issue in &outcome.issues {
                    println!("  {} {} — {}", issue.kind, issue.file.display(), issue.detail);
                }
            }
        }
    }
}

/// One line per ingress [`Message`] for `task events` (spec §6 `taskEvents`).
pub fn print_event(message: &Message, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(message),
        OutputFormat::Text => println!("{}", render_event_text(message)),
    }
}

fn render_event_text(message: &Message) -> String {
    match message {
        Message::SystemInit { session_id, model, .. } => {
            format!("[init] session={session_id} model={model}")
        }
        Message::System { subtype } => format!("[system] {subtype}"),
        Message::Assistant { blocks } => {
            let parts: Vec<String> = blocks
                .iter()
                .map(|b| match b {
                    caic_core::ContentBlock::Text { text } => text.clone(),
                    caic_core::ContentBlock::ToolUse { name, id, .. } => format!("<tool:{name} {id}>"),
                })
                .collect();
            format!("[assistant] {}", parts.join(" "))
        }
        Message::User { parent_tool_use_id: Some(id), .. } => format!("[tool-result] for {id}"),
        Message::User { parent_tool_use_id: None, .. } => "[user]".to_string(),
        Message::Result { subtype, is_error, turns, cost_usd, .. } => format!(
            "[result] {subtype} error={is_error} turns={turns} cost={}",
            cost_usd.map(|c| format!("${c:.4}")).unwrap_or_else(|| "-".to_string())
        ),
        Message::StreamEvent { text } => format!("[stream] {text}"),
        Message::DiffStat { stat } => format!("[diff] {} file(s)", stat.files.len()),
        Message::ParseError { err, .. } => format!("[parse-error] {err}"),
        Message::Raw { r#type, .. } => format!("[raw] {}", r#type),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("failed to serialize JSON output: {err}"),
    }
}
