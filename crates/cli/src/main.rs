// SPDX-License-Identifier: MIT

//! `noface`: CLI entry point. Wires the capability implementations
//! (`GitRepoOps`, `CommandTracker`, `Planner`, `WorkerPool`) together behind
//! `AgentLoop` and maps its result to a process exit code.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod exit_error;
mod signal;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use exit_error::ExitError;
use noface_core::{CancelToken, IssueId, SystemClock};
use noface_engine::{AgentLoop, ImplementerConfig, RunOptions, StopReason, WorkerPool};
use noface_planner::{Planner, ReviewerConfig};
use noface_storage::{paths, ProgressLog, TranscriptStore};
use noface_tracker::{CommandTracker, IssueTracker};
use noface_vcs::GitRepoOps;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "noface", version, about = "Autonomous coding-agent orchestrator")]
struct Cli {
    /// Run as though invoked from this directory (default: current directory).
    #[arg(short = 'C', long, global = true)]
    directory: Option<PathBuf>,

    /// Path to the project config file (default: `<project>/noface.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.noface/` and a default `noface.toml` in the project root.
    Init,
    /// Run the dispatch loop (the default when no subcommand is given).
    Run(RunArgs),
    /// Serve the read-only progress dashboard.
    Serve,
}

#[derive(clap::Args, Default)]
struct RunArgs {
    #[arg(long)]
    max_iterations: Option<u64>,
    #[arg(long)]
    issue: Option<String>,
    #[arg(long)]
    dry_run: bool,
    #[arg(long)]
    no_planner: bool,
    #[arg(long)]
    no_quality: bool,
    #[arg(long)]
    planner_interval: Option<u64>,
    #[arg(long)]
    quality_interval: Option<u64>,
    #[arg(long)]
    num_workers: Option<u32>,
    #[arg(long)]
    agent_timeout_seconds: Option<u64>,
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", format_error(&err));
            err.downcast_ref::<ExitError>().map_or(1, |e| e.code)
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let project_root = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let config_path = cli.config.unwrap_or_else(|| project_root.join("noface.toml"));

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Init => init_command(&project_root, &config_path).await,
        Command::Run(args) => run_command(&project_root, &config_path, args).await,
        Command::Serve => Err(ExitError::new(1, "`serve` is not implemented in this build").into()),
    }
}

/// Deduplicates the anyhow cause chain against the top-level message before
/// printing — the teacher's CLI applies the same trim so a chain whose
/// deeper causes already appear in the top error's `Display` isn't repeated.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();
    let causes: Vec<String> = err.chain().skip(1).map(|c| c.to_string()).collect();
    let extra: Vec<&String> = causes.iter().filter(|c| !top.contains(c.as_str())).collect();
    if extra.is_empty() {
        top
    } else {
        let mut out = top;
        out.push_str("\n\nCaused by:\n");
        for (i, cause) in extra.iter().enumerate() {
            out.push_str(&format!("  {}: {cause}\n", i + 1));
        }
        out
    }
}

async fn init_command(project_root: &Path, config_path: &Path) -> anyhow::Result<()> {
    if !project_root.join(".git").exists() {
        anyhow::bail!(ExitError::new(1, format!("{} is not a git repository", project_root.display())));
    }

    std::fs::create_dir_all(paths::dot_noface(project_root))
        .with_context(|| format!("failed to create {}", paths::dot_noface(project_root).display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, config::DEFAULT_CONFIG_TOML)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!("wrote {}", config_path.display());
    } else {
        println!("{} already exists, left untouched", config_path.display());
    }

    println!("initialized {}", paths::dot_noface(project_root).display());
    Ok(())
}

async fn run_command(project_root: &Path, config_path: &Path, args: RunArgs) -> anyhow::Result<()> {
    if !project_root.join(".git").exists() {
        anyhow::bail!(ExitError::new(1, format!("{} is not a git repository", project_root.display())));
    }

    let mut config = Config::load(config_path).map_err(|e| ExitError::new(1, e.to_string()))?;
    if let Some(n) = args.num_workers {
        config.num_workers = n.clamp(1, 8);
    }
    if let Some(secs) = args.agent_timeout_seconds {
        config.agent_timeout_seconds = secs;
    }
    if let Some(n) = args.planner_interval {
        config.planner_interval = n;
    }
    if let Some(n) = args.quality_interval {
        config.quality_interval = n;
    }
    if args.no_planner {
        config.run_planner = false;
    }
    if args.no_quality {
        config.run_quality = false;
    }

    let repo = GitRepoOps::new(project_root.to_path_buf());
    let tracker = CommandTracker::new(config.tracker_command.clone(), project_root.to_path_buf());
    let transcript = TranscriptStore::new(paths::transcripts_db(project_root));
    let progress = ProgressLog::new(paths::progress_log(project_root));
    let cancel = CancelToken::new();
    signal::install(cancel.clone());

    let reviewer = ReviewerConfig {
        command: config.reviewer_command.clone(),
        cwd: project_root.to_path_buf(),
        idle_timeout: Duration::from_secs(config.agent_timeout_seconds),
    };
    let implementer = ImplementerConfig {
        command: config.implementer_command.clone(),
        agent_timeout: Duration::from_secs(config.agent_timeout_seconds),
    };

    let tracker_ref: &dyn IssueTracker = &tracker;
    let planner = Planner::new(tracker_ref, reviewer);
    let pool = WorkerPool::new(&repo, tracker_ref, &transcript, SystemClock, cancel, implementer);

    let mut required_binaries = vec!["git".to_string()];
    for cmd in [&config.implementer_command, &config.reviewer_command] {
        if let Some(bin) = cmd.first() {
            required_binaries.push(bin.clone());
        }
    }
    required_binaries.push(config.tracker_command.clone());
    required_binaries.sort();
    required_binaries.dedup();

    let options = RunOptions {
        max_iterations: args.max_iterations,
        only_issue: args.issue.map(IssueId::new),
        dry_run: args.dry_run,
        run_planner: config.run_planner,
        run_quality: config.run_quality,
        planner_interval: config.planner_interval,
        quality_interval: config.quality_interval,
        build_command: config.build_command.clone(),
        required_binaries,
    };

    let loop_ = AgentLoop::new(
        &repo,
        tracker_ref,
        planner,
        pool,
        progress,
        paths::state_json(project_root),
        options,
    );

    loop_.check_prerequisites().await.map_err(|e| ExitError::new(1, e.to_string()))?;

    let summary = loop_.run(config.num_workers as usize).await.map_err(|e| ExitError::new(1, e.to_string()))?;
    tracing::info!(iterations = summary.iterations_run, stop_reason = ?summary.stop_reason, "run finished");

    match summary.stop_reason {
        StopReason::Interrupted => Err(ExitError::new(130, "interrupted").into()),
        _ => Ok(()),
    }
}
