use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};

use lanekeeper::config::{Config, StatePaths};
use lanekeeper::existing_work::detect_existing_work;
use lanekeeper::git::{read_base_branch, record_base_branch, GitCli, GitGateway, SystemGit};
use lanekeeper::locks::{LockManager, LockOutcome};
use lanekeeper::logging;
use lanekeeper::merge::{MergeRequest, Merger};
use lanekeeper::report::ErrorReport;
use lanekeeper::squash::{SquashRequest, Squasher};

#[derive(Parser)]
#[command(name = "lanekeeper")]
#[command(about = "Issue locks and single-commit integration for parallel agent worktrees")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Run as if started in DIR (applied before config discovery, like `git -C`)
    #[arg(short = 'C', long = "dir", value_name = "DIR", global = true)]
    dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-issue ownership locks
    Lock {
        #[command(subcommand)]
        action: LockCommands,
    },

    /// Collapse the commits after BASE up to LAST into one commit
    Squash {
        /// Exclusive lower bound of the window
        base: String,
        /// Last commit of the window; must be the current HEAD
        last: String,
        /// File holding the commit message
        message_file: PathBuf,
        /// Branch to point at the result when running detached
        branch: Option<String>,
    },

    /// Fast-forward the integration branch to a squashed task branch
    Merge {
        task_branch: String,

        /// Integration branch (default: the worktree's bound base)
        #[arg(long)]
        base: Option<String>,

        /// Keep the task worktree and branch
        #[arg(long)]
        no_cleanup: bool,
    },

    /// Report commits already present ahead of the base branch
    ExistingWork {
        /// Base branch (default: the worktree's bound base)
        #[arg(long)]
        base: Option<String>,
    },

    /// Bind the current worktree to its integration branch
    BindBase { branch: String },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
enum LockCommands {
    /// Claim an issue for a session
    Acquire {
        issue: String,
        session: String,
        #[arg(long)]
        worktree: Option<String>,
    },

    /// Record the worktree path on a held lock
    Update {
        issue: String,
        session: String,
        #[arg(long)]
        worktree: String,
    },

    /// Release a lock held by this session
    Release { issue: String, session: String },

    /// Remove a lock regardless of owner (operator use only)
    ForceRelease { issue: String },

    /// Report who holds an issue
    Check { issue: String },

    /// List every held lock
    List,
}

fn main() -> ExitCode {
    let started = Instant::now();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => fail(&ErrorReport::new(format!("{e:#}"), started)),
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(dir) = &cli.dir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("Cannot change directory to {}", dir.display()))?;
    }

    let config = Config::load(cli.config.as_deref())?;

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    // Lock commands only use git for remote diagnostics, which already
    // degrade to nothing when a git call fails.
    let is_lock = matches!(cli.command, Commands::Lock { .. });
    let git = match SystemGit::locate() {
        Ok(git) => git,
        Err(_) if is_lock => SystemGit::new(),
        Err(e) => return Err(e.into()),
    };
    let repo = std::env::current_dir().context("Cannot determine working directory")?;

    // The state directory is resolved before logging so file logs land in it
    let state = if is_lock || config.logging.to_file {
        Some(config.state_paths(&GitCli::new(&git, &repo))?)
    } else {
        None
    };
    let logs_dir = state.as_ref().map(StatePaths::logs);
    let _logging = logging::init_logging(&config, logs_dir.as_deref(), cli.debug)?;

    let code = match cli.command {
        Commands::Lock { action } => {
            let state = state.as_ref().context("State directory was not resolved")?;
            cmd_lock(action, &config, state, &git, &repo)
        }
        Commands::Squash {
            base,
            last,
            message_file,
            branch,
        } => cmd_squash(&config, &git, &repo, base, last, &message_file, branch),
        Commands::Merge {
            task_branch,
            base,
            no_cleanup,
        } => {
            let request = MergeRequest {
                task_branch,
                base,
                cleanup: config.merge.cleanup && !no_cleanup,
            };
            cmd_merge(&git, &repo, &request)
        }
        Commands::ExistingWork { base } => cmd_existing_work(&git, &repo, base),
        Commands::BindBase { branch } => cmd_bind_base(&git, &repo, &branch),
        Commands::Config => ExitCode::SUCCESS,
    };
    Ok(code)
}

fn emit<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to render result: {e}"),
    }
}

fn fail(report: &ErrorReport) -> ExitCode {
    error!(message = %report.envelope.message, "Command failed");
    emit(report);
    ExitCode::FAILURE
}

fn cmd_lock(
    action: LockCommands,
    config: &Config,
    state: &StatePaths,
    git: &dyn GitGateway,
    repo: &Path,
) -> ExitCode {
    let manager = LockManager::new(state.locks(), git, repo.to_path_buf())
        .with_remote(config.locks.remote.as_str());

    let result = match action {
        LockCommands::Acquire {
            issue,
            session,
            worktree,
        } => manager.acquire(&issue, &session, worktree.as_deref()),
        LockCommands::Update {
            issue,
            session,
            worktree,
        } => manager.update(&issue, &session, &worktree),
        LockCommands::Release { issue, session } => manager.release(&issue, &session),
        LockCommands::ForceRelease { issue } => manager.force_release(&issue),
        LockCommands::Check { issue } => manager.check(&issue),
        LockCommands::List => match manager.list() {
            Ok(locks) => {
                emit(&serde_json::json!({ "status": "list", "locks": locks }));
                return ExitCode::SUCCESS;
            }
            Err(e) => Err(e),
        },
    };

    let outcome = result.unwrap_or_else(LockOutcome::from);
    emit(&outcome);
    if outcome.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn cmd_squash(
    config: &Config,
    git: &dyn GitGateway,
    repo: &Path,
    base: String,
    last: String,
    message_file: &Path,
    branch: Option<String>,
) -> ExitCode {
    let started = Instant::now();

    let message = match std::fs::read_to_string(message_file) {
        Ok(message) => message,
        Err(e) => {
            return fail(&ErrorReport::new(
                format!("Cannot read message file {}: {e}", message_file.display()),
                started,
            ))
        }
    };

    let squasher = Squasher::new(GitCli::new(git, repo))
        .with_backup_prefix(config.squash.backup_prefix.as_str());
    let request = SquashRequest {
        base,
        last,
        message,
        branch,
    };

    match squasher.squash(&request) {
        Ok(report) => {
            info!(commit = %report.commit, count = report.commit_count, "Squash complete");
            emit(&report);
            ExitCode::SUCCESS
        }
        Err(e) => fail(
            &ErrorReport::new(e.to_string(), started).with_backup_branch(e.backup_branch()),
        ),
    }
}

fn cmd_merge(git: &dyn GitGateway, repo: &Path, request: &MergeRequest) -> ExitCode {
    let started = Instant::now();

    match Merger::new(GitCli::new(git, repo)).merge(request) {
        Ok(report) => {
            info!(commit = %report.commit, base = %report.base_branch, "Merge complete");
            emit(&report);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&ErrorReport::new(e.to_string(), started)),
    }
}

fn cmd_existing_work(git: &dyn GitGateway, repo: &Path, base: Option<String>) -> ExitCode {
    let started = Instant::now();
    let cli = GitCli::new(git, repo);

    let base = match base.map_or_else(|| read_base_branch(&cli), Ok) {
        Ok(base) => base,
        Err(e) => return fail(&ErrorReport::new(e.to_string(), started)),
    };

    emit(&detect_existing_work(&cli, &base));
    ExitCode::SUCCESS
}

fn cmd_bind_base(git: &dyn GitGateway, repo: &Path, branch: &str) -> ExitCode {
    let started = Instant::now();

    match record_base_branch(&GitCli::new(git, repo), branch) {
        Ok(path) => {
            emit(&serde_json::json!({
                "status": "success",
                "base_branch": branch,
                "path": path,
            }));
            ExitCode::SUCCESS
        }
        Err(e) => fail(&ErrorReport::new(e.to_string(), started)),
    }
}
