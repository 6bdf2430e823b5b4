//! Git command execution gateway.
//!
//! Provides a trait-based abstraction over running git subcommands so that:
//! - protocols receive their gateway explicitly instead of shelling out ad hoc
//! - step ordering and failure paths can be unit tested without a repository
//!
//! Every call is a synchronous, blocking subprocess with no timeout.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

/// Errors surfaced by the git gateway
#[derive(Error, Debug)]
pub enum GitError {
    #[error("git is not installed or not in PATH")]
    NotInstalled,

    #[error("git {command} failed (exit {code}): {output}")]
    CommandFailed {
        command: String,
        code: i32,
        output: String,
    },

    #[error("git {command} produced unexpected output: {output:?}")]
    UnexpectedOutput { command: String, output: String },

    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// Exit code of a failed command, if the command ran at all
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            GitError::CommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Runs git subcommands in a directory and returns trimmed stdout.
pub trait GitGateway: Send + Sync {
    /// Run `git <args>` with `dir` as the working directory.
    ///
    /// A non-zero exit yields [`GitError::CommandFailed`] carrying the exit
    /// code and the combined stdout/stderr.
    fn run(&self, dir: &Path, args: &[&str]) -> Result<String, GitError>;
}

/// Real implementation using the system `git` binary
#[derive(Debug, Clone)]
pub struct SystemGit {
    program: PathBuf,
}

impl SystemGit {
    /// Use `git` as resolved by the OS at spawn time
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Resolve `git` on PATH up front so a missing binary is reported once
    pub fn locate() -> Result<Self, GitError> {
        let program = which::which("git").map_err(|_| GitError::NotInstalled)?;
        Ok(Self { program })
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

impl GitGateway for SystemGit {
    fn run(&self, dir: &Path, args: &[&str]) -> Result<String, GitError> {
        debug!(?args, cwd = %dir.display(), "Running git command");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GitError::NotInstalled
                } else {
                    GitError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let combined = [stdout.trim(), stderr.trim()]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                code: output.status.code().unwrap_or(-1),
                output: combined,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Scripted reply for [`MockGit`]
#[derive(Debug, Clone)]
enum MockReply {
    Ok(String),
    Fail { code: i32, output: String },
}

/// Mock implementation for testing
///
/// Replies are keyed by the space-joined argument list. Multiple replies for
/// the same key are consumed in order; the last one repeats. Prefix replies
/// apply when no exact key matches (useful for generated branch names).
/// Unscripted commands succeed with empty output.
#[derive(Debug, Clone, Default)]
pub struct MockGit {
    replies: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    prefix_replies: Arc<Mutex<Vec<(String, MockReply)>>>,
    /// Every command run, in order
    pub command_log: Arc<Mutex<Vec<String>>>,
}

impl MockGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for `args`
    pub fn on(&self, args: &[&str], stdout: &str) -> &Self {
        self.push(args, MockReply::Ok(stdout.to_string()));
        self
    }

    /// Queue a failing reply for `args`
    pub fn fail(&self, args: &[&str], code: i32, output: &str) -> &Self {
        self.push(
            args,
            MockReply::Fail {
                code,
                output: output.to_string(),
            },
        );
        self
    }

    /// Reply for any command starting with `prefix`
    pub fn on_prefix(&self, prefix: &[&str], stdout: &str) -> &Self {
        self.push_prefix(prefix, MockReply::Ok(stdout.to_string()));
        self
    }

    /// Fail any command starting with `prefix`
    pub fn fail_prefix(&self, prefix: &[&str], code: i32, output: &str) -> &Self {
        self.push_prefix(
            prefix,
            MockReply::Fail {
                code,
                output: output.to_string(),
            },
        );
        self
    }

    fn push_prefix(&self, prefix: &[&str], reply: MockReply) {
        if let Ok(mut replies) = self.prefix_replies.lock() {
            replies.push((prefix.join(" "), reply));
        }
    }

    fn push(&self, args: &[&str], reply: MockReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.entry(args.join(" ")).or_default().push_back(reply);
        }
    }

    /// Commands run so far
    pub fn commands(&self) -> Vec<String> {
        self.command_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Whether a command starting with `prefix` was run
    pub fn ran(&self, prefix: &str) -> bool {
        self.commands().iter().any(|c| c.starts_with(prefix))
    }
}

impl GitGateway for MockGit {
    fn run(&self, _dir: &Path, args: &[&str]) -> Result<String, GitError> {
        let key = args.join(" ");
        if let Ok(mut log) = self.command_log.lock() {
            log.push(key.clone());
        }

        let exact = self.replies.lock().ok().and_then(|mut replies| {
            let queue = replies.get_mut(&key)?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });
        let reply = exact.or_else(|| {
            self.prefix_replies.lock().ok().and_then(|replies| {
                replies
                    .iter()
                    .find(|(prefix, _)| key.starts_with(prefix.as_str()))
                    .map(|(_, reply)| reply.clone())
            })
        });

        match reply {
            Some(MockReply::Ok(stdout)) => Ok(stdout),
            Some(MockReply::Fail { code, output }) => Err(GitError::CommandFailed {
                command: key,
                code,
                output,
            }),
            None => Ok(String::new()),
        }
    }
}
