//! Fast-forward-only integration of a squashed task branch.
//!
//! Runs from the integration branch. Every precondition is checked before
//! the only mutating step (`git merge --ff-only`); afterwards the result is
//! verified to have a single parent. Worktree and branch cleanup are
//! independent best-effort steps that never undo the merge.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::git::{find_worktree_for_branch, read_base_branch, GitCli, GitError, WorktreeError};
use crate::report::Envelope;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error(transparent)]
    BaseBranch(#[from] WorktreeError),

    #[error("git {step} failed: {source}")]
    Git {
        step: &'static str,
        source: GitError,
    },

    #[error("merge must run from '{base}' but the current branch is '{current}'; run `git checkout {base}` first")]
    WrongBranch { base: String, current: String },

    #[error("task branch '{0}' does not exist; check the name with `git branch --list`")]
    UnknownTaskBranch(String),

    #[error("working tree has uncommitted changes; commit or stash them first (`git stash`)")]
    DirtyWorkingTree,

    #[error(
        "task branch '{task}' is {count} commit(s) ahead of '{base}', expected exactly 1; \
         squash it first with `lanekeeper squash {base} {task} <message-file> {task}`"
    )]
    NotSquashed {
        task: String,
        base: String,
        count: u64,
    },

    #[error(
        "'{base}' is not an ancestor of '{task}' ({behind} commit(s) behind); \
         rebase first with `git rebase {base} {task}`"
    )]
    NotFastForward {
        task: String,
        base: String,
        behind: u64,
    },

    #[error("fast-forward of '{base}' to '{task}' failed: {source}")]
    FastForwardFailed {
        task: String,
        base: String,
        source: GitError,
    },

    #[error("merge produced commit {commit} with {parents} parents; expected a linear fast-forward")]
    NonLinearResult { commit: String, parents: usize },
}

fn git_step(step: &'static str) -> impl FnOnce(GitError) -> MergeError {
    move |source| MergeError::Git { step, source }
}

#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub task_branch: String,
    /// Integration branch; read from the worktree binding when absent
    pub base: Option<String>,
    /// Remove the task worktree and delete the task branch afterwards
    pub cleanup: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub base_branch: String,
    pub task_branch: String,
    pub commit: String,
    pub commit_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree_removed: Option<String>,
    pub branch_deleted: bool,
    /// Cleanup steps that failed; the merge itself still stands
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup_errors: Vec<String>,
}

#[derive(Debug, Default)]
struct Cleanup {
    worktree_removed: Option<String>,
    branch_deleted: bool,
    errors: Vec<String>,
}

pub struct Merger<'a> {
    git: GitCli<'a>,
}

impl<'a> Merger<'a> {
    pub fn new(git: GitCli<'a>) -> Self {
        Self { git }
    }

    #[instrument(skip(self, request), fields(task = %request.task_branch))]
    pub fn merge(&self, request: &MergeRequest) -> Result<MergeReport, MergeError> {
        let started = Instant::now();
        let git = &self.git;
        let task = request.task_branch.as_str();

        // 1.
        let base = match request.base.as_deref() {
            Some(base) => base.to_string(),
            None => read_base_branch(git)?,
        };

        // 2.
        let current = git.current_branch().map_err(git_step("rev-parse"))?;
        if current != base {
            return Err(MergeError::WrongBranch { base, current });
        }

        // 3.
        if !git.branch_exists(task).map_err(git_step("show-ref"))? {
            return Err(MergeError::UnknownTaskBranch(task.to_string()));
        }

        // 4.
        if git.is_dirty().map_err(git_step("status"))? {
            return Err(MergeError::DirtyWorkingTree);
        }

        // 5. Squashing is a precondition of merging
        let ahead = git
            .rev_list_count(&format!("{base}..{task}"))
            .map_err(git_step("rev-list"))?;
        if ahead != 1 {
            return Err(MergeError::NotSquashed {
                task: task.to_string(),
                base,
                count: ahead,
            });
        }

        // 6.
        if !git.is_ancestor(&base, task).map_err(git_step("merge-base"))? {
            let behind = git
                .rev_list_count(&format!("{task}..{base}"))
                .map_err(git_step("rev-list"))?;
            return Err(MergeError::NotFastForward {
                task: task.to_string(),
                base,
                behind,
            });
        }

        // 7.
        let commit_message = git.subject(task).map_err(git_step("log"))?;

        // 8. The only mutation
        git.merge_ff_only(task)
            .map_err(|source| MergeError::FastForwardFailed {
                task: task.to_string(),
                base: base.clone(),
                source,
            })?;

        // 9.
        let commit = git.head_commit().map_err(git_step("rev-parse"))?;
        let parents = git.parent_count("HEAD").map_err(git_step("rev-list"))?;
        if parents != 1 {
            return Err(MergeError::NonLinearResult { commit, parents });
        }
        info!(%base, %commit, "Fast-forwarded base branch");

        // 10.
        let cleanup = if request.cleanup {
            self.cleanup(task)
        } else {
            Cleanup::default()
        };

        // 11.
        Ok(MergeReport {
            envelope: Envelope::success(
                format!("Fast-forwarded {base} to {task} ({commit})"),
                started.elapsed(),
            ),
            base_branch: base,
            task_branch: task.to_string(),
            commit,
            commit_message,
            worktree_removed: cleanup.worktree_removed,
            branch_deleted: cleanup.branch_deleted,
            cleanup_errors: cleanup.errors,
        })
    }

    /// Remove the task worktree, then delete the task branch; each independently
    fn cleanup(&self, task: &str) -> Cleanup {
        let git = &self.git;
        let mut cleanup = Cleanup::default();

        match find_worktree_for_branch(git, task) {
            Ok(Some(entry)) => match git.remove_worktree(Path::new(&entry.path)) {
                Ok(()) => {
                    info!(path = %entry.path, "Removed task worktree");
                    cleanup.worktree_removed = Some(entry.path);
                }
                Err(e) => {
                    warn!(path = %entry.path, error = %e, "Failed to remove task worktree");
                    cleanup
                        .errors
                        .push(format!("worktree {}: {e}", entry.path));
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Failed to list worktrees");
                cleanup.errors.push(format!("worktree lookup: {e}"));
            }
        }

        match git.delete_branch(task, false) {
            Ok(()) => {
                info!(branch = task, "Deleted task branch");
                cleanup.branch_deleted = true;
            }
            Err(e) => {
                warn!(branch = task, error = %e, "Failed to delete task branch");
                cleanup.errors.push(format!("branch {task}: {e}"));
            }
        }

        cleanup
    }
}
