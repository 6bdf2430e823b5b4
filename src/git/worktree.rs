//! Worktree bindings for isolated task development.
//!
//! Each working copy records the integration branch it forked from in its
//! private git directory (`.git/worktrees/<name>/` for linked worktrees,
//! `.git/` for the main one). The merge protocol reads that binding when no
//! base branch is given explicitly.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use super::cli::{GitCli, WorktreeEntry};
use super::gateway::GitError;

/// Metadata file name inside the per-worktree git directory
pub const BASE_BRANCH_FILE: &str = "lanekeeper-base";

#[derive(Error, Debug)]
pub enum WorktreeError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("failed to access worktree metadata {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("branch '{0}' does not exist; create it first with `git branch {0}`")]
    UnknownBranch(String),

    #[error(
        "no base branch recorded for {}; pass --base <branch> or run `lanekeeper bind-base <branch>` in this worktree",
        .dir.display()
    )]
    NoBaseRecorded { dir: PathBuf },
}

fn metadata_path(git: &GitCli<'_>) -> Result<PathBuf, GitError> {
    Ok(PathBuf::from(git.git_dir()?).join(BASE_BRANCH_FILE))
}

/// Bind the working copy to the branch it will integrate into
pub fn record_base_branch(git: &GitCli<'_>, base: &str) -> Result<PathBuf, WorktreeError> {
    if !git.branch_exists(base)? {
        return Err(WorktreeError::UnknownBranch(base.to_string()));
    }

    let path = metadata_path(git)?;
    fs::write(&path, format!("{base}\n")).map_err(|source| WorktreeError::Io {
        path: path.clone(),
        source,
    })?;

    info!(base, path = %path.display(), "Recorded base branch for worktree");
    Ok(path)
}

/// Read the base branch recorded for the working copy
pub fn read_base_branch(git: &GitCli<'_>) -> Result<String, WorktreeError> {
    let path = metadata_path(git)?;
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WorktreeError::NoBaseRecorded {
                dir: git.dir().to_path_buf(),
            });
        }
        Err(source) => return Err(WorktreeError::Io { path, source }),
    };

    let base = contents.trim();
    if base.is_empty() {
        return Err(WorktreeError::NoBaseRecorded {
            dir: git.dir().to_path_buf(),
        });
    }

    debug!(base, "Read recorded base branch");
    Ok(base.to_string())
}

/// Find the worktree that has `branch` checked out.
///
/// Assumes at most one worktree per branch; the first match wins.
pub fn find_worktree_for_branch(
    git: &GitCli<'_>,
    branch: &str,
) -> Result<Option<WorktreeEntry>, GitError> {
    Ok(git
        .list_worktrees()?
        .into_iter()
        .find(|entry| entry.short_branch() == Some(branch)))
}
