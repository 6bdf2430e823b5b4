//! Verified squash of a commit window into a single commit.
//!
//! The window is `(base, last]`. A backup branch at `last` is created first
//! and serves only as a diff baseline: after the soft reset and the new
//! commit, the working tree, the tree object, the history below `base` and
//! the commit count are all checked against what was recorded before any
//! mutation. Any failure stops immediately and names the backup branch.
//! Nothing is rolled back automatically.

use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::git::{GitCli, GitError};
use crate::report::Envelope;

/// Default prefix for backup branch names
pub const DEFAULT_BACKUP_PREFIX: &str = "lanekeeper-backup";

#[derive(Error, Debug)]
pub enum SquashError {
    #[error("commit message is empty; write the squashed commit message to the message file")]
    EmptyMessage,

    #[error("git {step} failed: {source}")]
    Git {
        step: &'static str,
        source: GitError,
    },

    #[error(
        "HEAD is at {actual} after checking out '{last}', expected {expected}; \
         pass an unambiguous commit (see `git rev-parse {last}`)"
    )]
    PositionMismatch {
        last: String,
        expected: String,
        actual: String,
    },

    #[error("git {step} failed: {source} (backup branch: {backup})")]
    GitAfterBackup {
        step: &'static str,
        backup: String,
        source: GitError,
    },

    #[error(
        "working tree has uncommitted changes; commit or stash them first (`git status`) \
         (backup branch: {backup})"
    )]
    DirtyWorkingTree { backup: String },

    #[error(
        "base commit '{base}' does not resolve; check it with `git rev-parse {base}` \
         (backup branch: {backup})"
    )]
    UnknownBase { base: String, backup: String },

    #[error(
        "base '{base}' is not an ancestor of '{last}'; pick the commit the work forked from \
         (`git merge-base {base} {last}`) (backup branch: {backup})"
    )]
    BaseNotAncestor {
        base: String,
        last: String,
        backup: String,
    },

    #[error("nothing to squash: no commits after '{base}' (backup branch: {backup})")]
    EmptyWindow { base: String, backup: String },

    #[error(
        "soft reset changed working tree content ({}); restore with `git reset --hard {backup}`",
        .paths.join(", ")
    )]
    ContentChanged { backup: String, paths: Vec<String> },

    #[error(
        "history at and below '{base}' changed during the squash; \
         restore with `git reset --hard {backup}`"
    )]
    HistoryChanged { base: String, backup: String },

    #[error(
        "squashed tree {actual} differs from the original tree {expected}; \
         restore with `git reset --hard {backup}`"
    )]
    TreeMismatch {
        expected: String,
        actual: String,
        backup: String,
    },

    #[error(
        "expected exactly 1 commit after '{base}', found {count}; \
         restore with `git reset --hard {backup}`"
    )]
    CountMismatch {
        base: String,
        count: u64,
        backup: String,
    },
}

impl SquashError {
    /// Backup branch left in place for manual recovery, if one was created
    pub fn backup_branch(&self) -> Option<&str> {
        match self {
            SquashError::EmptyMessage
            | SquashError::Git { .. }
            | SquashError::PositionMismatch { .. } => None,
            SquashError::GitAfterBackup { backup, .. }
            | SquashError::DirtyWorkingTree { backup }
            | SquashError::UnknownBase { backup, .. }
            | SquashError::BaseNotAncestor { backup, .. }
            | SquashError::EmptyWindow { backup, .. }
            | SquashError::ContentChanged { backup, .. }
            | SquashError::HistoryChanged { backup, .. }
            | SquashError::TreeMismatch { backup, .. }
            | SquashError::CountMismatch { backup, .. } => Some(backup),
        }
    }
}

/// What to squash
#[derive(Debug, Clone)]
pub struct SquashRequest {
    /// Exclusive lower bound of the window
    pub base: String,
    /// Inclusive upper bound of the window
    pub last: String,
    pub message: String,
    /// Branch to publish the result under when the squash ran detached
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SquashReport {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub commit: String,
    pub commit_message: String,
    /// Commits in the window before the squash
    pub commit_count: u64,
    /// Branch moved onto the result; set only when the squash ran detached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// False when the backup branch could not be deleted and is still present
    pub backup_deleted: bool,
}

/// Runs the squash protocol in one working directory
pub struct Squasher<'a> {
    git: GitCli<'a>,
    backup_prefix: String,
}

impl<'a> Squasher<'a> {
    pub fn new(git: GitCli<'a>) -> Self {
        Self {
            git,
            backup_prefix: DEFAULT_BACKUP_PREFIX.to_string(),
        }
    }

    pub fn with_backup_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.backup_prefix = prefix.into();
        self
    }

    fn backup_name(&self) -> String {
        format!(
            "{}-{}",
            self.backup_prefix,
            Utc::now().format("%Y%m%d-%H%M%S-%f")
        )
    }

    #[instrument(skip(self, request), fields(base = %request.base, last = %request.last))]
    pub fn squash(&self, request: &SquashRequest) -> Result<SquashReport, SquashError> {
        let started = Instant::now();
        let git = &self.git;
        let base = request.base.as_str();
        let last = request.last.as_str();

        let message = request.message.trim();
        if message.is_empty() {
            return Err(SquashError::EmptyMessage);
        }

        // 1. Move to the last commit and make sure that is where we landed
        git.checkout(last).map_err(|source| SquashError::Git {
            step: "checkout",
            source,
        })?;
        let expected = git.resolve_commit(last).map_err(|source| SquashError::Git {
            step: "rev-parse",
            source,
        })?;
        let actual = git.head_commit().map_err(|source| SquashError::Git {
            step: "rev-parse",
            source,
        })?;
        if actual != expected {
            return Err(SquashError::PositionMismatch {
                last: last.to_string(),
                expected,
                actual,
            });
        }

        // 2. Diff baseline
        let backup = self.backup_name();
        git.create_branch(&backup, "HEAD")
            .map_err(|source| SquashError::Git {
                step: "branch",
                source,
            })?;
        info!(%backup, "Created backup branch");

        let after_backup = |step: &'static str| {
            let backup = backup.clone();
            move |source: GitError| SquashError::GitAfterBackup {
                step,
                backup,
                source,
            }
        };

        // 3.
        if git.is_dirty().map_err(after_backup("status"))? {
            return Err(SquashError::DirtyWorkingTree { backup });
        }

        // 4.
        if !git.commit_exists(base).map_err(after_backup("rev-parse"))? {
            return Err(SquashError::UnknownBase {
                base: base.to_string(),
                backup,
            });
        }
        if !git
            .is_ancestor(base, "HEAD")
            .map_err(after_backup("merge-base"))?
        {
            return Err(SquashError::BaseNotAncestor {
                base: base.to_string(),
                last: last.to_string(),
                backup,
            });
        }

        // 5.
        let window = format!("{base}..HEAD");
        let commit_count = git
            .rev_list_count(&window)
            .map_err(after_backup("rev-list"))?;
        if commit_count == 0 {
            return Err(SquashError::EmptyWindow {
                base: base.to_string(),
                backup,
            });
        }

        // 6. Fingerprint of everything at and below base, plus the tree to preserve
        let fingerprint = git.rev_list(base).map_err(after_backup("rev-list"))?;
        let original_tree = git.tree_of("HEAD").map_err(after_backup("rev-parse"))?;

        // 7.
        git.reset_soft(base).map_err(after_backup("reset"))?;

        // 8.
        let changed = git
            .diff_names_against(&backup)
            .map_err(after_backup("diff"))?;
        if !changed.is_empty() {
            return Err(SquashError::ContentChanged {
                backup,
                paths: changed,
            });
        }

        // 9.
        git.commit(message).map_err(after_backup("commit"))?;

        // 10.
        if git.rev_list(base).map_err(after_backup("rev-list"))? != fingerprint {
            return Err(SquashError::HistoryChanged {
                base: base.to_string(),
                backup,
            });
        }
        let new_tree = git.tree_of("HEAD").map_err(after_backup("rev-parse"))?;
        if new_tree != original_tree {
            return Err(SquashError::TreeMismatch {
                expected: original_tree,
                actual: new_tree,
                backup,
            });
        }

        // 11.
        let final_count = git
            .rev_list_count(&window)
            .map_err(after_backup("rev-list"))?;
        if final_count != 1 {
            return Err(SquashError::CountMismatch {
                base: base.to_string(),
                count: final_count,
                backup,
            });
        }

        let commit = git.head_commit().map_err(after_backup("rev-parse"))?;

        // 12. Publish under the original branch name when we squashed detached
        let mut branch = None;
        if let Some(name) = request.branch.as_deref() {
            if git.is_detached().map_err(after_backup("rev-parse"))? {
                git.force_branch(name, "HEAD")
                    .map_err(after_backup("branch"))?;
                git.checkout(name).map_err(after_backup("checkout"))?;
                info!(branch = name, "Published squashed commit");
                branch = Some(name.to_string());
            }
        }

        // 13. Best effort
        let backup_deleted = match git.delete_branch(&backup, true) {
            Ok(()) => true,
            Err(e) => {
                warn!(%backup, error = %e, "Failed to delete backup branch");
                false
            }
        };

        info!(%commit, commit_count, "Squash complete");
        Ok(SquashReport {
            envelope: Envelope::success(
                format!("Squashed {commit_count} commit(s) after {base} into {commit}"),
                started.elapsed(),
            ),
            commit,
            commit_message: message.to_string(),
            commit_count,
            branch,
            backup_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockGit;
    use std::path::Path;

    const LAST: &str = "1111111111111111111111111111111111111111";
    const SQUASHED: &str = "2222222222222222222222222222222222222222";

    /// A mock repository in which every step of a 3-commit squash succeeds
    fn happy_repo() -> MockGit {
        happy_repo_on("HEAD")
    }

    /// Same, with `current` as the abbreviated HEAD after checkout
    fn happy_repo_on(current: &str) -> MockGit {
        let git = MockGit::new();
        git.on(&["rev-parse", "--verify", "--quiet", "feature^{commit}"], LAST)
            .on(&["rev-parse", "HEAD"], LAST)
            .on(&["rev-parse", "HEAD"], SQUASHED)
            .on(&["rev-parse", "--verify", "--quiet", "main^{commit}"], "base")
            .on(&["rev-list", "--count", "main..HEAD"], "3")
            .on(&["rev-list", "--count", "main..HEAD"], "1")
            .on(&["rev-list", "main"], "base\nroot")
            .on(&["rev-parse", "HEAD^{tree}"], "tree-1")
            .on(&["rev-parse", "--abbrev-ref", "HEAD"], current);
        git
    }

    fn request(branch: Option<&str>) -> SquashRequest {
        SquashRequest {
            base: "main".to_string(),
            last: "feature".to_string(),
            message: "Implement feature\n\nDetails".to_string(),
            branch: branch.map(str::to_string),
        }
    }

    #[test]
    fn test_squash_happy_path_runs_steps_in_order() {
        let git = happy_repo();
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let report = squasher.squash(&request(Some("feature"))).unwrap();
        assert_eq!(report.commit, SQUASHED);
        assert_eq!(report.commit_count, 3);
        assert_eq!(report.branch.as_deref(), Some("feature"));
        assert!(report.backup_deleted);

        let commands = git.commands();
        let position = |prefix: &str| {
            commands
                .iter()
                .position(|c| c.starts_with(prefix))
                .unwrap_or_else(|| panic!("missing {prefix}"))
        };
        assert!(position("checkout --quiet feature") < position("branch lanekeeper-backup-"));
        assert!(position("branch lanekeeper-backup-") < position("status --porcelain"));
        assert!(position("status --porcelain") < position("reset --soft main"));
        assert!(position("reset --soft main") < position("diff --name-only"));
        assert!(position("diff --name-only") < position("commit --quiet"));
        assert!(position("commit --quiet") < position("branch -f feature HEAD"));
        assert!(position("branch -f feature HEAD") < position("branch -D lanekeeper-backup-"));
    }

    #[test]
    fn test_dirty_tree_stops_before_reset() {
        let git = happy_repo();
        git.on(&["status", "--porcelain"], " M src/lib.rs");
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let err = squasher.squash(&request(None)).unwrap_err();
        assert!(matches!(err, SquashError::DirtyWorkingTree { .. }));
        assert!(err.backup_branch().unwrap().starts_with("lanekeeper-backup-"));
        assert!(!git.ran("reset"));
        assert!(!git.ran("commit"));
    }

    #[test]
    fn test_position_mismatch_before_backup() {
        let git = MockGit::new();
        git.on(
            &["rev-parse", "--verify", "--quiet", "feature^{commit}"],
            "ffffffffffffffffffffffffffffffffffffffff",
        )
        .on(&["rev-parse", "HEAD"], LAST);
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let err = squasher.squash(&request(None)).unwrap_err();
        assert!(matches!(err, SquashError::PositionMismatch { .. }));
        assert!(err.backup_branch().is_none());
        assert!(!git.ran("branch lanekeeper-backup-"));
    }

    #[test]
    fn test_unknown_base_names_backup() {
        let git = happy_repo();
        git.fail(
            &["rev-parse", "--verify", "--quiet", "nope^{commit}"],
            1,
            "",
        );
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let mut req = request(None);
        req.base = "nope".to_string();
        let err = squasher.squash(&req).unwrap_err();
        assert!(matches!(err, SquashError::UnknownBase { .. }));
        assert!(err.to_string().contains("backup branch"));
        assert!(!git.ran("reset"));
    }

    #[test]
    fn test_base_not_ancestor_rejected_before_reset() {
        let git = happy_repo();
        git.fail(&["merge-base", "--is-ancestor", "main", "HEAD"], 1, "");
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let err = squasher.squash(&request(None)).unwrap_err();
        assert!(matches!(err, SquashError::BaseNotAncestor { .. }));
        assert!(!git.ran("reset"));
    }

    #[test]
    fn test_content_change_after_reset_is_fatal() {
        let git = happy_repo();
        git.on_prefix(&["diff", "--name-only", "bk-"], "src/lib.rs");
        let squasher =
            Squasher::new(GitCli::new(&git, Path::new("/repo"))).with_backup_prefix("bk");

        let err = squasher.squash(&request(None)).unwrap_err();
        match &err {
            SquashError::ContentChanged { backup, paths } => {
                assert!(backup.starts_with("bk-"));
                assert_eq!(paths, &vec!["src/lib.rs".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!git.ran("commit"));
    }

    #[test]
    fn test_tree_mismatch_reports_backup() {
        let git = happy_repo();
        git.on(&["rev-parse", "HEAD^{tree}"], "tree-2");
        // first call consumes tree-1, second returns tree-2
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let err = squasher.squash(&request(None)).unwrap_err();
        assert!(matches!(err, SquashError::TreeMismatch { .. }));
        assert!(err.to_string().contains("git reset --hard"));
        assert!(!git.ran("branch -D"));
    }

    #[test]
    fn test_count_mismatch_after_commit() {
        let git = MockGit::new();
        git.on(&["rev-parse", "--verify", "--quiet", "feature^{commit}"], LAST)
            .on(&["rev-parse", "HEAD"], LAST)
            .on(&["rev-list", "--count", "main..HEAD"], "3")
            .on(&["rev-list", "--count", "main..HEAD"], "2")
            .on(&["rev-list", "main"], "base")
            .on(&["rev-parse", "HEAD^{tree}"], "tree-1");
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let err = squasher.squash(&request(None)).unwrap_err();
        assert!(matches!(err, SquashError::CountMismatch { count: 2, .. }));
    }

    #[test]
    fn test_history_change_detected() {
        let git = happy_repo();
        git.on(&["rev-list", "main"], "rewritten\nroot");
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let err = squasher.squash(&request(None)).unwrap_err();
        assert!(matches!(err, SquashError::HistoryChanged { .. }));
    }

    #[test]
    fn test_empty_window_rejected() {
        let git = MockGit::new();
        git.on(&["rev-parse", "--verify", "--quiet", "feature^{commit}"], LAST)
            .on(&["rev-parse", "HEAD"], LAST)
            .on(&["rev-list", "--count", "main..HEAD"], "0");
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let err = squasher.squash(&request(None)).unwrap_err();
        assert!(matches!(err, SquashError::EmptyWindow { .. }));
        assert!(!git.ran("reset"));
    }

    #[test]
    fn test_empty_message_rejected_before_git() {
        let git = MockGit::new();
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let mut req = request(None);
        req.message = "  \n".to_string();
        assert!(matches!(
            squasher.squash(&req).unwrap_err(),
            SquashError::EmptyMessage
        ));
        assert!(git.commands().is_empty());
    }

    #[test]
    fn test_backup_delete_failure_does_not_fail_squash() {
        let git = happy_repo();
        git.fail_prefix(&["branch", "-D"], 1, "error: cannot delete branch");
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let report = squasher.squash(&request(None)).unwrap();
        assert!(!report.backup_deleted);
        assert_eq!(report.commit, SQUASHED);
    }

    #[test]
    fn test_attached_branch_is_not_republished() {
        let git = happy_repo_on("feature");
        let squasher = Squasher::new(GitCli::new(&git, Path::new("/repo")));

        let report = squasher.squash(&request(Some("feature"))).unwrap();
        assert_eq!(report.branch, None);
        assert!(!git.ran("branch -f"));
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("branch").is_none());
    }
}
