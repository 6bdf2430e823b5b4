//! Typed git operations on top of a [`GitGateway`].
//!
//! Uses the git CLI directly (rather than libgit2) so hooks, worktrees and
//! repository configuration behave exactly as they do for a human.

use std::path::{Path, PathBuf};

use tracing::instrument;

use super::gateway::{GitError, GitGateway};

/// Git operations bound to one working directory
#[derive(Clone, Copy)]
pub struct GitCli<'a> {
    git: &'a dyn GitGateway,
    dir: &'a Path,
}

impl<'a> GitCli<'a> {
    pub fn new(git: &'a dyn GitGateway, dir: &'a Path) -> Self {
        Self { git, dir }
    }

    pub fn dir(&self) -> &Path {
        self.dir
    }

    /// Run raw git arguments in this directory
    pub fn run(&self, args: &[&str]) -> Result<String, GitError> {
        self.git.run(self.dir, args)
    }

    /// Get the current branch name ("HEAD" when detached)
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn current_branch(&self) -> Result<String, GitError> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Check if HEAD is detached from any branch
    pub fn is_detached(&self) -> Result<bool, GitError> {
        Ok(self.current_branch()? == "HEAD")
    }

    /// Check if the working directory has staged, unstaged or untracked changes
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn is_dirty(&self) -> Result<bool, GitError> {
        let output = self.run(&["status", "--porcelain"])?;
        Ok(!output.is_empty())
    }

    /// Resolve a revision to a full commit hash
    pub fn resolve_commit(&self, rev: &str) -> Result<String, GitError> {
        let spec = format!("{rev}^{{commit}}");
        self.run(&["rev-parse", "--verify", "--quiet", &spec])
    }

    /// Check whether a revision resolves to a commit
    pub fn commit_exists(&self, rev: &str) -> Result<bool, GitError> {
        match self.resolve_commit(rev) {
            Ok(_) => Ok(true),
            Err(GitError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check whether a local branch exists
    pub fn branch_exists(&self, branch: &str) -> Result<bool, GitError> {
        let refname = format!("refs/heads/{branch}");
        match self.run(&["show-ref", "--verify", "--quiet", &refname]) {
            Ok(_) => Ok(true),
            Err(GitError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get the HEAD commit SHA
    pub fn head_commit(&self) -> Result<String, GitError> {
        self.run(&["rev-parse", "HEAD"])
    }

    /// Tree object id of a revision
    pub fn tree_of(&self, rev: &str) -> Result<String, GitError> {
        let spec = format!("{rev}^{{tree}}");
        self.run(&["rev-parse", &spec])
    }

    /// Number of commits in a revision range such as `base..HEAD`
    pub fn rev_list_count(&self, range: &str) -> Result<u64, GitError> {
        let output = self.run(&["rev-list", "--count", range])?;
        output
            .trim()
            .parse()
            .map_err(|_| GitError::UnexpectedOutput {
                command: format!("rev-list --count {range}"),
                output,
            })
    }

    /// Every commit hash reachable from `rev`, newest first
    pub fn rev_list(&self, rev: &str) -> Result<Vec<String>, GitError> {
        let output = self.run(&["rev-list", rev])?;
        Ok(output.lines().map(str::to_string).collect())
    }

    /// Whether `ancestor` is an ancestor of (or equal to) `descendant`
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, GitError> {
        match self.run(&["merge-base", "--is-ancestor", ancestor, descendant]) {
            Ok(_) => Ok(true),
            Err(e) if e.exit_code() == Some(1) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Subject line of a commit
    pub fn subject(&self, rev: &str) -> Result<String, GitError> {
        self.run(&["log", "-1", "--format=%s", rev])
    }

    /// Number of parents of a commit
    pub fn parent_count(&self, rev: &str) -> Result<usize, GitError> {
        let output = self.run(&["rev-list", "--parents", "-n", "1", rev])?;
        let words = output.split_whitespace().count();
        if words == 0 {
            return Err(GitError::UnexpectedOutput {
                command: format!("rev-list --parents -n 1 {rev}"),
                output,
            });
        }
        Ok(words - 1)
    }

    /// Paths whose working-tree content differs from `rev`
    pub fn diff_names_against(&self, rev: &str) -> Result<Vec<String>, GitError> {
        let output = self.run(&["diff", "--name-only", rev])?;
        Ok(output
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// One-line summaries for a range, newest first, capped at `max`
    pub fn log_oneline(&self, range: &str, max: usize) -> Result<Vec<String>, GitError> {
        let limit = format!("-{max}");
        let output = self.run(&["log", "--oneline", &limit, range])?;
        Ok(output.lines().map(str::to_string).collect())
    }

    pub fn checkout(&self, rev: &str) -> Result<(), GitError> {
        self.run(&["checkout", "--quiet", rev]).map(|_| ())
    }

    /// Create a new branch at `start`
    #[instrument(skip_all, fields(dir = %self.dir.display(), branch = %branch, start = %start))]
    pub fn create_branch(&self, branch: &str, start: &str) -> Result<(), GitError> {
        self.run(&["branch", branch, start]).map(|_| ())
    }

    /// Point `branch` at `target`, creating or moving it
    #[instrument(skip_all, fields(dir = %self.dir.display(), branch = %branch, target = %target))]
    pub fn force_branch(&self, branch: &str, target: &str) -> Result<(), GitError> {
        self.run(&["branch", "-f", branch, target]).map(|_| ())
    }

    /// Delete a local branch
    #[instrument(skip_all, fields(dir = %self.dir.display(), branch = %branch, force = force))]
    pub fn delete_branch(&self, branch: &str, force: bool) -> Result<(), GitError> {
        let flag = if force { "-D" } else { "-d" };
        self.run(&["branch", flag, branch]).map(|_| ())
    }

    /// Move the branch pointer only; index and working tree are untouched
    #[instrument(skip_all, fields(dir = %self.dir.display(), rev = %rev))]
    pub fn reset_soft(&self, rev: &str) -> Result<(), GitError> {
        self.run(&["reset", "--soft", rev]).map(|_| ())
    }

    /// Commit whatever is staged
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn commit(&self, message: &str) -> Result<(), GitError> {
        self.run(&["commit", "--quiet", "-m", message]).map(|_| ())
    }

    /// Fast-forward the current branch to `branch`, never creating a merge commit
    #[instrument(skip_all, fields(dir = %self.dir.display(), branch = %branch))]
    pub fn merge_ff_only(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["merge", "--ff-only", branch]).map(|_| ())
    }

    /// Absolute path of this working copy's private git directory
    pub fn git_dir(&self) -> Result<String, GitError> {
        self.run(&["rev-parse", "--absolute-git-dir"])
    }

    /// Git directory shared by the main checkout and every linked worktree
    pub fn common_dir(&self) -> Result<PathBuf, GitError> {
        let output = self.run(&["rev-parse", "--git-common-dir"])?;
        let path = PathBuf::from(&output);
        // Relative output is relative to the directory git ran in
        Ok(if path.is_absolute() {
            path
        } else {
            self.dir.join(path)
        })
    }

    /// Remote-tracking branches under `remote` whose name contains `needle`
    pub fn remote_branches_matching(
        &self,
        remote: &str,
        needle: &str,
    ) -> Result<Vec<String>, GitError> {
        let pattern = format!("refs/remotes/{remote}/");
        let output = self.run(&["for-each-ref", "--format=%(refname:short)", &pattern])?;
        Ok(output
            .lines()
            .filter(|name| name.contains(needle))
            .map(str::to_string)
            .collect())
    }

    /// Author name and ISO date of the tip of `rev`
    pub fn last_author_date(&self, rev: &str) -> Result<(String, String), GitError> {
        let output = self.run(&["log", "-1", "--format=%an%x09%aI", rev])?;
        match output.split_once('\t') {
            Some((author, date)) => Ok((author.to_string(), date.to_string())),
            None => Err(GitError::UnexpectedOutput {
                command: format!("log -1 {rev}"),
                output,
            }),
        }
    }

    /// Remove a worktree; refuses when it has local modifications
    #[instrument(skip_all, fields(dir = %self.dir.display(), worktree = %worktree_path.display()))]
    pub fn remove_worktree(&self, worktree_path: &Path) -> Result<(), GitError> {
        let worktree_str = worktree_path.to_string_lossy();
        self.run(&["worktree", "remove", &worktree_str]).map(|_| ())
    }

    /// List all worktrees
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn list_worktrees(&self) -> Result<Vec<WorktreeEntry>, GitError> {
        let output = self.run(&["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_list(&output))
    }
}

/// Entry from `git worktree list --porcelain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeEntry {
    pub path: String,
    /// Full ref name, e.g. `refs/heads/task-1`
    pub branch: Option<String>,
    pub head: Option<String>,
    pub bare: bool,
}

impl WorktreeEntry {
    /// Branch name without the `refs/heads/` prefix
    pub fn short_branch(&self) -> Option<&str> {
        self.branch
            .as_deref()
            .map(|b| b.strip_prefix("refs/heads/").unwrap_or(b))
    }
}

fn parse_worktree_list(output: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(WorktreeEntry {
                path: path.to_string(),
                branch: None,
                head: None,
                bare: false,
            });
        } else if let Some(head) = line.strip_prefix("HEAD ") {
            if let Some(ref mut entry) = current {
                entry.head = Some(head.to_string());
            }
        } else if let Some(branch) = line.strip_prefix("branch ") {
            if let Some(ref mut entry) = current {
                entry.branch = Some(branch.to_string());
            }
        } else if line == "bare" {
            if let Some(ref mut entry) = current {
                entry.bare = true;
            }
        }
    }

    if let Some(entry) = current {
        entries.push(entry);
    }

    entries
}
