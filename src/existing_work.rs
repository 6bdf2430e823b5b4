//! Detects unmerged commits already present in a worktree.
//!
//! Informational only: it helps decide between resuming and starting fresh,
//! so every failure degrades to "no existing work" instead of an error.

use serde::Serialize;
use tracing::{debug, warn};

use crate::git::GitCli;

/// Maximum number of one-line summaries captured
pub const MAX_SUMMARY_COMMITS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExistingWork {
    pub base: String,
    pub commits_ahead: u64,
    /// Up to five `git log --oneline` lines, newest first, newline-joined
    pub summary: String,
}

impl ExistingWork {
    pub fn has_work(&self) -> bool {
        self.commits_ahead > 0
    }
}

/// Count commits on HEAD that are not in `base`
pub fn detect_existing_work(git: &GitCli<'_>, base: &str) -> ExistingWork {
    let range = format!("{base}..HEAD");

    let commits_ahead = match git.rev_list_count(&range) {
        Ok(count) => count,
        Err(e) => {
            warn!(%range, error = %e, "Could not count commits ahead; assuming none");
            0
        }
    };

    let summary = if commits_ahead > 0 {
        match git.log_oneline(&range, MAX_SUMMARY_COMMITS) {
            Ok(lines) => lines.join("\n"),
            Err(e) => {
                debug!(error = %e, "Could not summarise existing commits");
                String::new()
            }
        }
    } else {
        String::new()
    };

    ExistingWork {
        base: base.to_string(),
        commits_ahead,
        summary,
    }
}
