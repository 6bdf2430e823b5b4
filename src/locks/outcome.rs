//! Lock operation outcomes.
//!
//! Serialized with a `status` tag:
//!
//! | variant          | `status`         | fields                                                       |
//! |------------------|------------------|--------------------------------------------------------------|
//! | `Acquired`       | `acquired`       | issue, session_id, worktree, created_at, already_held        |
//! | `Locked`         | `locked`         | issue, owner, age_secs, worktree, remote_branches, guidance  |
//! | `Updated`        | `updated`        | issue, session_id, worktree                                  |
//! | `Released`       | `released`       | issue, was_locked                                            |
//! | `Error`          | `error`          | message                                                      |
//! | `CheckLocked`    | `check_locked`   | issue, owner, age_secs, worktree, created_at_iso             |
//! | `CheckUnlocked`  | `check_unlocked` | issue                                                        |

use serde::Serialize;

use super::LockError;

/// Fixed guidance returned to a session that finds an issue already locked
pub const LOCKED_GUIDANCE: &str = "Do not investigate or remove this lock. \
Pick a different issue to work on. \
Stale locks left by crashed sessions are cleaned up by a human operator.";

/// Best-effort context about a remote branch that looks related to the issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteBranchInfo {
    pub branch: String,
    pub author: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LockOutcome {
    Acquired {
        issue: String,
        session_id: String,
        worktree: String,
        created_at: i64,
        /// The caller already held this lock; nothing was written
        already_held: bool,
    },
    Locked {
        issue: String,
        owner: String,
        age_secs: u64,
        worktree: String,
        remote_branches: Vec<RemoteBranchInfo>,
        guidance: String,
    },
    Updated {
        issue: String,
        session_id: String,
        worktree: String,
    },
    Released {
        issue: String,
        /// False when there was nothing to release
        was_locked: bool,
    },
    Error {
        message: String,
    },
    CheckLocked {
        issue: String,
        owner: String,
        age_secs: u64,
        worktree: String,
        created_at_iso: String,
    },
    CheckUnlocked {
        issue: String,
    },
}

impl LockOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, LockOutcome::Error { .. })
    }

    /// Owning session for outcomes that name one
    pub fn owner(&self) -> Option<&str> {
        match self {
            LockOutcome::Acquired { session_id, .. } | LockOutcome::Updated { session_id, .. } => {
                Some(session_id)
            }
            LockOutcome::Locked { owner, .. } | LockOutcome::CheckLocked { owner, .. } => {
                Some(owner)
            }
            _ => None,
        }
    }
}

impl From<LockError> for LockOutcome {
    fn from(err: LockError) -> Self {
        LockOutcome::Error {
            message: err.to_string(),
        }
    }
}

/// One entry of [`super::LockManager::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockListing {
    /// Sanitized issue id (the lock file stem)
    pub issue: String,
    pub session_id: String,
    pub age_secs: u64,
    pub worktree: String,
    pub created_at_iso: String,
}
