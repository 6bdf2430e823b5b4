//! Issue-level mutual exclusion backed by the shared filesystem.
//!
//! One JSON file per issue under `<state>/locks/`. A lock is created by
//! writing a temp file and renaming it into place without clobbering, so
//! exactly one of any number of racing processes wins. Locks never expire;
//! stale ones are removed by an operator with `force_release`.

mod manager;
mod outcome;
mod record;

use std::path::PathBuf;

use thiserror::Error;

pub use manager::LockManager;
pub use outcome::{LockListing, LockOutcome, RemoteBranchInfo, LOCKED_GUIDANCE};
pub use record::{issue_id_from_stem, sanitize_issue_id, validate_session_id, LockRecord};

#[derive(Error, Debug)]
pub enum LockError {
    #[error(
        "invalid session id '{0}': expected a UUID such as 123e4567-e89b-12d3-a456-426614174000 \
         (check the argument order: <issue> <session>)"
    )]
    InvalidSession(String),

    #[error("issue id must not be empty")]
    EmptyIssue,

    #[error("issue '{issue}' is locked by session {owner}, not {session}")]
    NotOwner {
        issue: String,
        owner: String,
        session: String,
    },

    #[error("issue '{0}' is not locked")]
    NotLocked(String),

    #[error(
        "lock for '{0}' changed while it was being modified; \
         inspect it with `lanekeeper lock check {0}` and retry"
    )]
    Changed(String),

    #[error(
        "lock file {} is unreadable: {source}; an operator can clear it with `lanekeeper lock force-release`",
        .path.display()
    )]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("lock store I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode lock record: {0}")]
    Encode(#[from] serde_json::Error),
}
