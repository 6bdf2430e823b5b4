//! On-disk lock record and identifier validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LockError;

/// Persisted lock for one issue. Its existence alone means "locked".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Owning session (hyphenated UUID)
    pub session_id: String,
    /// Creation time, epoch seconds
    pub created_at: i64,
    /// Worktree the owner is working in; empty when not yet known
    #[serde(default)]
    pub worktree: String,
    /// Creation time, RFC 3339
    pub created_at_iso: String,
}

impl LockRecord {
    pub fn new(session_id: &str, worktree: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            created_at: now.timestamp(),
            worktree: worktree.to_string(),
            created_at_iso: now.to_rfc3339(),
        }
    }

    /// Same lock, new worktree; creation time is preserved
    pub fn with_worktree(&self, worktree: &str) -> Self {
        Self {
            worktree: worktree.to_string(),
            ..self.clone()
        }
    }

    /// Seconds since creation, clamped at zero for clock skew
    pub fn age_secs(&self, now: DateTime<Utc>) -> u64 {
        (now.timestamp() - self.created_at).max(0) as u64
    }

    pub fn is_owned_by(&self, session_id: &str) -> bool {
        self.session_id.eq_ignore_ascii_case(session_id)
    }
}

/// Reject anything that is not a hyphenated UUID.
///
/// A malformed value here usually means the caller swapped the issue and
/// session arguments.
pub fn validate_session_id(session_id: &str) -> Result<(), LockError> {
    if session_id.len() == 36 && Uuid::try_parse(session_id).is_ok() {
        Ok(())
    } else {
        Err(LockError::InvalidSession(session_id.to_string()))
    }
}

/// File stem for an issue id.
///
/// Path separators, NUL and `%` itself are percent-encoded, so the mapping
/// is injective: distinct issue ids never share a lock file.
pub fn sanitize_issue_id(issue: &str) -> Result<String, LockError> {
    let trimmed = issue.trim();
    if trimmed.is_empty() {
        return Err(LockError::EmptyIssue);
    }

    let mut stem = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            '%' => stem.push_str("%25"),
            '/' => stem.push_str("%2F"),
            '\\' => stem.push_str("%5C"),
            '\0' => stem.push_str("%00"),
            c => stem.push(c),
        }
    }
    Ok(stem)
}

/// Inverse of [`sanitize_issue_id`], for reporting issues found on disk
pub fn issue_id_from_stem(stem: &str) -> String {
    let mut issue = String::with_capacity(stem.len());
    let mut rest = stem;
    while let Some(pos) = rest.find('%') {
        issue.push_str(&rest[..pos]);
        let (decoded, len) = match rest.get(pos..pos + 3) {
            Some("%25") => ('%', 3),
            Some("%2F") => ('/', 3),
            Some("%5C") => ('\\', 3),
            Some("%00") => ('\0', 3),
            _ => ('%', 1),
        };
        issue.push(decoded);
        rest = &rest[pos + len..];
    }
    issue.push_str(rest);
    issue
}
