//! Filesystem lock manager.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info, instrument, warn};

use super::outcome::{LockListing, LockOutcome, RemoteBranchInfo, LOCKED_GUIDANCE};
use super::record::{issue_id_from_stem, sanitize_issue_id, validate_session_id, LockRecord};
use super::LockError;
use crate::git::{GitCli, GitGateway};

const LOCK_EXTENSION: &str = "json";

/// Manages lock records in a shared directory.
///
/// The git gateway is only used for read-only diagnostics when an issue is
/// found locked by another session.
pub struct LockManager<'a> {
    lock_dir: PathBuf,
    git: &'a dyn GitGateway,
    repo_dir: PathBuf,
    remote: String,
}

impl<'a> LockManager<'a> {
    pub fn new(lock_dir: PathBuf, git: &'a dyn GitGateway, repo_dir: PathBuf) -> Self {
        Self {
            lock_dir,
            git,
            repo_dir,
            remote: "origin".to_string(),
        }
    }

    /// Remote consulted for diagnostics on contention
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    /// Canonical lock file path for an issue
    pub fn lock_path(&self, issue: &str) -> Result<PathBuf, LockError> {
        let stem = sanitize_issue_id(issue)?;
        Ok(self.lock_dir.join(format!("{stem}.{LOCK_EXTENSION}")))
    }

    /// Claim an issue for a session.
    ///
    /// Contention is an outcome, not an error: losing to another session
    /// (including losing a simultaneous race) returns [`LockOutcome::Locked`].
    #[instrument(skip(self, worktree))]
    pub fn acquire(
        &self,
        issue: &str,
        session_id: &str,
        worktree: Option<&str>,
    ) -> Result<LockOutcome, LockError> {
        validate_session_id(session_id)?;
        let path = self.lock_path(issue)?;
        self.ensure_lock_dir()?;

        if let Some(existing) = read_record(&path)? {
            return Ok(self.existing_lock_outcome(issue, session_id, &existing));
        }

        let record = LockRecord::new(session_id, worktree.unwrap_or_default(), Utc::now());
        let tmp = self.write_temp(&record)?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                info!(issue, session_id, "Lock acquired");
                Ok(LockOutcome::Acquired {
                    issue: issue.to_string(),
                    session_id: record.session_id,
                    worktree: record.worktree,
                    created_at: record.created_at,
                    already_held: false,
                })
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!(issue, session_id, "Lost lock race");
                match read_record(&path)? {
                    Some(winner) => Ok(self.existing_lock_outcome(issue, session_id, &winner)),
                    // Winner already released again; still report the loss
                    None => Ok(self.locked_outcome(issue, "unknown", 0, String::new())),
                }
            }
            Err(e) => Err(LockError::Io {
                path,
                source: e.error,
            }),
        }
    }

    /// Change the recorded worktree of a lock the caller owns
    #[instrument(skip(self))]
    pub fn update(
        &self,
        issue: &str,
        session_id: &str,
        worktree: &str,
    ) -> Result<LockOutcome, LockError> {
        validate_session_id(session_id)?;
        let path = self.lock_path(issue)?;

        let existing = read_record(&path)?.ok_or_else(|| LockError::NotLocked(issue.to_string()))?;
        ensure_owner(issue, session_id, &existing)?;

        let updated = existing.with_worktree(worktree);
        let tmp = self.write_temp(&updated)?;
        replace_if_unchanged(issue, session_id, &path, &existing, tmp)?;

        info!(issue, worktree, "Lock updated");
        Ok(LockOutcome::Updated {
            issue: issue.to_string(),
            session_id: updated.session_id,
            worktree: updated.worktree,
        })
    }

    /// Release a lock the caller owns; releasing an absent lock succeeds
    #[instrument(skip(self))]
    pub fn release(&self, issue: &str, session_id: &str) -> Result<LockOutcome, LockError> {
        validate_session_id(session_id)?;
        let path = self.lock_path(issue)?;

        let Some(existing) = read_record(&path)? else {
            debug!(issue, "Release of unlocked issue");
            return Ok(LockOutcome::Released {
                issue: issue.to_string(),
                was_locked: false,
            });
        };
        ensure_owner(issue, session_id, &existing)?;

        let was_locked = self.remove_if_unchanged(issue, session_id, &path, &existing)?;
        info!(issue, session_id, "Lock released");
        Ok(LockOutcome::Released {
            issue: issue.to_string(),
            was_locked,
        })
    }

    /// Operator escape hatch: delete the lock whoever owns it
    #[instrument(skip(self))]
    pub fn force_release(&self, issue: &str) -> Result<LockOutcome, LockError> {
        let path = self.lock_path(issue)?;
        let was_locked = remove_lock_file(&path)?;
        if was_locked {
            warn!(issue, "Lock force-released");
        }
        Ok(LockOutcome::Released {
            issue: issue.to_string(),
            was_locked,
        })
    }

    /// Read-only status of one issue
    pub fn check(&self, issue: &str) -> Result<LockOutcome, LockError> {
        let path = self.lock_path(issue)?;
        Ok(match read_record(&path)? {
            Some(record) => LockOutcome::CheckLocked {
                issue: issue.to_string(),
                age_secs: record.age_secs(Utc::now()),
                owner: record.session_id,
                worktree: record.worktree,
                created_at_iso: record.created_at_iso,
            },
            None => LockOutcome::CheckUnlocked {
                issue: issue.to_string(),
            },
        })
    }

    /// All current locks, sorted by issue. Malformed files are skipped.
    pub fn list(&self) -> Result<Vec<LockListing>, LockError> {
        let entries = match fs::read_dir(&self.lock_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LockError::Io {
                    path: self.lock_dir.clone(),
                    source,
                })
            }
        };

        let now = Utc::now();
        let mut listings: Vec<LockListing> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(LOCK_EXTENSION))
            .filter_map(|path| {
                let issue = issue_id_from_stem(&path.file_stem()?.to_string_lossy());
                match read_record(&path) {
                    Ok(Some(record)) => Some(LockListing {
                        issue,
                        age_secs: record.age_secs(now),
                        session_id: record.session_id,
                        worktree: record.worktree,
                        created_at_iso: record.created_at_iso,
                    }),
                    Ok(None) => None,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping malformed lock file");
                        None
                    }
                }
            })
            .collect();

        listings.sort_by(|a, b| a.issue.cmp(&b.issue));
        Ok(listings)
    }

    fn ensure_lock_dir(&self) -> Result<(), LockError> {
        fs::create_dir_all(&self.lock_dir).map_err(|source| LockError::Io {
            path: self.lock_dir.clone(),
            source,
        })
    }

    /// Delete the lock only if it is still the record the caller checked.
    ///
    /// The file is first renamed to a private name, so a lock re-created by
    /// someone else after a force-release is never deleted; it is put back
    /// and reported as theirs.
    fn remove_if_unchanged(
        &self,
        issue: &str,
        session_id: &str,
        path: &Path,
        expected: &LockRecord,
    ) -> Result<bool, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        let claimed = Builder::new()
            .prefix(".release-")
            .suffix(".tmp")
            .tempfile_in(&self.lock_dir)
            .map_err(io_err)?
            .into_temp_path();
        match fs::rename(path, &claimed) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(source) => return Err(io_err(source)),
        }

        let current = read_record(&claimed);
        if matches!(&current, Ok(Some(record)) if record == expected) {
            // `claimed` is deleted on drop
            return Ok(true);
        }

        // Put back whatever was there before reporting why
        match fs::hard_link(&claimed, path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(issue, "Lock re-created during release; keeping the newest record");
            }
            Err(source) => return Err(io_err(source)),
        }
        ensure_unchanged(issue, session_id, expected, current?.as_ref())?;
        Ok(false)
    }

    /// Fully written temp file beside the lock path, ready to be renamed
    fn write_temp(&self, record: &LockRecord) -> Result<NamedTempFile, LockError> {
        let io_err = |source| LockError::Io {
            path: self.lock_dir.clone(),
            source,
        };

        let mut tmp = Builder::new()
            .prefix(".lock-")
            .suffix(".tmp")
            .tempfile_in(&self.lock_dir)
            .map_err(io_err)?;
        let contents = serde_json::to_string_pretty(record)?;
        tmp.write_all(contents.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        Ok(tmp)
    }

    fn existing_lock_outcome(
        &self,
        issue: &str,
        session_id: &str,
        existing: &LockRecord,
    ) -> LockOutcome {
        if existing.is_owned_by(session_id) {
            debug!(issue, session_id, "Lock already held by caller");
            return LockOutcome::Acquired {
                issue: issue.to_string(),
                session_id: existing.session_id.clone(),
                worktree: existing.worktree.clone(),
                created_at: existing.created_at,
                already_held: true,
            };
        }

        info!(issue, owner = %existing.session_id, "Issue locked by another session");
        self.locked_outcome(
            issue,
            &existing.session_id,
            existing.age_secs(Utc::now()),
            existing.worktree.clone(),
        )
    }

    fn locked_outcome(&self, issue: &str, owner: &str, age_secs: u64, worktree: String) -> LockOutcome {
        LockOutcome::Locked {
            issue: issue.to_string(),
            owner: owner.to_string(),
            age_secs,
            worktree,
            remote_branches: self.remote_context(issue),
            guidance: LOCKED_GUIDANCE.to_string(),
        }
    }

    /// Author and date of remote branches named after the issue. Never fails.
    fn remote_context(&self, issue: &str) -> Vec<RemoteBranchInfo> {
        let git = GitCli::new(self.git, &self.repo_dir);
        let branches = match git.remote_branches_matching(&self.remote, issue) {
            Ok(branches) => branches,
            Err(e) => {
                debug!(error = %e, "Remote branch lookup failed");
                return Vec::new();
            }
        };

        branches
            .into_iter()
            .filter_map(|branch| match git.last_author_date(&branch) {
                Ok((author, date)) => Some(RemoteBranchInfo {
                    branch,
                    author,
                    date,
                }),
                Err(e) => {
                    debug!(%branch, error = %e, "Remote branch details unavailable");
                    None
                }
            })
            .collect()
    }
}

fn ensure_owner(issue: &str, session_id: &str, record: &LockRecord) -> Result<(), LockError> {
    if record.is_owned_by(session_id) {
        Ok(())
    } else {
        Err(LockError::NotOwner {
            issue: issue.to_string(),
            owner: record.session_id.clone(),
            session: session_id.to_string(),
        })
    }
}

/// Fails unless `current` is exactly the record the caller validated
fn ensure_unchanged(
    issue: &str,
    session_id: &str,
    expected: &LockRecord,
    current: Option<&LockRecord>,
) -> Result<(), LockError> {
    let current = current.ok_or_else(|| LockError::NotLocked(issue.to_string()))?;
    ensure_owner(issue, session_id, current)?;
    if current == expected {
        Ok(())
    } else {
        Err(LockError::Changed(issue.to_string()))
    }
}

/// Swap in a rewritten record after re-reading the lock.
///
/// The re-read narrows, but cannot close, the window in which a
/// force-release followed by another session's acquire could be overwritten.
fn replace_if_unchanged(
    issue: &str,
    session_id: &str,
    path: &Path,
    expected: &LockRecord,
    tmp: NamedTempFile,
) -> Result<(), LockError> {
    ensure_unchanged(issue, session_id, expected, read_record(path)?.as_ref())?;
    tmp.persist(path).map_err(|e| LockError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

fn read_record(path: &Path) -> Result<Option<LockRecord>, LockError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LockError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| LockError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Returns whether a file was actually removed
fn remove_lock_file(path: &Path) -> Result<bool, LockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(LockError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockGit;
    use tempfile::TempDir;

    const SESSION_A: &str = "aaaaaaaa-0000-4000-8000-000000000001";
    const SESSION_B: &str = "bbbbbbbb-0000-4000-8000-000000000002";

    fn manager<'a>(temp: &TempDir, git: &'a MockGit) -> LockManager<'a> {
        LockManager::new(temp.path().join("locks"), git, temp.path().to_path_buf())
    }

    fn write_raw(manager: &LockManager<'_>, issue: &str, record: &LockRecord) {
        fs::create_dir_all(manager.lock_dir()).unwrap();
        let path = manager.lock_path(issue).unwrap();
        fs::write(path, serde_json::to_string(record).unwrap()).unwrap();
    }

    #[test]
    fn test_acquire_then_other_session_is_locked_out() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        let first = locks.acquire("2.1-foo", SESSION_A, Some("/wt/a")).unwrap();
        assert!(matches!(first, LockOutcome::Acquired { already_held: false, .. }));

        let second = locks.acquire("2.1-foo", SESSION_B, None).unwrap();
        match second {
            LockOutcome::Locked {
                owner,
                worktree,
                guidance,
                ..
            } => {
                assert_eq!(owner, SESSION_A);
                assert_eq!(worktree, "/wt/a");
                assert_eq!(guidance, LOCKED_GUIDANCE);
            }
            other => panic!("expected locked, got {other:?}"),
        }
    }

    #[test]
    fn test_reacquire_by_owner_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        locks.acquire("2.1-foo", SESSION_A, Some("/wt/a")).unwrap();
        let path = locks.lock_path("2.1-foo").unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let again = locks.acquire("2.1-foo", SESSION_A, Some("/wt/other")).unwrap();
        assert!(matches!(again, LockOutcome::Acquired { already_held: true, .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert_eq!(locks.list().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_session_rejected_before_touching_disk() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        let err = locks.acquire(SESSION_A, "2.1-foo", None).unwrap_err();
        assert!(matches!(err, LockError::InvalidSession(_)));
        assert!(!locks.lock_dir().exists());
    }

    #[test]
    fn test_locked_outcome_includes_remote_context() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        git.on(
            &["for-each-ref", "--format=%(refname:short)", "refs/remotes/origin/"],
            "origin/main\norigin/2.1-foo-impl",
        )
        .on(
            &["log", "-1", "--format=%an%x09%aI", "origin/2.1-foo-impl"],
            "Ada\t2026-01-02T03:04:05+00:00",
        );
        let locks = manager(&temp, &git);

        locks.acquire("2.1-foo", SESSION_A, None).unwrap();
        let outcome = locks.acquire("2.1-foo", SESSION_B, None).unwrap();

        let LockOutcome::Locked { remote_branches, .. } = outcome else {
            panic!("expected locked");
        };
        assert_eq!(remote_branches.len(), 1);
        assert_eq!(remote_branches[0].branch, "origin/2.1-foo-impl");
        assert_eq!(remote_branches[0].author, "Ada");
    }

    #[test]
    fn test_remote_lookup_failure_is_swallowed() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        git.fail(
            &["for-each-ref", "--format=%(refname:short)", "refs/remotes/origin/"],
            128,
            "fatal: not a git repository",
        );
        let locks = manager(&temp, &git);

        locks.acquire("2.1-foo", SESSION_A, None).unwrap();
        let outcome = locks.acquire("2.1-foo", SESSION_B, None).unwrap();
        assert!(matches!(outcome, LockOutcome::Locked { ref remote_branches, .. } if remote_branches.is_empty()));
    }

    #[test]
    fn test_update_preserves_creation_time() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        let created = Utc::now() - chrono::Duration::seconds(300);
        write_raw(&locks, "2.1-foo", &LockRecord::new(SESSION_A, "", created));

        let outcome = locks.update("2.1-foo", SESSION_A, "/wt/new").unwrap();
        assert!(matches!(outcome, LockOutcome::Updated { ref worktree, .. } if worktree == "/wt/new"));

        let path = locks.lock_path("2.1-foo").unwrap();
        let stored: LockRecord = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(stored.created_at, created.timestamp());
        assert_eq!(stored.worktree, "/wt/new");
    }

    #[test]
    fn test_update_by_non_owner_fails() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        locks.acquire("2.1-foo", SESSION_A, Some("/wt/a")).unwrap();
        let err = locks.update("2.1-foo", SESSION_B, "/wt/b").unwrap_err();
        assert!(matches!(err, LockError::NotOwner { .. }));

        let err = locks.update("9.9-none", SESSION_A, "/wt/b").unwrap_err();
        assert!(matches!(err, LockError::NotLocked(_)));
    }

    #[test]
    fn test_release_by_non_owner_leaves_record_intact() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        locks.acquire("2.1-foo", SESSION_A, None).unwrap();
        let err = locks.release("2.1-foo", SESSION_B).unwrap_err();
        assert!(matches!(err, LockError::NotOwner { ref owner, .. } if owner == SESSION_A));
        assert!(locks.lock_path("2.1-foo").unwrap().exists());
    }

    #[test]
    fn test_release_by_owner_and_idempotent_release() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        locks.acquire("2.1-foo", SESSION_A, None).unwrap();
        let released = locks.release("2.1-foo", SESSION_A).unwrap();
        assert!(matches!(released, LockOutcome::Released { was_locked: true, .. }));

        let again = locks.release("2.1-foo", SESSION_A).unwrap();
        assert!(matches!(again, LockOutcome::Released { was_locked: false, .. }));
    }

    #[test]
    fn test_force_release_ignores_owner() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        locks.acquire("2.1-foo", SESSION_A, None).unwrap();
        let outcome = locks.force_release("2.1-foo").unwrap();
        assert!(matches!(outcome, LockOutcome::Released { was_locked: true, .. }));
        assert!(matches!(
            locks.check("2.1-foo").unwrap(),
            LockOutcome::CheckUnlocked { .. }
        ));
    }

    #[test]
    fn test_check_reports_age_owner_and_worktree() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        let created = Utc::now() - chrono::Duration::seconds(120);
        write_raw(&locks, "2.1-foo", &LockRecord::new(SESSION_A, "/wt/a", created));

        match locks.check("2.1-foo").unwrap() {
            LockOutcome::CheckLocked {
                owner,
                age_secs,
                worktree,
                ..
            } => {
                assert_eq!(owner, SESSION_A);
                assert!((120..=122).contains(&age_secs), "age was {age_secs}");
                assert_eq!(worktree, "/wt/a");
            }
            other => panic!("expected check_locked, got {other:?}"),
        }
    }

    #[test]
    fn test_list_skips_malformed_and_temp_files() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        locks.acquire("b-issue", SESSION_A, None).unwrap();
        locks.acquire("a-issue", SESSION_B, None).unwrap();
        fs::write(locks.lock_dir().join("broken.json"), "{not json").unwrap();
        fs::write(locks.lock_dir().join(".lock-abc.tmp"), "{}").unwrap();

        let listed = locks.list().unwrap();
        let issues: Vec<&str> = listed.iter().map(|l| l.issue.as_str()).collect();
        assert_eq!(issues, vec!["a-issue", "b-issue"]);
    }

    #[test]
    fn test_list_without_lock_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        assert!(locks.list().unwrap().is_empty());
    }

    #[test]
    fn test_release_keeps_lock_recreated_by_another_session() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        locks.acquire("2.1-foo", SESSION_A, None).unwrap();
        let path = locks.lock_path("2.1-foo").unwrap();
        let seen = read_record(&path).unwrap().unwrap();

        // Force-release and re-acquire by B after A read its record
        locks.force_release("2.1-foo").unwrap();
        locks.acquire("2.1-foo", SESSION_B, None).unwrap();

        let err = locks
            .remove_if_unchanged("2.1-foo", SESSION_A, &path, &seen)
            .unwrap_err();
        assert!(matches!(err, LockError::NotOwner { ref owner, .. } if owner == SESSION_B));
        assert_eq!(read_record(&path).unwrap().unwrap().session_id, SESSION_B);

        let leftovers: Vec<_> = fs::read_dir(locks.lock_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".release-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_update_does_not_overwrite_newer_lock() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        locks.acquire("2.1-foo", SESSION_A, Some("/wt/a")).unwrap();
        let path = locks.lock_path("2.1-foo").unwrap();
        let seen = read_record(&path).unwrap().unwrap();
        let tmp = locks.write_temp(&seen.with_worktree("/wt/stale")).unwrap();

        locks.force_release("2.1-foo").unwrap();
        locks.acquire("2.1-foo", SESSION_B, Some("/wt/b")).unwrap();

        let err = replace_if_unchanged("2.1-foo", SESSION_A, &path, &seen, tmp).unwrap_err();
        assert!(matches!(err, LockError::NotOwner { .. }));
        let current = read_record(&path).unwrap().unwrap();
        assert_eq!(current.session_id, SESSION_B);
        assert_eq!(current.worktree, "/wt/b");
    }

    #[test]
    fn test_issues_differing_only_by_separator_do_not_contend() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        let first = locks.acquire("a/b", SESSION_A, None).unwrap();
        let second = locks.acquire("a_b", SESSION_B, None).unwrap();
        assert!(matches!(first, LockOutcome::Acquired { .. }));
        assert!(matches!(second, LockOutcome::Acquired { .. }));

        let issues: Vec<String> = locks.list().unwrap().into_iter().map(|l| l.issue).collect();
        assert_eq!(issues, vec!["a/b".to_string(), "a_b".to_string()]);
    }

    #[test]
    fn test_issue_with_separators_stays_inside_lock_dir() {
        let temp = TempDir::new().unwrap();
        let git = MockGit::new();
        let locks = manager(&temp, &git);

        locks.acquire("../escape", SESSION_A, None).unwrap();
        let path = locks.lock_path("../escape").unwrap();
        assert_eq!(path.parent().unwrap(), locks.lock_dir());
        assert!(path.exists());
    }
}
