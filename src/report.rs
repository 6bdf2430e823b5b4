//! Common envelope fields for protocol results printed by the CLI.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
}

/// Status, message and timing shared by every report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub status: Status,
    pub message: String,
    pub duration_ms: u64,
    /// RFC 3339, taken when the report is built
    pub timestamp: String,
}

impl Envelope {
    pub fn success(message: impl Into<String>, elapsed: Duration) -> Self {
        Self::new(Status::Success, message.into(), elapsed)
    }

    pub fn error(message: impl Into<String>, elapsed: Duration) -> Self {
        Self::new(Status::Error, message.into(), elapsed)
    }

    fn new(status: Status, message: String, elapsed: Duration) -> Self {
        Self {
            status,
            message,
            duration_ms: elapsed.as_millis() as u64,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Failure report; `backup_branch` is set when a squash left one behind
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_branch: Option<String>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>, started: Instant) -> Self {
        Self {
            envelope: Envelope::error(message, started.elapsed()),
            backup_branch: None,
        }
    }

    pub fn with_backup_branch(mut self, backup: Option<&str>) -> Self {
        self.backup_branch = backup.map(str::to_string);
        self
    }
}
