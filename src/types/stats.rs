//! Project and per-user statistic types

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RetryError;

pub type ProjectId = u64;

/// A project as listed by the API. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Raw API status (`FINISHED`, `IN_PROGRESS`, `STARTED`, ...)
    pub status: String,
    /// Target locale, used when a statistics entry omits its own
    pub target_locale: Option<String>,
    /// Completion timestamp; projects without one fall into every window
    pub completed_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: "UNKNOWN".to_string(),
            target_locale: None,
            completed_at: None,
        }
    }
}

/// Words one user processed in one workflow step of one project/locale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStatisticRecord {
    pub project_id: ProjectId,
    /// `None` when the source omitted the username
    pub identity: Option<String>,
    pub locale: String,
    /// Cleaned step name (`translate1` → `translate`)
    pub step: String,
    pub words: u64,
}

/// Broad failure classes surfaced in [`super::RunHealth`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Network, timeout, 429 or 5xx that outlived the retry budget
    Transient,
    /// 4xx or undecodable body; never retried
    Terminal,
    /// Payload had an unexpected shape
    Shape,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn shape(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Shape,
            message: message.into(),
        }
    }
}

impl From<&RetryError> for FetchFailure {
    fn from(err: &RetryError) -> Self {
        let kind = if err.source.is_retryable() {
            FailureKind::Transient
        } else {
            FailureKind::Terminal
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Result of fetching one project's statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectOutcome {
    Success(Vec<UserStatisticRecord>),
    PartialFailure {
        records: Vec<UserStatisticRecord>,
        error: FetchFailure,
    },
    TotalFailure(FetchFailure),
}

impl ProjectOutcome {
    /// Records that can be aggregated (empty for a total failure)
    pub fn records(&self) -> &[UserStatisticRecord] {
        match self {
            Self::Success(records) | Self::PartialFailure { records, .. } => records,
            Self::TotalFailure(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&FetchFailure> {
        match self {
            Self::Success(_) => None,
            Self::PartialFailure { error, .. } | Self::TotalFailure(error) => Some(error),
        }
    }
}

/// One project's outcome plus the bookkeeping the tracker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFetch {
    pub project: Project,
    pub outcome: ProjectOutcome,
    /// Attempts made against the statistics endpoint
    pub attempts: u32,
    pub elapsed: Duration,
    /// Word counts that were negative or non-numeric and counted as 0
    pub anomalies: u32,
}

impl ProjectFetch {
    /// A fetch that needed one clean attempt (handy for callers that already hold records)
    pub fn success(project: Project, records: Vec<UserStatisticRecord>) -> Self {
        Self {
            project,
            outcome: ProjectOutcome::Success(records),
            attempts: 1,
            elapsed: Duration::ZERO,
            anomalies: 0,
        }
    }
}
