use std::fmt;

use serde::{Deserialize, Serialize};

use super::{FailureKind, ProjectId};

/// One failed or degraded unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorSummary {
    /// `None` when the failure was not tied to a project (e.g. listing)
    pub project_id: Option<ProjectId>,
    pub project_name: Option<String>,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

/// Run-level health summary; the sole input to alerting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunHealth {
    pub succeeded: u64,
    pub partial: u64,
    pub failed: u64,
    pub errors: Vec<ErrorSummary>,
    /// Word counts coerced to 0 because the source sent garbage
    pub anomalies: u64,
    pub elapsed_ms: u64,
}

impl RunHealth {
    pub fn projects(&self) -> u64 {
        self.succeeded + self.partial + self.failed
    }

    /// At least one project produced data. A run with no projects is not successful.
    pub fn is_successful(&self) -> bool {
        self.succeeded + self.partial > 0
    }
}

impl fmt::Display for RunHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} projects succeeded ({} partial, {} failed)",
            self.succeeded,
            self.projects(),
            self.partial,
            self.failed
        )?;
        if !self.errors.is_empty() {
            write!(f, ", {} error(s)", self.errors.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_some_data() {
        let health = RunHealth {
            failed: 3,
            ..Default::default()
        };
        assert!(!health.is_successful());

        let health = RunHealth {
            partial: 1,
            failed: 3,
            ..Default::default()
        };
        assert!(health.is_successful());
    }

    #[test]
    fn test_empty_run_is_not_successful() {
        assert!(!RunHealth::default().is_successful());
    }

    #[test]
    fn test_display_distinguishes_none_from_all() {
        let none = RunHealth {
            failed: 5,
            ..Default::default()
        };
        let all = RunHealth {
            succeeded: 5,
            ..Default::default()
        };
        assert!(none.to_string().starts_with("0 of 5 projects succeeded"));
        assert!(all.to_string().starts_with("5 of 5 projects succeeded"));
    }
}
