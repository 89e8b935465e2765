//! Run-level health accounting

use std::time::Instant;

use tracing::debug;

use crate::types::{ErrorSummary, FetchFailure, ProjectFetch, ProjectOutcome, RetryError, RunHealth};

/// Accumulates project outcomes into a [`RunHealth`]. Never fails.
#[derive(Debug)]
pub struct DegradationTracker {
    started: Instant,
    health: RunHealth,
}

impl Default for DegradationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DegradationTracker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            health: RunHealth::default(),
        }
    }

    pub fn record(&mut self, fetch: &ProjectFetch) {
        self.health.anomalies = self.health.anomalies.saturating_add(u64::from(fetch.anomalies));
        match &fetch.outcome {
            ProjectOutcome::Success(_) => self.health.succeeded += 1,
            ProjectOutcome::PartialFailure { error, .. } => {
                self.health.partial += 1;
                self.push_error(fetch, error);
            }
            ProjectOutcome::TotalFailure(error) => {
                self.health.failed += 1;
                self.push_error(fetch, error);
            }
        }
        debug!(project_id = fetch.project.id, health = %self.health, "recorded outcome");
    }

    /// The project listing itself failed; no project can be attributed.
    pub fn record_listing_failure(&mut self, err: &RetryError) {
        let failure = FetchFailure::from(err);
        self.health.errors.push(ErrorSummary {
            project_id: None,
            project_name: None,
            kind: failure.kind,
            message: format!("project listing failed: {}", failure.message),
            attempts: err.attempts,
        });
    }

    pub fn summary(&self) -> RunHealth {
        RunHealth {
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            ..self.health.clone()
        }
    }

    fn push_error(&mut self, fetch: &ProjectFetch, error: &FetchFailure) {
        self.health.errors.push(ErrorSummary {
            project_id: Some(fetch.project.id),
            project_name: Some(fetch.project.name.clone()),
            kind: error.kind,
            message: error.message.clone(),
            attempts: fetch.attempts,
        });
    }
}
