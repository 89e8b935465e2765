//! Scripted collaborators for unit tests

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use serde_json::{json, Value};

use crate::services::client::{ProjectLister, StatisticsSource};
use crate::services::period::CompletionWindow;
use crate::services::retry::Sleeper;
use crate::types::{ApiError, Project, ProjectId};

/// Records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}

/// In-memory API. Each project replays its scripted responses in order and
/// answers 404 once the script runs out.
#[derive(Debug, Default)]
pub struct FakeApi {
    projects: Vec<Project>,
    listing_errors: RefCell<VecDeque<ApiError>>,
    scripts: RefCell<BTreeMap<ProjectId, VecDeque<Result<Value, ApiError>>>>,
    calls: RefCell<BTreeMap<ProjectId, u32>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.push(project);
        self
    }

    /// Fail the next listing call with `error`.
    pub fn failing_listing(self, error: ApiError) -> Self {
        self.listing_errors.borrow_mut().push_back(error);
        self
    }

    pub fn respond(self, project_id: ProjectId, responses: Vec<Result<Value, ApiError>>) -> Self {
        self.scripts
            .borrow_mut()
            .entry(project_id)
            .or_default()
            .extend(responses);
        self
    }

    /// Statistics calls made for `project_id`.
    pub fn calls(&self, project_id: ProjectId) -> u32 {
        self.calls.borrow().get(&project_id).copied().unwrap_or(0)
    }
}

impl StatisticsSource for FakeApi {
    fn project_statistics(&self, project_id: ProjectId) -> Result<Value, ApiError> {
        *self.calls.borrow_mut().entry(project_id).or_default() += 1;
        self.scripts
            .borrow_mut()
            .get_mut(&project_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(ApiError::Status {
                status: 404,
                trace_id: None,
            }))
    }
}

impl ProjectLister for FakeApi {
    fn list_projects(&self, window: &CompletionWindow) -> Result<Vec<Project>, ApiError> {
        if let Some(err) = self.listing_errors.borrow_mut().pop_front() {
            return Err(err);
        }
        Ok(self
            .projects
            .iter()
            .filter(|p| window.contains(p.completed_at))
            .cloned()
            .collect())
    }
}

/// One-locale statistics payload from `(username, step, words)` triples.
pub fn stats_body(locale: &str, rows: &[(&str, &str, u64)]) -> Value {
    let users: Vec<Value> = rows
        .iter()
        .map(|(user, step, words)| {
            json!({
                "username": user,
                "stepsStatistics": [{
                    "workflowStepName": step,
                    "jobsStatistics": [{"sourceStatistics": {"totalWords": words}}]
                }]
            })
        })
        .collect();
    json!([{"targetLanguage": locale, "usersStatistics": users}])
}
