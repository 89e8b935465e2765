//! End-to-end reporting run
//!
//! Lists the year-to-date projects once, fetches every project once, and
//! derives both tables from the same outcomes: the YTD table from all of
//! them, the monthly table from those completed inside the report month.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info, info_span, warn};

use crate::services::aggregator::Aggregator;
use crate::services::client::{ProjectLister, StatisticsSource};
use crate::services::degradation::DegradationTracker;
use crate::services::fetcher::ProjectStatisticsFetcher;
use crate::services::notifier::Notice;
use crate::services::period::{CompletionWindow, ReportingPeriod};
use crate::services::report::{summary_text, Report, ReportSection, ReportWriter};
use crate::services::retry::{RetryableCaller, Sleeper, ThreadSleeper};
use crate::types::{AggregateTable, ProjectFetch, Result, RunHealth};

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    pub report_path: PathBuf,
    pub monthly: AggregateTable,
    pub year_to_date: AggregateTable,
}

impl RunOutcome {
    pub fn health(&self) -> &RunHealth {
        &self.report.health
    }

    pub fn is_successful(&self) -> bool {
        self.report.health.is_successful()
    }

    /// Success confirmation, or a failure alert when no project produced data.
    pub fn notice(&self) -> Notice {
        if self.is_successful() {
            Notice::Success {
                subject: self.report.subject(),
                body: summary_text(&self.report, &self.monthly, &self.year_to_date),
                report_path: self.report_path.clone(),
            }
        } else {
            Notice::Failure {
                subject: format!("XTM report failed - {}", self.report.report_month),
                message: format!(
                    "{}. Partial report: {}",
                    self.report.health,
                    self.report_path.display()
                ),
            }
        }
    }
}

pub struct ReportPipeline<'a, A, W, S = ThreadSleeper> {
    api: &'a A,
    writer: &'a W,
    caller: RetryableCaller<S>,
    aggregator: Aggregator,
}

impl<'a, A, W, S> ReportPipeline<'a, A, W, S>
where
    A: StatisticsSource + ProjectLister,
    W: ReportWriter,
    S: Sleeper,
{
    pub fn new(api: &'a A, writer: &'a W, caller: RetryableCaller<S>, aggregator: Aggregator) -> Self {
        Self {
            api,
            writer,
            caller,
            aggregator,
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// One complete run. Only report persistence can fail it; every
    /// project-level problem is folded into the returned health instead.
    pub fn run(&self, period: &ReportingPeriod) -> Result<RunOutcome> {
        let _span = info_span!("run", month = %period.month_label()).entered();
        let mut tracker = DegradationTracker::new();

        let fetches = fetch_window(self.api, &self.caller, &period.year_to_date(), &mut tracker);
        let monthly_window = period.monthly();
        let monthly_fetches: Vec<&ProjectFetch> = fetches
            .iter()
            .filter(|f| monthly_window.contains(f.project.completed_at))
            .collect();

        let monthly = self.aggregator.aggregate(monthly_fetches.iter().copied());
        let year_to_date = self.aggregator.aggregate(&fetches);

        let monthly_section = ReportSection::new(
            monthly_window,
            Aggregator::project_stats(monthly_fetches.iter().copied().map(|f| &f.project)),
            &monthly,
            &self.aggregator.users(monthly_fetches.iter().copied()),
        );
        let ytd_section = ReportSection::new(
            period.year_to_date(),
            Aggregator::project_stats(fetches.iter().map(|f| &f.project)),
            &year_to_date,
            &self.aggregator.users(&fetches),
        );

        let health = tracker.summary();
        let report = Report::new(period, Utc::now(), health, monthly_section, ytd_section);
        let report_path = self.writer.write(period, &report)?;

        info!(
            health = %report.health,
            monthly_words = monthly.grand_total(),
            ytd_words = year_to_date.grand_total(),
            "run complete"
        );

        Ok(RunOutcome {
            report,
            report_path,
            monthly,
            year_to_date,
        })
    }
}

/// List the projects in `window` and fetch each one. A listing failure is
/// recorded against the run and yields no projects.
pub fn fetch_window<A, S>(
    api: &A,
    caller: &RetryableCaller<S>,
    window: &CompletionWindow,
    tracker: &mut DegradationTracker,
) -> Vec<ProjectFetch>
where
    A: StatisticsSource + ProjectLister,
    S: Sleeper,
{
    let projects = match caller.invoke(|_| api.list_projects(window)) {
        Ok(listed) => listed.value,
        Err(err) => {
            error!(error = %err, "could not list projects");
            tracker.record_listing_failure(&err);
            return Vec::new();
        }
    };
    info!(count = projects.len(), "projects to fetch");

    let fetcher = ProjectStatisticsFetcher::new(api, caller);
    projects
        .iter()
        .map(|project| {
            let fetch = fetcher.fetch(project);
            tracker.record(&fetch);
            fetch
        })
        .collect()
}

/// Repeat a whole run up to `max_runs` times while it errors or produces no
/// data. Systemic errors are returned at once: re-running cannot fix them.
///
/// Each run must rebuild its state from scratch; `run` does, which makes a
/// repeat safe (no cell is ever incremented twice across runs).
pub fn run_with_restarts<F>(max_runs: u32, mut run: F) -> Result<RunOutcome>
where
    F: FnMut(u32) -> Result<RunOutcome>,
{
    let max_runs = max_runs.max(1);
    let mut attempt = 1;
    loop {
        match run(attempt) {
            Ok(outcome) if outcome.is_successful() || attempt >= max_runs => return Ok(outcome),
            Ok(outcome) => warn!(attempt, max_runs, health = %outcome.report.health, "run produced no data, restarting"),
            Err(e) if e.is_systemic() || attempt >= max_runs => return Err(e),
            Err(e) => warn!(attempt, max_runs, error = %e, "run failed, restarting"),
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::exclusion::ExclusionFilter;
    use crate::services::fake::{stats_body, FakeApi, RecordingSleeper};
    use crate::services::normalizer::LocaleTable;
    use crate::services::report::JsonReportWriter;
    use crate::services::retry::RetryPolicy;
    use crate::types::{ApiError, Project, XtmError};
    use chrono::{NaiveDate, TimeZone};
    use std::cell::Cell;
    use std::time::Duration;
    use tempfile::TempDir;

    fn period() -> ReportingPeriod {
        ReportingPeriod::for_month(2024, 3, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()).unwrap()
    }

    fn project(id: u64, status: &str, month: u32) -> Project {
        Project {
            status: status.to_string(),
            completed_at: Some(Utc.with_ymd_and_hms(2024, month, 10, 12, 0, 0).unwrap()),
            ..Project::new(id, format!("project {id}"))
        }
    }

    fn caller() -> RetryableCaller<RecordingSleeper> {
        RetryableCaller::with_sleeper(
            RetryPolicy {
                max_attempts: 4,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
                attempt_timeout: Duration::from_secs(1),
            },
            RecordingSleeper::default(),
        )
    }

    fn aggregator() -> Aggregator {
        Aggregator::new(LocaleTable::default(), ExclusionFilter::new(["leo.chang@x"]))
    }

    fn status(code: u16) -> ApiError {
        ApiError::Status {
            status: code,
            trace_id: None,
        }
    }

    #[test]
    fn test_run_builds_monthly_and_ytd() {
        let tmp = TempDir::new().unwrap();
        let writer = JsonReportWriter::new(tmp.path());
        let api = FakeApi::new()
            .with_project(project(1, "FINISHED", 3))
            .with_project(project(2, "IN_PROGRESS", 1))
            .with_project(project(3, "FINISHED", 3))
            .respond(
                1,
                vec![Ok(stats_body(
                    "es_ES",
                    &[("bob", "translate1", 50), ("Leo.Chang@x", "translate", 100)],
                ))],
            )
            .respond(2, vec![Ok(stats_body("zh_TW", &[("mei", "correct", 30)]))])
            .respond(
                3,
                vec![
                    Err(ApiError::Timeout),
                    Err(ApiError::Timeout),
                    Err(ApiError::Timeout),
                    Ok(stats_body("zh_TW", &[("mei", "correct", 30)])),
                ],
            );

        let pipeline = ReportPipeline::new(&api, &writer, caller(), aggregator());
        let outcome = pipeline.run(&period()).unwrap();

        assert_eq!(outcome.monthly.get("Spanish", "translate"), 50);
        assert_eq!(outcome.monthly.get("Chinese (Traditional)", "correct"), 30);
        assert_eq!(outcome.monthly.grand_total(), 80);
        assert_eq!(outcome.year_to_date.grand_total(), 110);

        let health = outcome.health();
        assert_eq!((health.succeeded, health.partial, health.failed), (3, 0, 0));
        assert_eq!(outcome.report.monthly.projects.total, 2);
        assert_eq!(outcome.report.year_to_date.projects.in_progress, 1);
        assert!(outcome.report_path.is_file());
        assert!(matches!(outcome.notice(), Notice::Success { .. }));
    }

    #[test]
    fn test_run_not_found_project_degrades() {
        let tmp = TempDir::new().unwrap();
        let writer = JsonReportWriter::new(tmp.path());
        let api = FakeApi::new()
            .with_project(project(1, "FINISHED", 3))
            .with_project(project(2, "FINISHED", 3))
            .respond(1, vec![Ok(stats_body("de_DE", &[("ann", "translate", 10)]))])
            .respond(2, vec![Err(status(404))]);

        let outcome = ReportPipeline::new(&api, &writer, caller(), aggregator())
            .run(&period())
            .unwrap();

        assert_eq!(api.calls(2), 1);
        assert_eq!(outcome.health().failed, 1);
        assert_eq!(outcome.health().errors[0].project_id, Some(2));
        assert_eq!(outcome.monthly.grand_total(), 10);
        assert!(outcome.is_successful());
    }

    #[test]
    fn test_run_all_failed_escalates() {
        let tmp = TempDir::new().unwrap();
        let writer = JsonReportWriter::new(tmp.path());
        let api = FakeApi::new()
            .with_project(project(1, "FINISHED", 3))
            .respond(1, vec![Err(status(403))]);

        let outcome = ReportPipeline::new(&api, &writer, caller(), aggregator())
            .run(&period())
            .unwrap();

        assert!(!outcome.is_successful());
        match outcome.notice() {
            Notice::Failure { message, .. } => assert!(message.starts_with("0 of 1 projects succeeded")),
            other => panic!("expected failure notice, got {other:?}"),
        }
    }

    #[test]
    fn test_run_with_only_malformed_payloads_fails() {
        let tmp = TempDir::new().unwrap();
        let writer = JsonReportWriter::new(tmp.path());
        let api = FakeApi::new()
            .with_project(project(1, "FINISHED", 3))
            .with_project(project(2, "FINISHED", 3))
            .respond(1, vec![Ok(serde_json::json!([42]))])
            .respond(
                2,
                vec![Ok(serde_json::json!({"errorCode": "UNAUTHORIZED", "reason": "token expired"}))],
            );

        let outcome = ReportPipeline::new(&api, &writer, caller(), aggregator())
            .run(&period())
            .unwrap();

        let health = outcome.health();
        assert_eq!((health.succeeded, health.partial, health.failed), (0, 0, 2));
        assert_eq!(outcome.year_to_date.grand_total(), 0);
        assert!(!outcome.is_successful());
        assert!(matches!(outcome.notice(), Notice::Failure { .. }));
    }

    #[test]
    fn test_run_listing_failure_is_recorded() {
        let tmp = TempDir::new().unwrap();
        let writer = JsonReportWriter::new(tmp.path());
        let api = FakeApi::new()
            .with_project(project(1, "FINISHED", 3))
            .failing_listing(status(401));

        let outcome = ReportPipeline::new(&api, &writer, caller(), aggregator())
            .run(&period())
            .unwrap();

        assert_eq!(outcome.health().projects(), 0);
        assert_eq!(outcome.health().errors.len(), 1);
        assert_eq!(outcome.health().errors[0].project_id, None);
        assert!(!outcome.is_successful());
    }

    #[test]
    fn test_projects_outside_ytd_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let writer = JsonReportWriter::new(tmp.path());
        let mut late = project(9, "FINISHED", 3);
        late.completed_at = Some(Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap());
        let api = FakeApi::new().with_project(late);

        let outcome = ReportPipeline::new(&api, &writer, caller(), aggregator())
            .run(&period())
            .unwrap();

        assert_eq!(api.calls(9), 0);
        assert_eq!(outcome.health().projects(), 0);
    }

    // ========== run_with_restarts ==========

    #[test]
    fn test_restart_recovers_and_does_not_double_count() {
        let tmp = TempDir::new().unwrap();
        let writer = JsonReportWriter::new(tmp.path());
        let api = FakeApi::new()
            .with_project(project(1, "FINISHED", 3))
            .respond(
                1,
                vec![
                    Err(status(400)),
                    Ok(stats_body("es_ES", &[("bob", "translate", 50)])),
                ],
            );
        let pipeline = ReportPipeline::new(&api, &writer, caller(), aggregator());

        let outcome = run_with_restarts(2, |_| pipeline.run(&period())).unwrap();

        assert!(outcome.is_successful());
        assert_eq!(api.calls(1), 2);
        assert_eq!(outcome.monthly.get("Spanish", "translate"), 50);
    }

    #[test]
    fn test_restart_stops_on_systemic_error() {
        let runs = Cell::new(0);
        let result = run_with_restarts(3, |_| {
            runs.set(runs.get() + 1);
            Err(XtmError::Preflight("no disk".into()))
        });
        assert!(result.is_err());
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_restart_gives_up_after_max_runs() {
        let runs = Cell::new(0);
        let result = run_with_restarts(3, |attempt| {
            runs.set(runs.get() + 1);
            Err(XtmError::Report(format!("disk hiccup {attempt}")))
        });
        assert_eq!(runs.get(), 3);
        assert!(result.unwrap_err().to_string().contains("disk hiccup 3"));
    }
}
