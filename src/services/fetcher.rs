//! Per-project statistics fetching
//!
//! Turns one project's `/statistics` payload into [`UserStatisticRecord`]s.
//! Never fails outward: transport errors become `TotalFailure`, malformed
//! entries are skipped and downgrade the outcome to `PartialFailure`, or to
//! `TotalFailure` when nothing usable survives.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::services::client::StatisticsSource;
use crate::services::normalizer::clean_step_name;
use crate::services::retry::{RetryableCaller, Sleeper, ThreadSleeper};
use crate::types::{FetchFailure, Project, ProjectFetch, ProjectOutcome, UserStatisticRecord};

/// Locale used when neither the entry nor the project names one
const UNKNOWN_LOCALE: &str = "unknown";

/// Issues listed verbatim in a partial-failure message
const MAX_LISTED_ISSUES: usize = 3;

pub struct ProjectStatisticsFetcher<'a, C, S = ThreadSleeper> {
    source: &'a C,
    caller: &'a RetryableCaller<S>,
}

impl<'a, C: StatisticsSource, S: Sleeper> ProjectStatisticsFetcher<'a, C, S> {
    pub fn new(source: &'a C, caller: &'a RetryableCaller<S>) -> Self {
        Self { source, caller }
    }

    pub fn fetch(&self, project: &Project) -> ProjectFetch {
        let call = self
            .caller
            .invoke(|_| self.source.project_statistics(project.id));

        let attempted = match call {
            Ok(attempted) => attempted,
            Err(err) => {
                warn!(project_id = project.id, error = %err, "statistics fetch failed");
                return ProjectFetch {
                    project: project.clone(),
                    outcome: ProjectOutcome::TotalFailure(FetchFailure::from(&err)),
                    attempts: err.attempts,
                    elapsed: err.elapsed,
                    anomalies: 0,
                };
            }
        };

        let parsed = parse_statistics(project, &attempted.value);
        let anomalies = parsed_anomalies(&parsed);
        let outcome = match parsed {
            Err(failure) => {
                warn!(project_id = project.id, error = %failure.message, "unusable statistics payload");
                ProjectOutcome::TotalFailure(failure)
            }
            Ok(ref stats) if stats.issues.is_empty() => ProjectOutcome::Success(stats.records.clone()),
            Ok(ref stats) if stats.records.is_empty() => {
                warn!(project_id = project.id, issues = stats.issues.len(), "no usable statistics");
                ProjectOutcome::TotalFailure(FetchFailure::shape(summarize_issues(&stats.issues)))
            }
            Ok(ref stats) => {
                warn!(
                    project_id = project.id,
                    issues = stats.issues.len(),
                    kept = stats.records.len(),
                    "partial statistics"
                );
                ProjectOutcome::PartialFailure {
                    records: stats.records.clone(),
                    error: FetchFailure::shape(summarize_issues(&stats.issues)),
                }
            }
        };

        info!(
            project_id = project.id,
            records = outcome.records().len(),
            attempts = attempted.attempts,
            "fetched project statistics"
        );

        ProjectFetch {
            project: project.clone(),
            outcome,
            attempts: attempted.attempts,
            elapsed: attempted.elapsed,
            anomalies,
        }
    }
}

fn parsed_anomalies(parsed: &Result<ParsedStatistics, FetchFailure>) -> u32 {
    parsed.as_ref().map(|p| p.anomalies).unwrap_or(0)
}

/// Records salvaged from one payload and everything that went wrong.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedStatistics {
    pub records: Vec<UserStatisticRecord>,
    /// Entries that were skipped
    pub issues: Vec<String>,
    /// Word counts coerced to 0
    pub anomalies: u32,
}

/// Parse `[{targetLanguage, usersStatistics: [{username, stepsStatistics: [...]}]}]`.
///
/// A bare object carrying `usersStatistics` is treated as a one-element
/// list. Any other top-level shape, including error objects such as
/// `{"errorCode": ...}`, is unusable and returned as an error.
pub fn parse_statistics(
    project: &Project,
    body: &Value,
) -> Result<ParsedStatistics, FetchFailure> {
    let entries: Vec<&Value> = match body {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) if map.contains_key("usersStatistics") => vec![body],
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            return Err(FetchFailure::shape(format!(
                "expected language statistics, got an object with keys [{}]",
                keys.join(", ")
            )));
        }
        Value::Null => Vec::new(),
        other => {
            return Err(FetchFailure::shape(format!(
                "expected a list of language statistics, got {}",
                json_type(other)
            )))
        }
    };

    let mut parsed = ParsedStatistics::default();
    for (index, entry) in entries.into_iter().enumerate() {
        parse_language_entry(project, index, entry, &mut parsed);
    }
    Ok(parsed)
}

fn parse_language_entry(project: &Project, index: usize, entry: &Value, out: &mut ParsedStatistics) {
    if !entry.is_object() {
        out.issues.push(format!("language entry {} is {}", index, json_type(entry)));
        return;
    }

    let locale = entry
        .get("targetLanguage")
        .and_then(Value::as_str)
        .or(project.target_locale.as_deref())
        .unwrap_or(UNKNOWN_LOCALE);

    if entry.get("usersStatistics").is_none() {
        out.issues.push(format!("language entry {} has no usersStatistics", index));
        return;
    }
    let Some(users) = list_field(entry, "usersStatistics", out, || {
        format!("usersStatistics of {} is not a list", locale)
    }) else {
        return;
    };

    for user in users {
        let Some(user_obj) = user.as_object() else {
            out.issues.push(format!("user entry in {} is {}", locale, json_type(user)));
            continue;
        };
        let identity = user_obj.get("username").and_then(Value::as_str);

        let Some(steps) = list_field(user, "stepsStatistics", out, || {
            format!("stepsStatistics of {} in {} is not a list", identity.unwrap_or("?"), locale)
        }) else {
            continue;
        };

        for step in steps {
            let Some(raw_name) = step.get("workflowStepName").and_then(Value::as_str) else {
                out.issues.push(format!(
                    "step without workflowStepName for {} in {}",
                    identity.unwrap_or("?"),
                    locale
                ));
                continue;
            };
            let name = clean_step_name(raw_name);
            if name.is_empty() {
                out.issues.push(format!("unnamed workflow step '{}' in {}", raw_name, locale));
                continue;
            }

            let Some(jobs) = list_field(step, "jobsStatistics", out, || {
                format!("jobsStatistics of step '{}' in {} is not a list", raw_name, locale)
            }) else {
                continue;
            };
            let words = step_words(project, jobs, locale, out);
            out.records.push(UserStatisticRecord {
                project_id: project.id,
                identity: identity.map(String::from),
                locale: locale.to_string(),
                step: name,
                words,
            });
        }
    }
}

/// Missing or null list fields are empty; present-but-wrong ones are issues.
fn list_field<'v>(
    value: &'v Value,
    key: &str,
    out: &mut ParsedStatistics,
    describe: impl FnOnce() -> String,
) -> Option<&'v [Value]> {
    match value.get(key) {
        None | Some(Value::Null) => Some(&[]),
        Some(Value::Array(items)) => Some(items.as_slice()),
        Some(_) => {
            out.issues.push(describe());
            None
        }
    }
}

/// Sum `sourceStatistics.totalWords` across the step's jobs.
fn step_words(project: &Project, jobs: &[Value], locale: &str, out: &mut ParsedStatistics) -> u64 {
    let mut words = 0u64;
    for job in jobs {
        if !job.is_object() {
            out.issues.push(format!("job entry in {} is {}", locale, json_type(job)));
            continue;
        }
        let Some(value) = job.get("sourceStatistics").and_then(|stats| stats.get("totalWords")) else {
            continue;
        };
        let count = word_count(value).unwrap_or_else(|| {
            warn!(project_id = project.id, value = %value, "invalid word count, counting as 0");
            out.anomalies += 1;
            0
        });
        words = words.saturating_add(count);
    }
    words
}

/// Non-negative integral counts; `null` is 0. Anything else is `None`.
fn word_count(value: &Value) -> Option<u64> {
    match value {
        Value::Null => Some(0),
        Value::Number(n) => {
            if let Some(words) = n.as_u64() {
                Some(words)
            } else if let Some(f) = n.as_f64() {
                (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then_some(f as u64)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn summarize_issues(issues: &[String]) -> String {
    let mut message = issues
        .iter()
        .take(MAX_LISTED_ISSUES)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");
    if issues.len() > MAX_LISTED_ISSUES {
        message.push_str(&format!(" (+{} more)", issues.len() - MAX_LISTED_ISSUES));
    }
    debug!(total = issues.len(), "summarized parse issues");
    message
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
