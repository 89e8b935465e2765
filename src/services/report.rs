//! Report assembly and persistence

use std::fs::{self, File, OpenOptions};
use std::sync::atomic::{AtomicU64, Ordering};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::services::period::{CompletionWindow, ReportingPeriod};
use crate::types::{AggregateTable, ProjectStats, Result, RunHealth, TableView, UserTable, UserTableView, XtmError};

/// Languages listed in the e-mail summary
const TOP_LANGUAGES: usize = 3;

/// Distinguishes temp files of writers inside one process
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// One window's worth of results.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    pub window: CompletionWindow,
    pub projects: ProjectStats,
    pub languages: TableView,
    pub users: UserTableView,
}

impl ReportSection {
    pub fn new(
        window: CompletionWindow,
        projects: ProjectStats,
        languages: &AggregateTable,
        users: &UserTable,
    ) -> Self {
        Self {
            window,
            projects,
            languages: languages.view(),
            users: users.view(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    /// `2024-03`
    pub report_month: String,
    /// `March 2024`
    pub report_month_name: String,
    pub ytd_start: String,
    pub health: RunHealth,
    pub monthly: ReportSection,
    pub year_to_date: ReportSection,
}

impl Report {
    pub fn new(
        period: &ReportingPeriod,
        generated_at: DateTime<Utc>,
        health: RunHealth,
        monthly: ReportSection,
        year_to_date: ReportSection,
    ) -> Self {
        Self {
            generated_at,
            report_month: period.month_label(),
            report_month_name: period.month_name(),
            ytd_start: period.ytd_start_label(),
            health,
            monthly,
            year_to_date,
        }
    }

    pub fn subject(&self) -> String {
        format!("XTM Monthly Report - {}", self.report_month)
    }
}

/// Persists an assembled report, returning where it landed.
pub trait ReportWriter {
    fn write(&self, period: &ReportingPeriod, report: &Report) -> Result<PathBuf>;
}

/// Writes pretty JSON into a directory.
#[derive(Debug, Clone)]
pub struct JsonReportWriter {
    output_dir: PathBuf,
}

impl JsonReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path(&self, period: &ReportingPeriod) -> PathBuf {
        self.output_dir.join(file_name(period, "json"))
    }
}

impl ReportWriter for JsonReportWriter {
    /// Atomic write (temp file + rename) under an exclusive lock on a
    /// `.lock` sidecar, so a re-run replaces the report instead of appending
    /// to it and concurrent writers take turns.
    fn write(&self, period: &ReportingPeriod, report: &Report) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let content = serde_json::to_string_pretty(report)
            .map_err(|e| XtmError::Report(format!("serialization failed: {}", e)))?;

        let path = self.path(period);
        let lock_path = path.with_extension("json.lock");
        let lock = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| XtmError::Report(format!("failed to open {}: {}", lock_path.display(), e)))?;
        lock.lock_exclusive()
            .map_err(|e| XtmError::Report(format!("failed to lock {}: {}", lock_path.display(), e)))?;

        let temp_path = temp_path_for(&path);
        let written = write_synced(&temp_path, content.as_bytes()).and_then(|()| {
            fs::rename(&temp_path, &path)
                .map_err(|e| XtmError::Report(format!("failed to move report into place: {}", e)))
        });
        if written.is_err() {
            let _ = fs::remove_file(&temp_path);
        }

        if let Err(e) = FileExt::unlock(&lock) {
            warn!(path = %lock_path.display(), error = %e, "failed to release report lock");
        }
        written?;

        info!(path = %path.display(), bytes = content.len(), "report written");
        Ok(path)
    }
}

/// `.<report>.<pid>-<seq>.tmp` next to the report
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("report");
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}-{}.tmp", name, std::process::id(), seq))
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)
        .map_err(|e| XtmError::Report(format!("failed to create {}: {}", path.display(), e)))?;
    file.write_all(bytes)
        .map_err(|e| XtmError::Report(format!("failed to write {}: {}", path.display(), e)))?;
    file.sync_all()
        .map_err(|e| XtmError::Report(format!("failed to sync {}: {}", path.display(), e)))?;
    Ok(())
}

/// `XTM_Monthly_Report_2024-03_20240401.json`
pub fn file_name(period: &ReportingPeriod, extension: &str) -> String {
    format!(
        "XTM_Monthly_Report_{}_{}.{}",
        period.month_label(),
        period.generated_on().format("%Y%m%d"),
        extension
    )
}

/// Headline numbers for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryStats {
    pub total_words: u64,
    pub top_languages: Vec<(String, u64)>,
    /// In column order
    pub steps: Vec<(String, u64)>,
}

pub fn summary_stats(table: &AggregateTable) -> SummaryStats {
    SummaryStats {
        total_words: table.grand_total(),
        top_languages: table
            .rows()
            .into_iter()
            .take(TOP_LANGUAGES)
            .map(|row| (row.label, row.total))
            .collect(),
        steps: table
            .steps()
            .into_iter()
            .map(|step| {
                let total = table.step_total(&step);
                (step, total)
            })
            .collect(),
    }
}

/// Plain-text e-mail body.
pub fn summary_text(report: &Report, monthly: &AggregateTable, ytd: &AggregateTable) -> String {
    let month = summary_stats(monthly);
    let year = summary_stats(ytd);

    let mut body = String::from("Hello,\n\n");
    body.push_str(&format!(
        "Please find attached the XTM monthly report for {}.\n\n",
        report.report_month
    ));
    body.push_str(&format!("Monthly Summary ({}):\n", report.report_month_name));
    push_summary(&mut body, &month);
    body.push_str(&format!(
        "\nYear-to-Date Summary ({} to {}):\n",
        report.ytd_start, report.report_month
    ));
    push_summary(&mut body, &year);
    body.push_str(&format!("\nRun health: {}\n", report.health));
    body.push_str(&format!(
        "Report Generated: {}\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M")
    ));
    body.push_str("Please review and let me know if you have any questions.\n\nBest regards\n");
    body
}

fn push_summary(body: &mut String, stats: &SummaryStats) {
    body.push_str(&format!(
        "- Total Words Processed: {}\n- Top Languages:\n",
        group_thousands(stats.total_words)
    ));
    if stats.top_languages.is_empty() {
        body.push_str("  No data available\n");
    }
    for (rank, (language, words)) in stats.top_languages.iter().enumerate() {
        body.push_str(&format!(
            "  {}. {}: {} words\n",
            rank + 1,
            language,
            group_thousands(*words)
        ));
    }
    body.push_str("- By Workflow Step:\n");
    if stats.steps.is_empty() {
        body.push_str("  No data available\n");
    }
    for (step, words) in &stats.steps {
        body.push_str(&format!("  {}: {} words\n", step, group_thousands(*words)));
    }
}

/// `1234567` → `1,234,567`
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
