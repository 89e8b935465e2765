//! Preflight checks for a reporting run
//!
//! Catches systemic problems (missing credentials, unwritable output, low
//! disk) before any project is fetched. Returns structured results that the
//! CLI formats.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::types::{Result, XtmError};

/// A single preflight check result.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Reason for failure, or confirmation
    pub message: String,
}

impl CheckResult {
    fn pass(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
        }
    }

    fn fail(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
    pub all_passed: bool,
}

impl PreflightReport {
    /// `Err(Preflight)` naming every failed check.
    pub fn into_result(self) -> Result<Self> {
        if self.all_passed {
            return Ok(self);
        }
        let failed: Vec<String> = self
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| format!("{}: {}", c.name, c.message))
            .collect();
        Err(XtmError::Preflight(failed.join("; ")))
    }
}

#[instrument(skip(config))]
pub fn run_preflight(config: &Config) -> PreflightReport {
    let report_dir = config.report_dir();
    let mut checks = vec![
        check_credentials(config),
        check_base_url(&config.base_url),
    ];
    if config.notify.mail {
        checks.push(check_recipients(&config.email_recipients));
    }

    let writable = check_output_dir(&report_dir);
    let can_measure = writable.passed;
    checks.push(writable);
    if can_measure {
        checks.push(check_disk_space(&report_dir, config.min_free_disk_mb));
    }

    let all_passed = checks.iter().all(|c| c.passed);
    debug!(all_passed, check_count = checks.len(), "preflight complete");

    PreflightReport { checks, all_passed }
}

fn check_credentials(config: &Config) -> CheckResult {
    if config.auth_token.trim().is_empty() {
        CheckResult::fail("Credentials", "auth_token is not set")
    } else if config.auth_type.trim().is_empty() {
        CheckResult::fail("Credentials", "auth_type is empty")
    } else {
        CheckResult::pass("Credentials", format!("{} token configured", config.auth_type))
    }
}

fn check_base_url(base_url: &str) -> CheckResult {
    if base_url.trim().is_empty() {
        return CheckResult::fail("API endpoint", "base_url is not set");
    }
    match reqwest::Url::parse(base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            CheckResult::pass("API endpoint", url.as_str())
        }
        Ok(url) => CheckResult::fail("API endpoint", format!("unsupported scheme '{}'", url.scheme())),
        Err(e) => CheckResult::fail("API endpoint", format!("invalid base_url: {e}")),
    }
}

fn check_recipients(recipients: &[String]) -> CheckResult {
    let valid = recipients.iter().filter(|r| r.contains('@')).count();
    if valid == 0 {
        CheckResult::fail("Recipients", "mail notification enabled but no email_recipients")
    } else if valid < recipients.len() {
        CheckResult::fail(
            "Recipients",
            format!("{} of {} recipients are not addresses", recipients.len() - valid, recipients.len()),
        )
    } else {
        CheckResult::pass("Recipients", format!("{valid} recipient(s)"))
    }
}

fn check_output_dir(dir: &Path) -> CheckResult {
    if let Err(e) = fs::create_dir_all(dir) {
        return CheckResult::fail("Output directory", format!("cannot create {}: {e}", dir.display()));
    }
    let probe = dir.join(".xtmreport-write-test");
    match fs::write(&probe, b"ok") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            CheckResult::pass("Output directory", format!("{} is writable", dir.display()))
        }
        Err(e) => CheckResult::fail("Output directory", format!("{} is not writable: {e}", dir.display())),
    }
}

fn check_disk_space(dir: &Path, min_free_mb: u64) -> CheckResult {
    match fs2::available_space(dir) {
        Ok(bytes) => {
            let free_mb = bytes / (1024 * 1024);
            if free_mb >= min_free_mb {
                CheckResult::pass("Disk space", format!("{free_mb} MB free"))
            } else {
                CheckResult::fail(
                    "Disk space",
                    format!("{free_mb} MB free, need at least {min_free_mb} MB"),
                )
            }
        }
        Err(e) => CheckResult::fail("Disk space", format!("failed to check: {e}")),
    }
}
