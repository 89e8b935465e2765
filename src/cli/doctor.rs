//! `xtmreport doctor`: preflight checks without fetching anything

use clap::Args;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::services::{run_preflight, PreflightReport};

/// Check that a run would start
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    /// Print the check results as JSON
    #[arg(long)]
    pub json: bool,
}

impl DoctorArgs {
    #[instrument(name = "cmd_doctor", skip_all)]
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let report = run_preflight(config);
        debug!(all_passed = report.all_passed, "doctor finished");

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", render(&report));
        }

        if report.all_passed {
            Ok(())
        } else {
            Err(anyhow::anyhow!("preflight checks failed"))
        }
    }
}

fn render(report: &PreflightReport) -> String {
    let mut out = String::from("Preflight Checks\n\n");
    for check in &report.checks {
        let icon = if check.passed { "✓" } else { "✗" };
        out.push_str(&format!("  {icon} {}: {}\n", check.name, check.message));
    }
    out.push('\n');
    if report.all_passed {
        out.push_str("  Ready to run\n");
    } else {
        let failed = report.checks.iter().filter(|c| !c.passed).count();
        out.push_str(&format!("  {failed} check(s) failed, fix the issues above\n"));
    }
    out
}
