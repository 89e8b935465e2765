//! `xtmreport run`: the scheduled monthly job

use anyhow::Context;
use clap::Args;
use tracing::{debug, info};

use crate::config::Config;
use crate::services::notifier::OsaScript;
use crate::services::{
    notify_all, run_preflight, run_with_restarts, Aggregator, JsonReportWriter, LogNotifier, MacNotifier,
    MailNotifier, Notice, Notifier, ReportPipeline, RunOutcome,
};

use super::{build_client, resolve_period};

/// Generate the monthly report
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Report month as YYYY-MM (default: the previous month)
    #[arg(long, value_name = "YYYY-MM")]
    pub month: Option<String>,

    /// Send the e-mail instead of leaving a draft open
    #[arg(long)]
    pub auto_send: bool,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Skip desktop and e-mail notifications
    #[arg(long)]
    pub no_notify: bool,
}

impl RunArgs {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let notifiers = self.notifiers(config);
        let result = self.generate(config);

        let notice = match &result {
            Ok(outcome) => outcome.notice(),
            Err(err) => Notice::Failure {
                subject: "XTM report failed".to_string(),
                message: format!("{err:#}"),
            },
        };
        let delivered = notify_all(&notifiers, &notice);
        debug!(delivered, total = notifiers.len(), "notifications sent");

        let outcome = result?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        } else {
            print_summary(&outcome);
        }

        if !outcome.is_successful() {
            anyhow::bail!("no project statistics retrieved: {}", outcome.health());
        }
        Ok(())
    }

    fn generate(&self, config: &Config) -> anyhow::Result<RunOutcome> {
        let period = resolve_period(self.month.as_deref())?;
        info!(month = %period.month_label(), "starting report run");

        run_preflight(config)
            .into_result()
            .context("preflight checks failed")?;

        let (client, caller) = build_client(config)?;
        let writer = JsonReportWriter::new(config.report_dir());
        let aggregator = Aggregator::new(config.locale_table(), config.exclusion_filter());
        let pipeline = ReportPipeline::new(&client, &writer, caller, aggregator);

        // Every run starts from empty tables and overwrites the same report
        // file, so restarting after a partial run cannot double count.
        let outcome = run_with_restarts(config.max_runs, |attempt| {
            debug!(attempt, "pipeline run");
            pipeline.run(&period)
        })?;
        Ok(outcome)
    }

    fn notifiers(&self, config: &Config) -> Vec<Box<dyn Notifier>> {
        let mut notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier)];
        if self.no_notify {
            return notifiers;
        }
        if config.notify.system {
            notifiers.push(Box::new(MacNotifier::new(OsaScript)));
        }
        if config.notify.mail {
            notifiers.push(Box::new(MailNotifier::new(
                config.email_recipients.clone(),
                self.auto_send || config.notify.auto_send,
                OsaScript,
            )));
        }
        notifiers
    }
}

fn print_summary(outcome: &RunOutcome) {
    let report = &outcome.report;
    println!("Report generated: {}", outcome.report_path.display());
    println!("Monthly period:   {}", report.report_month_name);
    println!("YTD period:       {} to {}", report.ytd_start, report.report_month);
    println!("Monthly words:    {}", outcome.monthly.grand_total());
    println!("YTD words:        {}", outcome.year_to_date.grand_total());
    println!("Health:           {}", report.health);
    for error in &report.health.errors {
        let project = error
            .project_name
            .as_deref()
            .unwrap_or("(project listing)");
        println!("  - {}: {}", project, error.message);
    }
}
