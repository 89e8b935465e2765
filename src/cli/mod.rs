mod doctor;
mod run;
mod users;

use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

pub use doctor::DoctorArgs;
pub use run::RunArgs;
pub use users::UsersArgs;

use crate::config::{Config, ConfigLoader};
use crate::observability;
use crate::services::{ReportingPeriod, RetryableCaller, XtmClient};
use crate::types::Result;

/// Monthly and year-to-date XTM word-count reports
#[derive(Parser, Debug)]
#[command(name = "xtmreport")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Extra config file (highest precedence after environment)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch statistics, write the report and notify
    Run(RunArgs),

    /// Check configuration, credentials and output directory
    Doctor(DoctorArgs),

    /// Per-user statistics with excluded identities flagged
    Users(UsersArgs),
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let cwd = std::env::current_dir().context("failed to determine current directory")?;
        let mut loader = ConfigLoader::new().with_search_dir(&cwd);
        if let Some(ref path) = self.config {
            loader = loader.with_file(path);
        }
        let config = loader.load().context("failed to load configuration")?;

        let filter = observability::env_filter(self.quiet, self.verbose, config.log_level.as_str());
        let _guard = observability::init_observability(config.log_dir.as_deref(), filter)
            .context("failed to initialize logging")?;

        log_loaded_config(&config);
        debug!(verbose = self.verbose, quiet = self.quiet, command = ?self.command, "CLI initialized");

        let result = match self.command {
            Commands::Run(args) => args.run(&config),
            Commands::Doctor(args) => args.run(&config),
            Commands::Users(args) => args.run(&config),
        };
        if let Err(ref err) = result {
            tracing::error!(error = %err, "fatal error");
        }
        result
    }
}

/// Logged once the subscriber exists; config loading itself runs before it.
fn log_loaded_config(config: &Config) {
    info!(
        log_level = config.log_level.as_str(),
        base_url = %config.base_url,
        "configuration loaded"
    );
}

/// The requested month, or the month before today.
fn resolve_period(month: Option<&str>) -> Result<ReportingPeriod> {
    let today: NaiveDate = Local::now().date_naive();
    match month {
        Some(month) => ReportingPeriod::parse_month(month, today),
        None => ReportingPeriod::previous_month(today),
    }
}

fn build_client(config: &Config) -> Result<(XtmClient, RetryableCaller)> {
    let policy = config.retry.policy();
    let client = XtmClient::new(
        &config.base_url,
        &config.auth_type,
        &config.auth_token,
        policy.attempt_timeout,
    )?;
    Ok((client, RetryableCaller::new(policy)))
}
