//! `xtmreport users`: who did how much, before exclusions
//!
//! Lists every identity so the `excluded_users` list can be checked
//! against what XTM actually reports.

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::services::{fetch_window, Aggregator, DegradationTracker, ExclusionFilter};
use crate::types::{RunHealth, UserRow, UserTableView};

use super::{build_client, resolve_period};

/// Per-user word counts for one month (or year to date)
#[derive(Args, Debug)]
pub struct UsersArgs {
    /// Report month as YYYY-MM (default: the previous month)
    #[arg(long, value_name = "YYYY-MM")]
    pub month: Option<String>,

    /// Cover January through the report month
    #[arg(long)]
    pub ytd: bool,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct FlaggedRow {
    #[serde(flatten)]
    row: UserRow,
    excluded: bool,
}

#[derive(Debug, Serialize)]
struct UserListing {
    period: String,
    columns: Vec<String>,
    rows: Vec<FlaggedRow>,
    health: RunHealth,
}

impl UsersArgs {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let period = resolve_period(self.month.as_deref())?;
        let (window, label) = if self.ytd {
            (
                period.year_to_date(),
                format!("{} to {}", period.ytd_start_label(), period.month_label()),
            )
        } else {
            (period.monthly(), period.month_label())
        };
        info!(period = %label, "collecting user statistics");

        let (client, caller) = build_client(config)?;
        let mut tracker = DegradationTracker::new();
        let fetches = fetch_window(&client, &caller, &window, &mut tracker);

        let aggregator = Aggregator::new(config.locale_table(), config.exclusion_filter());
        let view = aggregator
            .users_excluding(&fetches, &ExclusionFilter::none())
            .view();
        let listing = UserListing {
            period: label,
            columns: view.columns.clone(),
            rows: flag_rows(view, aggregator.exclusions()),
            health: tracker.summary(),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&listing)?);
        } else {
            print!("{}", render(&listing));
        }
        Ok(())
    }
}

fn flag_rows(view: UserTableView, exclusions: &ExclusionFilter) -> Vec<FlaggedRow> {
    view.rows
        .into_iter()
        .map(|row| FlaggedRow {
            excluded: exclusions.is_excluded(Some(row.identity.as_str())),
            row,
        })
        .collect()
}

fn render(listing: &UserListing) -> String {
    let mut out = format!("User statistics for {}\n", listing.period);
    out.push_str(&format!(
        "{:<32} {:<24} {}  Total\n",
        "User",
        "Language",
        listing.columns.join("  ")
    ));
    for flagged in &listing.rows {
        let cells: Vec<String> = flagged.row.cells.iter().map(u64::to_string).collect();
        out.push_str(&format!(
            "{:<32} {:<24} {}  {}{}\n",
            flagged.row.identity,
            flagged.row.language,
            cells.join("  "),
            flagged.row.total,
            if flagged.excluded { "  (excluded)" } else { "" }
        ));
    }
    out.push_str(&format!("\n{}\n", listing.health));
    out
}
