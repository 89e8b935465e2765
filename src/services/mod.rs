//! Services for fetching, aggregating and reporting XTM statistics

pub mod aggregator;
pub mod client;
pub mod degradation;
pub mod exclusion;
pub mod fetcher;
pub mod normalizer;
pub mod notifier;
pub mod period;
pub mod pipeline;
pub mod preflight;
pub mod report;
pub mod retry;

#[cfg(test)]
pub(crate) mod fake;

pub use aggregator::Aggregator;
pub use client::{ProjectLister, StatisticsSource, XtmClient};
pub use degradation::DegradationTracker;
pub use exclusion::ExclusionFilter;
pub use fetcher::ProjectStatisticsFetcher;
pub use normalizer::{clean_step_name, LocaleTable};
pub use notifier::{notify_all, LogNotifier, MacNotifier, MailNotifier, Notice, Notifier};
pub use period::{CompletionWindow, ReportingPeriod};
pub use pipeline::{fetch_window, run_with_restarts, ReportPipeline, RunOutcome};
pub use preflight::{run_preflight, CheckResult, PreflightReport};
pub use report::{JsonReportWriter, Report, ReportWriter};
pub use retry::{RetryPolicy, RetryableCaller};
