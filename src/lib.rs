//! xtmreport: monthly and year-to-date word-count reports from XTM Cloud
//! project statistics.

pub mod cli;
pub mod config;
pub mod observability;
pub mod services;
pub mod types;
