//! Reporting windows
//!
//! The report month is the calendar month before the reference date. The
//! monthly window spans that month; the year-to-date window starts on
//! January 1 of the same year. Both end (exclusively) at the first day of
//! the following month, in UTC.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::types::{Result, XtmError};

/// Half-open `[start, end)` interval of completion timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CompletionWindow {
    /// Projects without a timestamp are kept in every window.
    pub fn contains(&self, at: Option<DateTime<Utc>>) -> bool {
        match at {
            Some(at) => self.start <= at && at < self.end,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    month_start: NaiveDate,
    month_end: NaiveDate,
    year_start: NaiveDate,
    generated_on: NaiveDate,
}

impl ReportingPeriod {
    /// Report on the month before `today`.
    pub fn previous_month(today: NaiveDate) -> Result<Self> {
        let (year, month) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        Self::for_month(year, month, today)
    }

    pub fn for_month(year: i32, month: u32, generated_on: NaiveDate) -> Result<Self> {
        let invalid = || XtmError::Config(format!("invalid report month {:04}-{:02}", year, month));
        let month_start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let month_end = month_start
            .checked_add_months(Months::new(1))
            .ok_or_else(invalid)?;
        let year_start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
        Ok(Self {
            month_start,
            month_end,
            year_start,
            generated_on,
        })
    }

    /// Parse a `YYYY-MM` override.
    pub fn parse_month(value: &str, generated_on: NaiveDate) -> Result<Self> {
        let parse_err = || XtmError::Parse(format!("expected YYYY-MM, got '{}'", value));
        let (year, month) = value.trim().split_once('-').ok_or_else(parse_err)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(parse_err());
        }
        let year: i32 = year.parse().map_err(|_| parse_err())?;
        let month: u32 = month.parse().map_err(|_| parse_err())?;
        Self::for_month(year, month, generated_on)
    }

    pub fn monthly(&self) -> CompletionWindow {
        CompletionWindow {
            start: midnight_utc(self.month_start),
            end: midnight_utc(self.month_end),
        }
    }

    pub fn year_to_date(&self) -> CompletionWindow {
        CompletionWindow {
            start: midnight_utc(self.year_start),
            end: midnight_utc(self.month_end),
        }
    }

    pub fn generated_on(&self) -> NaiveDate {
        self.generated_on
    }

    /// `2024-03`
    pub fn month_label(&self) -> String {
        self.month_start.format("%Y-%m").to_string()
    }

    /// `March 2024`
    pub fn month_name(&self) -> String {
        self.month_start.format("%B %Y").to_string()
    }

    /// `2024-01`
    pub fn ytd_start_label(&self) -> String {
        self.year_start.format("%Y-%m").to_string()
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
