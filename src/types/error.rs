use std::time::Duration;

use thiserror::Error;

/// xtmreport error types
#[derive(Error, Debug)]
pub enum XtmError {
    /// Failed to parse an API payload or user input
    #[error("parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Upfront health checks failed; nothing was fetched
    #[error("preflight failed: {0}")]
    Preflight(String),

    /// Report could not be assembled or persisted
    #[error("report error: {0}")]
    Report(String),

    /// Notification delivery failed
    #[error("notify error: {0}")]
    Notify(String),
}

impl XtmError {
    /// Systemic errors abort the run and are never retried by the outer loop.
    pub fn is_systemic(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Preflight(_))
    }
}

/// Result type alias for xtmreport
pub type Result<T> = std::result::Result<T, XtmError>;

/// Failure of a single outbound API request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The attempt exceeded its timeout
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established or was reset
    #[error("connection failed: {0}")]
    Connection(String),

    /// Server answered with a non-success status
    #[error("HTTP {status} (trace id: {})", .trace_id.as_deref().unwrap_or("none"))]
    Status {
        status: u16,
        trace_id: Option<String>,
    },

    /// Body was not valid JSON
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Timeouts, connection failures, 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Decode(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// An API call that failed for good, annotated with how hard we tried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source} (after {attempts} attempt(s) in {elapsed:?})")]
pub struct RetryError {
    pub source: ApiError,
    pub attempts: u32,
    pub elapsed: Duration,
}
