//! Error types for the cash-book orchestration layer

use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// Result type for cash-book operations
pub type Result<T> = std::result::Result<T, Error>;

/// One failed day inside a range recompute
#[derive(Debug, Clone, PartialEq)]
pub struct DayFailure {
    /// The day that failed
    pub date: NaiveDate,
    /// Machine-readable code of the underlying failure
    pub code: String,
    /// Human-readable cause
    pub message: String,
}

/// Cash-book errors
#[derive(Error, Debug)]
pub enum Error {
    /// Data-layer error (validation, duplicate, not-found, storage)
    #[error("ledger error: {0}")]
    Ledger(#[from] ledger::Error),

    /// Summary write conflict survived the whole retry budget; the caller
    /// may retry the operation after the suggested delay
    #[error("daily summary for {date} still contended after {attempts} attempts, retry after {retry_after:?}")]
    Concurrency {
        /// Contended day
        date: NaiveDate,
        /// Attempts spent before giving up
        attempts: u32,
        /// Suggested delay before the caller retries
        retry_after: Duration,
    },

    /// Some days of a range recompute failed after retries; committed days
    /// stay committed and are not rolled back
    #[error("range recompute left {} of {total} day(s) failed", .failures.len())]
    BatchPartialFailure {
        /// The days that failed, with causes
        failures: Vec<DayFailure>,
        /// Number of days in the requested range
        total: usize,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::Ledger(inner) => inner.code(),
            Error::Concurrency { .. } => "concurrency_conflict",
            Error::BatchPartialFailure { .. } => "batch_partial_failure",
            Error::Config(_) => "config_invalid",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_keep_their_code() {
        let err: Error = ledger::Error::validation("amount", "not positive").into();
        assert_eq!(err.code(), "validation_failed");
    }

    #[test]
    fn test_partial_failure_lists_days() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let err = Error::BatchPartialFailure {
            failures: vec![DayFailure {
                date,
                code: "concurrency_conflict".to_string(),
                message: "contended".to_string(),
            }],
            total: 3,
        };
        assert_eq!(err.code(), "batch_partial_failure");
        assert!(err.to_string().contains("1 of 3"));
    }
}
