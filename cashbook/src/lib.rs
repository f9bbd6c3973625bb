//! ColdBook Cash Book
//!
//! Orchestration layer of the cold-storage accounting core: records
//! financial events into the customer ledger and the cash book atomically,
//! maintains the derived daily summaries, and audits manual
//! opening-balance overrides.
//!
//! # Consistency model
//!
//! - A ledger entry and its cash movement commit as one atomic unit
//! - Daily summaries are recomputed from scratch after the commit, outside
//!   the transaction; a brief stale window is an accepted tradeoff
//! - Summary rows are the only contended resource; writers race through a
//!   versioned upsert and one bounded retry policy with exponential
//!   backoff and jitter
//! - After the retry budget is spent the conflict surfaces to the caller
//!   with a suggested retry-after, never a silent drop

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod aggregator;
pub mod audit;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod recorder;
pub mod retry;

// Re-exports
pub use aggregator::DailySummaryAggregator;
pub use audit::{OpeningBalanceChange, OpeningBalanceRecorder};
pub use config::{Config, RetryConfig, ValidationConfig};
pub use coordinator::{Coordinator, FinancialEvent, RecordedEvent};
pub use error::{DayFailure, Error, Result};
pub use recorder::{CashMovementRecorder, CashMovementUpdate, NewCashMovement};
