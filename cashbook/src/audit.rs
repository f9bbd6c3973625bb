//! Opening-balance audit recorder
//!
//! Every manual override of a day's opening balance is captured as an
//! immutable audit row, written in the same atomic unit as the summary
//! update it records. Setting the value a day already has is an audited
//! no-op: success, no audit row.

use crate::aggregator::DailySummaryAggregator;
use crate::config::{RetryConfig, ValidationConfig};
use crate::retry::{run_with_retry, Attempt};
use crate::Result;
use chrono::{NaiveDate, Utc};
use ledger::types::max_two_decimals;
use ledger::{AccountingStore, DailySummary, OpeningBalanceAudit, UpsertOutcome, VersionedSummary};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Result of an opening-balance change
#[derive(Debug, Clone, PartialEq)]
pub struct OpeningBalanceChange {
    /// The summary row after the call
    pub summary: DailySummary,
    /// Whether an audit row was created (false for the no-change no-op)
    pub audit_created: bool,
}

/// Records manual opening-balance overrides
pub struct OpeningBalanceRecorder {
    store: Arc<dyn AccountingStore>,
    aggregator: DailySummaryAggregator,
    retry: RetryConfig,
    max_opening_balance: Decimal,
}

impl OpeningBalanceRecorder {
    /// Create a recorder over a store
    pub fn new(
        store: Arc<dyn AccountingStore>,
        retry: RetryConfig,
        validation: &ValidationConfig,
    ) -> Self {
        Self {
            aggregator: DailySummaryAggregator::new(store.clone(), retry.clone()),
            store,
            retry,
            max_opening_balance: validation.max_opening_balance,
        }
    }

    /// Override a day's opening balance
    ///
    /// Loads or lazily creates the day's summary. When the new value
    /// differs from the stored one, the summary update and exactly one
    /// audit row commit together; when it doesn't, nothing is written.
    pub async fn set_opening_balance(
        &self,
        date: NaiveDate,
        value: Decimal,
        reason: &str,
        changed_by: &str,
    ) -> Result<OpeningBalanceChange> {
        if value < Decimal::ZERO {
            return Err(
                ledger::Error::validation("opening_balance", "opening balance must not be negative")
                    .into(),
            );
        }
        if value > self.max_opening_balance {
            return Err(ledger::Error::validation(
                "opening_balance",
                format!("opening balance exceeds the {} ceiling", self.max_opening_balance),
            )
            .into());
        }
        if !max_two_decimals(value) {
            return Err(ledger::Error::validation(
                "opening_balance",
                "amounts are limited to two decimal places",
            )
            .into());
        }
        if reason.trim().is_empty() {
            return Err(ledger::Error::validation("reason", "a change reason is required").into());
        }
        if changed_by.trim().is_empty() {
            return Err(ledger::Error::validation("changed_by", "the operator must be named").into());
        }

        run_with_retry(&self.retry, date, "opening balance override", || {
            self.try_set(date, value, reason, changed_by)
        })
        .await
    }

    async fn try_set(
        &self,
        date: NaiveDate,
        value: Decimal,
        reason: &str,
        changed_by: &str,
    ) -> Result<Attempt<OpeningBalanceChange>> {
        let versioned = match self.load_or_create(date).await? {
            Attempt::Done(versioned) => versioned,
            Attempt::Conflict => return Ok(Attempt::Conflict),
        };

        let old = versioned.summary.opening_balance;
        if old == value {
            // Idempotent no-change: no audit row
            return Ok(Attempt::Done(OpeningBalanceChange {
                summary: versioned.summary,
                audit_created: false,
            }));
        }

        let mut summary = versioned.summary;
        summary.opening_balance = value;
        summary.closing_balance = value + summary.total_inflows - summary.total_outflows;

        let audit = OpeningBalanceAudit {
            id: Uuid::now_v7(),
            summary_date: date,
            old_opening_balance: old,
            new_opening_balance: value,
            change_reason: reason.to_string(),
            changed_by: changed_by.to_string(),
            changed_at: Utc::now(),
        };

        match self
            .store
            .apply_opening_balance(&summary, Some(versioned.version), &audit)
            .await?
        {
            UpsertOutcome::Applied(_) => {
                info!(
                    date = %date,
                    old = %old,
                    new = %value,
                    changed_by = %changed_by,
                    "opening balance changed"
                );
                Ok(Attempt::Done(OpeningBalanceChange {
                    summary,
                    audit_created: true,
                }))
            }
            UpsertOutcome::Conflict => Ok(Attempt::Conflict),
        }
    }

    async fn load_or_create(&self, date: NaiveDate) -> Result<Attempt<VersionedSummary>> {
        if let Some(versioned) = self.store.summary_for_day(date).await? {
            return Ok(Attempt::Done(versioned));
        }

        // Lazy creation goes through the aggregator, the only component
        // that derives summary rows
        match self.aggregator.recompute(date).await? {
            Attempt::Conflict => Ok(Attempt::Conflict),
            Attempt::Done(_) => match self.store.summary_for_day(date).await? {
                Some(versioned) => Ok(Attempt::Done(versioned)),
                None => Ok(Attempt::Conflict),
            },
        }
    }
}
