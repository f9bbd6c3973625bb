//! Daily summary aggregator
//!
//! Recomputes each day's cash-book row entirely from the day's movements
//! instead of applying deltas. The full recompute makes the operation
//! idempotent and safe to trigger redundantly: whichever trigger commits
//! last leaves a row consistent with the movements existing at that
//! instant. Daily volume is small, so re-reading the day is cheap; an
//! incremental counter would reintroduce the lost-update hazard this
//! design avoids.
//!
//! Concurrent triggers for the same day race on the versioned upsert and
//! resolve through the retry policy in [`crate::retry`].

use crate::config::RetryConfig;
use crate::error::DayFailure;
use crate::retry::{run_with_retry, Attempt};
use crate::{Error, Result};
use chrono::{NaiveDate, Utc};
use ledger::{AccountingStore, CashDirection, DailySummary, UpsertOutcome};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

/// Recomputes and persists daily summaries
///
/// The only component allowed to write `DailySummary` rows.
pub struct DailySummaryAggregator {
    store: Arc<dyn AccountingStore>,
    retry: RetryConfig,
}

impl DailySummaryAggregator {
    /// Create an aggregator over a store
    pub fn new(store: Arc<dyn AccountingStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// One full recompute attempt for a day
    ///
    /// Sums the day's movements by direction, determines the opening
    /// balance (existing row's value when present, preserving manual
    /// overrides; otherwise chained from the most recent prior day's
    /// closing, or zero), and upserts with the version read at the start.
    /// A losing compare-and-swap reports [`Attempt::Conflict`]; callers go
    /// through [`Self::recompute_with_retry`] unless external concurrency
    /// is already excluded.
    pub async fn recompute(&self, date: NaiveDate) -> Result<Attempt<DailySummary>> {
        let movements = self.store.movements_for_day(date).await?;

        let mut total_inflows = Decimal::ZERO;
        let mut total_outflows = Decimal::ZERO;
        for movement in &movements {
            match movement.direction {
                CashDirection::Inflow => total_inflows += movement.amount,
                CashDirection::Outflow => total_outflows += movement.amount,
            }
        }

        let existing = self.store.summary_for_day(date).await?;
        let (opening_balance, expected_version, reconciliation) = match &existing {
            Some(versioned) => (
                versioned.summary.opening_balance,
                Some(versioned.version),
                (
                    versioned.summary.is_reconciled,
                    versioned.summary.reconciled_by.clone(),
                    versioned.summary.reconciled_at,
                ),
            ),
            None => {
                let previous = self.store.latest_summary_before(date).await?;
                let opening = previous.map(|s| s.closing_balance).unwrap_or(Decimal::ZERO);
                (opening, None, (false, None, None))
            }
        };

        let summary = DailySummary {
            date,
            opening_balance,
            total_inflows,
            total_outflows,
            closing_balance: opening_balance + total_inflows - total_outflows,
            is_reconciled: reconciliation.0,
            reconciled_by: reconciliation.1,
            reconciled_at: reconciliation.2,
        };

        match self.store.upsert_summary(&summary, expected_version).await? {
            UpsertOutcome::Applied(_) => {
                debug!(
                    date = %date,
                    inflows = %summary.total_inflows,
                    outflows = %summary.total_outflows,
                    closing = %summary.closing_balance,
                    "daily summary recomputed"
                );
                Ok(Attempt::Done(summary))
            }
            UpsertOutcome::Conflict => Ok(Attempt::Conflict),
        }
    }

    /// Recompute a day under the bounded retry policy
    pub async fn recompute_with_retry(&self, date: NaiveDate) -> Result<DailySummary> {
        run_with_retry(&self.retry, date, "daily summary recompute", || {
            self.recompute(date)
        })
        .await
    }

    /// Recompute every day in an inclusive range, independently
    ///
    /// All-settled semantics: every day is attempted regardless of earlier
    /// failures; committed days stay committed. If any day fails after
    /// retries the whole call fails with a per-date failure list.
    pub async fn recompute_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySummary>> {
        if start > end {
            return Err(
                ledger::Error::validation("range", "start date must not be after end date").into(),
            );
        }

        let mut summaries = Vec::new();
        let mut failures = Vec::new();
        let mut total = 0usize;

        let mut date = start;
        while date <= end {
            total += 1;
            match self.recompute_with_retry(date).await {
                Ok(summary) => summaries.push(summary),
                Err(err) => failures.push(DayFailure {
                    date,
                    code: err.code().to_string(),
                    message: err.to_string(),
                }),
            }
            date += chrono::Duration::days(1);
        }

        if failures.is_empty() {
            info!(start = %start, end = %end, days = total, "range recompute complete");
            Ok(summaries)
        } else {
            Err(Error::BatchPartialFailure { failures, total })
        }
    }

    /// Recompute a set of (not necessarily contiguous) days, all-settled
    pub(crate) async fn recompute_days(&self, dates: &[NaiveDate]) -> Result<Vec<DailySummary>> {
        let mut summaries = Vec::new();
        let mut failures = Vec::new();

        for &date in dates {
            match self.recompute_with_retry(date).await {
                Ok(summary) => summaries.push(summary),
                Err(err) => failures.push(DayFailure {
                    date,
                    code: err.code().to_string(),
                    message: err.to_string(),
                }),
            }
        }

        if failures.is_empty() {
            Ok(summaries)
        } else {
            Err(Error::BatchPartialFailure {
                failures,
                total: dates.len(),
            })
        }
    }

    /// Mark a day reconciled
    ///
    /// Lazily creates the row when absent. The flags survive later
    /// recomputes: [`Self::recompute`] copies them through.
    pub async fn mark_reconciled(&self, date: NaiveDate, by: &str) -> Result<DailySummary> {
        if by.trim().is_empty() {
            return Err(ledger::Error::validation("reconciled_by", "reconciler must be named").into());
        }

        run_with_retry(&self.retry, date, "mark reconciled", || async {
            let versioned = match self.store.summary_for_day(date).await? {
                Some(versioned) => versioned,
                None => {
                    // No row yet: build one first, then loop around to flag it
                    match self.recompute(date).await? {
                        Attempt::Conflict => return Ok(Attempt::Conflict),
                        Attempt::Done(_) => match self.store.summary_for_day(date).await? {
                            Some(versioned) => versioned,
                            None => return Ok(Attempt::Conflict),
                        },
                    }
                }
            };

            let mut summary = versioned.summary;
            summary.is_reconciled = true;
            summary.reconciled_by = Some(by.to_string());
            summary.reconciled_at = Some(Utc::now());

            match self
                .store
                .upsert_summary(&summary, Some(versioned.version))
                .await?
            {
                UpsertOutcome::Applied(_) => {
                    info!(date = %date, by = %by, "day marked reconciled");
                    Ok(Attempt::Done(summary))
                }
                UpsertOutcome::Conflict => Ok(Attempt::Conflict),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger::{CashMovement, CashSource, MemoryStore};
    use uuid::Uuid;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            jitter_ms: 1,
        }
    }

    fn setup() -> (Arc<MemoryStore>, DailySummaryAggregator) {
        let store = Arc::new(MemoryStore::new());
        let aggregator = DailySummaryAggregator::new(store.clone(), fast_retry());
        (store, aggregator)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    async fn add_movement(store: &MemoryStore, date: NaiveDate, direction: CashDirection, cents: i64) {
        store
            .insert_movement(&CashMovement {
                id: Uuid::now_v7(),
                date,
                direction,
                amount: Decimal::new(cents, 2),
                description: "movement".to_string(),
                source: CashSource::Manual,
                reference: None,
                customer_id: None,
                is_direct_cash: false,
                created_by: "ops".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_recompute_chains_from_previous_day() {
        let (store, aggregator) = setup();

        // Day 13 closes at 300.00
        add_movement(&store, day(13), CashDirection::Inflow, 30000).await;
        aggregator.recompute_with_retry(day(13)).await.unwrap();

        // Day 14: inflow 100, outflow 40, no prior row for the day
        add_movement(&store, day(14), CashDirection::Inflow, 10000).await;
        add_movement(&store, day(14), CashDirection::Outflow, 4000).await;

        let summary = aggregator.recompute_with_retry(day(14)).await.unwrap();
        assert_eq!(summary.opening_balance, Decimal::new(30000, 2));
        assert_eq!(summary.total_inflows, Decimal::new(10000, 2));
        assert_eq!(summary.total_outflows, Decimal::new(4000, 2));
        assert_eq!(summary.closing_balance, Decimal::new(36000, 2));
        assert!(summary.is_balanced());
    }

    #[tokio::test]
    async fn test_recompute_without_history_opens_at_zero() {
        let (store, aggregator) = setup();
        add_movement(&store, day(14), CashDirection::Outflow, 2500).await;

        let summary = aggregator.recompute_with_retry(day(14)).await.unwrap();
        assert_eq!(summary.opening_balance, Decimal::ZERO);
        assert_eq!(summary.closing_balance, Decimal::new(-2500, 2));
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let (store, aggregator) = setup();
        add_movement(&store, day(14), CashDirection::Inflow, 12345).await;

        let first = aggregator.recompute_with_retry(day(14)).await.unwrap();
        let second = aggregator.recompute_with_retry(day(14)).await.unwrap();
        assert_eq!(first, second);

        // The stored row matches too
        let stored = store.summary_for_day(day(14)).await.unwrap().unwrap();
        assert_eq!(stored.summary, second);
    }

    #[tokio::test]
    async fn test_recompute_preserves_existing_opening_balance() {
        let (store, aggregator) = setup();
        add_movement(&store, day(14), CashDirection::Inflow, 10000).await;
        aggregator.recompute_with_retry(day(14)).await.unwrap();

        // Simulate a manual override of the opening balance
        let versioned = store.summary_for_day(day(14)).await.unwrap().unwrap();
        let mut overridden = versioned.summary.clone();
        overridden.opening_balance = Decimal::new(99900, 2);
        overridden.closing_balance = overridden.opening_balance + overridden.total_inflows
            - overridden.total_outflows;
        store
            .upsert_summary(&overridden, Some(versioned.version))
            .await
            .unwrap();

        // A later recompute keeps the override
        add_movement(&store, day(14), CashDirection::Inflow, 100).await;
        let summary = aggregator.recompute_with_retry(day(14)).await.unwrap();
        assert_eq!(summary.opening_balance, Decimal::new(99900, 2));
        assert_eq!(summary.total_inflows, Decimal::new(10100, 2));
        assert!(summary.is_balanced());
    }

    #[tokio::test]
    async fn test_recompute_range_happy_path() {
        let (store, aggregator) = setup();
        add_movement(&store, day(10), CashDirection::Inflow, 5000).await;
        add_movement(&store, day(12), CashDirection::Outflow, 1000).await;

        let summaries = aggregator.recompute_range(day(10), day(12)).await.unwrap();
        assert_eq!(summaries.len(), 3);
        // Chain: 50.00 -> 50.00 (empty day) -> 40.00
        assert_eq!(summaries[0].closing_balance, Decimal::new(5000, 2));
        assert_eq!(summaries[1].closing_balance, Decimal::new(5000, 2));
        assert_eq!(summaries[2].closing_balance, Decimal::new(4000, 2));
    }

    #[tokio::test]
    async fn test_recompute_range_rejects_inverted_range() {
        let (_, aggregator) = setup();
        let err = aggregator.recompute_range(day(14), day(10)).await.unwrap_err();
        assert_eq!(err.code(), "validation_failed");
    }

    #[tokio::test]
    async fn test_mark_reconciled_survives_recompute() {
        let (store, aggregator) = setup();
        add_movement(&store, day(14), CashDirection::Inflow, 10000).await;

        let summary = aggregator.mark_reconciled(day(14), "ops").await.unwrap();
        assert!(summary.is_reconciled);
        assert_eq!(summary.reconciled_by.as_deref(), Some("ops"));

        add_movement(&store, day(14), CashDirection::Outflow, 500).await;
        let recomputed = aggregator.recompute_with_retry(day(14)).await.unwrap();
        assert!(recomputed.is_reconciled);
        assert_eq!(recomputed.reconciled_by.as_deref(), Some("ops"));
        assert_eq!(recomputed.total_outflows, Decimal::new(500, 2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_recomputes_converge() {
        let store = Arc::new(MemoryStore::new());
        add_movement(&store, day(14), CashDirection::Inflow, 10000).await;
        add_movement(&store, day(14), CashDirection::Outflow, 4000).await;

        // Budget large enough that even the unluckiest of the 5 writers
        // wins a compare-and-swap round before exhausting it
        let retry = RetryConfig {
            max_attempts: 8,
            base_delay_ms: 1,
            jitter_ms: 2,
        };

        let mut handles = Vec::new();
        for _ in 0..5 {
            let aggregator = DailySummaryAggregator::new(store.clone(), retry.clone());
            handles.push(tokio::spawn(async move {
                aggregator.recompute_with_retry(day(14)).await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        // All callers converge on the same, internally consistent row
        let stored = store.summary_for_day(day(14)).await.unwrap().unwrap().summary;
        for summary in results {
            assert_eq!(summary, stored);
        }
        assert!(stored.is_balanced());
        assert_eq!(stored.closing_balance, Decimal::new(6000, 2));
    }
}
