//! Consistency coordinator
//!
//! Entry point for external collaborators (receipt, expense, and
//! manual-entry modules). One financial fact that lands in both the
//! customer ledger and the cash book is written as a single atomic store
//! operation; the affected day's summary is recomputed immediately
//! afterwards, outside the atomic write, under the retry policy.
//!
//! Keeping the recompute outside the transaction leaves a narrow window
//! where a reader can observe a summary briefly stale relative to the
//! movements that caused it. That eventual-consistency window is a
//! deliberate tradeoff (a full-day aggregate read inside the write
//! transaction would raise lock contention out of proportion to the
//! summary's low update frequency), not a bug.

use crate::aggregator::DailySummaryAggregator;
use crate::audit::{OpeningBalanceChange, OpeningBalanceRecorder};
use crate::config::Config;
use crate::recorder::{distinct_dates, CashMovementRecorder, CashMovementUpdate, NewCashMovement};
use crate::Result;
use chrono::{NaiveDate, Utc};
use ledger::{
    running_balances, AccountingStore, CashDirection, CashMovement, CashSource, DailySummary,
    DocumentRef, LedgerEntry, LedgerKind, LedgerPage, ReferenceKind, SourceDocument,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// One financial event as described by an external collaborator
#[derive(Debug, Clone)]
pub struct FinancialEvent {
    /// Customer whose ledger is touched; `None` for pure cash events
    /// (expenses, manual till movements) with no ledger side
    pub customer_id: Option<Uuid>,
    /// Ledger entry classification
    pub ledger_kind: LedgerKind,
    /// Document the ledger entry is born from, if any
    pub document: Option<SourceDocument>,
    /// Debit amount (>= 0; exactly one of debit/credit nonzero)
    pub debit: Decimal,
    /// Credit amount (>= 0)
    pub credit: Decimal,
    /// Description shared by the entry and the movement
    pub description: String,
    /// Cash direction
    pub cash_direction: CashDirection,
    /// Cash amount (strictly positive)
    pub cash_amount: Decimal,
    /// Calendar day the cash moved
    pub cash_date: NaiveDate,
    /// Origin of the cash movement
    pub source: CashSource,
    /// Reference for duplicate prevention; for `CashSource::Ledger` this
    /// may be left `None` and the movement is linked to the new entry
    pub reference: Option<DocumentRef>,
    /// Who recorded the event
    pub created_by: String,
}

/// A recorded financial event, both sides, plus the recomputed summary
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    /// The ledger entry (absent for pure cash events)
    pub entry: Option<LedgerEntry>,
    /// The cash movement
    pub movement: CashMovement,
    /// The day's summary after the post-commit recompute
    pub summary: DailySummary,
}

/// Orchestrates multi-store writes and summary recomputation
pub struct Coordinator {
    store: Arc<dyn AccountingStore>,
    recorder: CashMovementRecorder,
    aggregator: DailySummaryAggregator,
    opening: OpeningBalanceRecorder,
}

impl Coordinator {
    /// Create a coordinator over a store
    pub fn new(store: Arc<dyn AccountingStore>, config: Config) -> Self {
        Self {
            recorder: CashMovementRecorder::new(
                store.clone(),
                config.validation.future_date_grace_days,
            ),
            aggregator: DailySummaryAggregator::new(store.clone(), config.retry.clone()),
            opening: OpeningBalanceRecorder::new(
                store.clone(),
                config.retry.clone(),
                &config.validation,
            ),
            store,
        }
    }

    /// Record one financial event
    ///
    /// Ledger entry and cash movement commit as one unit; the day's
    /// summary is recomputed afterwards under the retry policy. A
    /// concurrency failure after the commit is surfaced, not swallowed:
    /// the written rows stay committed and the caller may retry the
    /// recompute alone.
    pub async fn record_financial_event(&self, event: FinancialEvent) -> Result<RecordedEvent> {
        let entry = match event.customer_id {
            Some(customer_id) => {
                if !self.store.customer_exists(customer_id).await? {
                    return Err(ledger::Error::not_found("customer", customer_id).into());
                }

                let entry = LedgerEntry {
                    id: Uuid::now_v7(),
                    customer_id,
                    kind: event.ledger_kind,
                    document: event.document,
                    description: event.description.clone(),
                    debit: event.debit,
                    credit: event.credit,
                    is_direct_cash: event.ledger_kind == LedgerKind::DirectCash,
                    created_at: Utc::now(),
                };
                entry.validate()?;
                Some(entry)
            }
            None => None,
        };

        // A ledger-sourced movement with no explicit reference is tied to
        // the entry being created, so document edits can find it later
        let reference = match (event.reference, event.source, &entry) {
            (Some(reference), _, _) => Some(reference),
            (None, CashSource::Ledger, Some(entry)) => Some(DocumentRef {
                id: entry.id,
                kind: ReferenceKind::Ledger,
            }),
            _ => None,
        };

        let movement = self
            .recorder
            .prepare(NewCashMovement {
                date: event.cash_date,
                direction: event.cash_direction,
                amount: event.cash_amount,
                description: event.description,
                source: event.source,
                reference,
                customer_id: event.customer_id,
                is_direct_cash: entry.as_ref().map(|e| e.is_direct_cash).unwrap_or(false),
                created_by: event.created_by,
            })
            .await?;

        self.store
            .append_event_atomic(entry.as_ref(), &movement)
            .await?;

        info!(
            movement_id = %movement.id,
            customer_id = ?event.customer_id,
            date = %movement.date,
            amount = %movement.amount,
            "financial event recorded"
        );

        // Outside the atomic write, with retries (see module docs)
        let summary = self.aggregator.recompute_with_retry(movement.date).await?;

        Ok(RecordedEvent {
            entry,
            movement,
            summary,
        })
    }

    /// Revise or delete the movements derived from a document, then
    /// recompute every affected day (all-settled)
    pub async fn revise_cash_movement_for_source(
        &self,
        reference: &DocumentRef,
        update: Option<CashMovementUpdate>,
    ) -> Result<Vec<NaiveDate>> {
        let dates = self.recorder.revise_for_source(reference, update).await?;
        self.aggregator.recompute_days(&dates).await?;
        Ok(dates)
    }

    /// Recompute one day's summary
    pub async fn recompute_daily_summary(&self, date: NaiveDate) -> Result<DailySummary> {
        self.aggregator.recompute_with_retry(date).await
    }

    /// Recompute an inclusive range of days
    pub async fn recompute_daily_summary_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySummary>> {
        self.aggregator.recompute_range(start, end).await
    }

    /// Manually override a day's opening balance (audited)
    pub async fn set_opening_balance(
        &self,
        date: NaiveDate,
        value: Decimal,
        reason: &str,
        changed_by: &str,
    ) -> Result<OpeningBalanceChange> {
        self.opening
            .set_opening_balance(date, value, reason, changed_by)
            .await
    }

    /// Mark a day's summary reconciled
    pub async fn mark_reconciled(&self, date: NaiveDate, by: &str) -> Result<DailySummary> {
        self.aggregator.mark_reconciled(date, by).await
    }

    /// One page of a customer's ledger with running balances
    ///
    /// Balances are computed over the complete entry set before the page
    /// is cut, so `outstanding` is always the true customer balance.
    pub async fn customer_ledger_with_balance(
        &self,
        customer_id: Uuid,
        page: usize,
        page_size: usize,
    ) -> Result<LedgerPage> {
        if !self.store.customer_exists(customer_id).await? {
            return Err(ledger::Error::not_found("customer", customer_id).into());
        }
        let entries = self.store.entries_for_customer(customer_id).await?;
        let paged = ledger::balance::paginate(running_balances(entries), page, page_size)?;
        Ok(paged)
    }

    /// Document-deletion cascade: remove the ledger entries born from a
    /// receipt and the cash movements derived from it, then recompute the
    /// affected days. Returns the dates touched.
    pub async fn remove_document(&self, document: &SourceDocument) -> Result<Vec<NaiveDate>> {
        // Entry receipts have no cash side; clearance receipts do
        let reference = match document {
            SourceDocument::EntryReceipt(_) => None,
            SourceDocument::ClearanceReceipt(id) => Some(DocumentRef {
                id: *id,
                kind: ReferenceKind::Clearance,
            }),
        };

        let deleted = self
            .store
            .remove_document_atomic(document, reference.as_ref())
            .await?;

        let dates = distinct_dates(deleted.iter().map(|m| m.date));
        self.aggregator.recompute_days(&dates).await?;
        Ok(dates)
    }

    /// Delete a direct-cash ledger entry together with its movement
    ///
    /// Entries born from receipts are immutable here; they only go away
    /// through [`Self::remove_document`].
    pub async fn delete_manual_entry(&self, entry_id: Uuid) -> Result<Vec<NaiveDate>> {
        let entry = self.store.get_entry(entry_id).await?;
        if !entry.is_direct_cash {
            return Err(ledger::Error::validation(
                "entry",
                "only direct-cash entries may be deleted directly",
            )
            .into());
        }

        let deleted = self.store.remove_entry_atomic(entry_id).await?;
        info!(entry_id = %entry_id, movements = deleted.len(), "manual entry deleted");

        let dates = distinct_dates(deleted.iter().map(|m| m.date));
        self.aggregator.recompute_days(&dates).await?;
        Ok(dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, Coordinator) {
        let store = Arc::new(MemoryStore::new());
        let mut config = Config::default();
        config.retry.base_delay_ms = 1;
        config.retry.jitter_ms = 1;
        let coordinator = Coordinator::new(store.clone(), config);
        (store, coordinator)
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn clearance_event(customer_id: Uuid, receipt_id: Uuid) -> FinancialEvent {
        FinancialEvent {
            customer_id: Some(customer_id),
            ledger_kind: LedgerKind::Clearance,
            document: Some(SourceDocument::ClearanceReceipt(receipt_id)),
            debit: Decimal::ZERO,
            credit: Decimal::new(250000, 2),
            description: "clearance of 10 crates".to_string(),
            cash_direction: CashDirection::Inflow,
            cash_amount: Decimal::new(250000, 2),
            cash_date: today(),
            source: CashSource::Clearance,
            reference: Some(DocumentRef {
                id: receipt_id,
                kind: ReferenceKind::Clearance,
            }),
            created_by: "ops".to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_event_writes_both_sides_and_recomputes() {
        let (store, coordinator) = setup();
        let customer = Uuid::new_v4();
        store.seed_customer(customer);

        let recorded = coordinator
            .record_financial_event(clearance_event(customer, Uuid::new_v4()))
            .await
            .unwrap();

        let entry = recorded.entry.unwrap();
        assert_eq!(entry.credit, Decimal::new(250000, 2));
        assert_eq!(recorded.movement.amount, Decimal::new(250000, 2));
        assert_eq!(recorded.summary.total_inflows, Decimal::new(250000, 2));
        assert!(recorded.summary.is_balanced());

        assert_eq!(store.entries_for_customer(customer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_event_rejected_whole() {
        let (store, coordinator) = setup();
        let customer = Uuid::new_v4();
        store.seed_customer(customer);
        let receipt = Uuid::new_v4();

        coordinator
            .record_financial_event(clearance_event(customer, receipt))
            .await
            .unwrap();

        let err = coordinator
            .record_financial_event(clearance_event(customer, receipt))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "duplicate_entry");

        // Neither a second entry nor a second movement was written
        assert_eq!(store.entries_for_customer(customer).await.unwrap().len(), 1);
        let reference = DocumentRef {
            id: receipt,
            kind: ReferenceKind::Clearance,
        };
        assert_eq!(store.movements_for_reference(&reference).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_customer_rejected_before_any_write() {
        let (store, coordinator) = setup();
        let customer = Uuid::new_v4();

        let err = coordinator
            .record_financial_event(clearance_event(customer, Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert!(store.movements_for_day(today()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pure_cash_event_has_no_ledger_side() {
        let (store, coordinator) = setup();

        let recorded = coordinator
            .record_financial_event(FinancialEvent {
                customer_id: None,
                ledger_kind: LedgerKind::Other,
                document: None,
                debit: Decimal::ZERO,
                credit: Decimal::ZERO,
                description: "electricity bill".to_string(),
                cash_direction: CashDirection::Outflow,
                cash_amount: Decimal::new(18000, 2),
                cash_date: today(),
                source: CashSource::Expense,
                reference: Some(DocumentRef {
                    id: Uuid::new_v4(),
                    kind: ReferenceKind::Expense,
                }),
                created_by: "ops".to_string(),
            })
            .await
            .unwrap();

        assert!(recorded.entry.is_none());
        assert_eq!(recorded.summary.total_outflows, Decimal::new(18000, 2));
        assert_eq!(store.movements_for_day(today()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_sourced_movement_auto_links_to_entry() {
        let (store, coordinator) = setup();
        let customer = Uuid::new_v4();
        store.seed_customer(customer);

        let recorded = coordinator
            .record_financial_event(FinancialEvent {
                customer_id: Some(customer),
                ledger_kind: LedgerKind::DirectCash,
                document: None,
                debit: Decimal::ZERO,
                credit: Decimal::new(50000, 2),
                description: "cash against account".to_string(),
                cash_direction: CashDirection::Inflow,
                cash_amount: Decimal::new(50000, 2),
                cash_date: today(),
                source: CashSource::Ledger,
                reference: None,
                created_by: "ops".to_string(),
            })
            .await
            .unwrap();

        let entry = recorded.entry.unwrap();
        assert_eq!(
            recorded.movement.reference,
            Some(DocumentRef {
                id: entry.id,
                kind: ReferenceKind::Ledger,
            })
        );
        assert!(entry.is_direct_cash);
        assert!(recorded.movement.is_direct_cash);

        // The auto-link makes the manual-entry cascade find the movement
        let dates = coordinator.delete_manual_entry(entry.id).await.unwrap();
        assert_eq!(dates, vec![today()]);
        assert!(store.movements_for_day(today()).await.unwrap().is_empty());

        let summary = store.summary_for_day(today()).await.unwrap().unwrap().summary;
        assert_eq!(summary.total_inflows, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_delete_manual_entry_rejects_receipt_born_entries() {
        let (store, coordinator) = setup();
        let customer = Uuid::new_v4();
        store.seed_customer(customer);

        let recorded = coordinator
            .record_financial_event(clearance_event(customer, Uuid::new_v4()))
            .await
            .unwrap();

        let err = coordinator
            .delete_manual_entry(recorded.entry.unwrap().id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation_failed");
    }

    #[tokio::test]
    async fn test_remove_document_cascades_and_recomputes() {
        let (store, coordinator) = setup();
        let customer = Uuid::new_v4();
        store.seed_customer(customer);
        let receipt = Uuid::new_v4();

        coordinator
            .record_financial_event(clearance_event(customer, receipt))
            .await
            .unwrap();

        let dates = coordinator
            .remove_document(&SourceDocument::ClearanceReceipt(receipt))
            .await
            .unwrap();
        assert_eq!(dates, vec![today()]);

        assert!(store.entries_for_customer(customer).await.unwrap().is_empty());
        let summary = store.summary_for_day(today()).await.unwrap().unwrap().summary;
        assert_eq!(summary.total_inflows, Decimal::ZERO);
        assert!(summary.is_balanced());

        // Removing it again touches nothing
        let dates = coordinator
            .remove_document(&SourceDocument::ClearanceReceipt(receipt))
            .await
            .unwrap();
        assert!(dates.is_empty());
    }

    #[tokio::test]
    async fn test_remove_entry_receipt_cascades_auto_linked_movement() {
        let (store, coordinator) = setup();
        let customer = Uuid::new_v4();
        store.seed_customer(customer);
        let receipt = Uuid::new_v4();

        coordinator
            .record_financial_event(FinancialEvent {
                customer_id: Some(customer),
                ledger_kind: LedgerKind::InventoryAdded,
                document: Some(SourceDocument::EntryReceipt(receipt)),
                debit: Decimal::new(500000, 2),
                credit: Decimal::ZERO,
                description: "inventory".to_string(),
                cash_direction: CashDirection::Inflow,
                cash_amount: Decimal::new(500000, 2),
                cash_date: today(),
                source: CashSource::Ledger,
                reference: None,
                created_by: "ops".to_string(),
            })
            .await
            .unwrap();

        let dates = coordinator
            .remove_document(&SourceDocument::EntryReceipt(receipt))
            .await
            .unwrap();
        assert_eq!(dates, vec![today()]);

        // The auto-linked movement is gone and the day no longer carries
        // the deleted receipt's cash
        assert!(store.entries_for_customer(customer).await.unwrap().is_empty());
        assert!(store.movements_for_day(today()).await.unwrap().is_empty());
        let summary = store.summary_for_day(today()).await.unwrap().unwrap().summary;
        assert_eq!(summary.total_inflows, Decimal::ZERO);
        assert!(summary.is_balanced());
    }

    #[tokio::test]
    async fn test_customer_ledger_with_balance_requires_customer() {
        let (_, coordinator) = setup();
        let err = coordinator
            .customer_ledger_with_balance(Uuid::new_v4(), 1, 10)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
