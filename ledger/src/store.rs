//! Store abstraction over the transactional backing store
//!
//! Components never touch a database handle directly; they receive an
//! [`AccountingStore`] at construction. The trait's atomic combinations are
//! the unit-of-work boundaries: implementations must commit each of them
//! entirely or not at all.
//!
//! Write conflicts on daily summaries are reported as an explicit
//! [`UpsertOutcome::Conflict`], decoupled from any particular engine's
//! unique-constraint error codes, so the retry loop upstream stays portable.

use crate::types::{
    CashMovement, DailySummary, DocumentRef, LedgerEntry, OpeningBalanceAudit, SourceDocument,
    VersionedSummary,
};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

/// Result of a versioned daily-summary upsert
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// The write committed; carries the new version
    Applied(VersionedSummary),
    /// Another writer got there first; re-read and recompute
    Conflict,
}

/// Persistence contract for the accounting core
///
/// One implementation backs all components so the atomic combinations can
/// span stores. The reference implementation is [`crate::MemoryStore`].
#[async_trait]
pub trait AccountingStore: Send + Sync {
    // Ledger entries (append-only)

    /// Append one ledger entry
    async fn append_entry(&self, entry: &LedgerEntry) -> Result<()>;

    /// Fetch an entry by id
    async fn get_entry(&self, id: Uuid) -> Result<LedgerEntry>;

    /// All entries for a customer, in `(created_at, id)` order
    async fn entries_for_customer(&self, customer_id: Uuid) -> Result<Vec<LedgerEntry>>;

    /// All entries born from a document
    async fn entries_for_document(&self, document: &SourceDocument) -> Result<Vec<LedgerEntry>>;

    // Cash movements

    /// Insert a movement; fails with `DuplicateEntry` when a movement with
    /// the same (reference id, reference kind, source) triple exists
    async fn insert_movement(&self, movement: &CashMovement) -> Result<()>;

    /// All movements pointing at a reference, any source
    async fn movements_for_reference(&self, reference: &DocumentRef) -> Result<Vec<CashMovement>>;

    /// Update a movement in place (same row identity); `NotFound` if absent
    async fn update_movement(&self, movement: &CashMovement) -> Result<()>;

    /// Delete all movements pointing at a reference; returns the deleted
    /// rows (empty when nothing matched — idempotent deletion)
    async fn delete_movements_for_reference(
        &self,
        reference: &DocumentRef,
    ) -> Result<Vec<CashMovement>>;

    /// All movements on a calendar day
    async fn movements_for_day(&self, date: NaiveDate) -> Result<Vec<CashMovement>>;

    // Daily summaries

    /// The summary row for a day, with its version, if one exists
    async fn summary_for_day(&self, date: NaiveDate) -> Result<Option<VersionedSummary>>;

    /// The most recent summary strictly before a day (for opening-balance
    /// chaining across calendar gaps)
    async fn latest_summary_before(&self, date: NaiveDate) -> Result<Option<DailySummary>>;

    /// Versioned upsert: `expected_version` must match the stored version
    /// (or be `None` for an insert of a day with no row yet)
    async fn upsert_summary(
        &self,
        summary: &DailySummary,
        expected_version: Option<u64>,
    ) -> Result<UpsertOutcome>;

    // Opening-balance audit (append-only, written via apply_opening_balance)

    /// Audit rows for a day, oldest first
    async fn audits_for_day(&self, date: NaiveDate) -> Result<Vec<OpeningBalanceAudit>>;

    // Customers

    /// Whether a customer record exists
    async fn customer_exists(&self, customer_id: Uuid) -> Result<bool>;

    // Atomic combinations

    /// Write a ledger entry (when present) and its cash movement as one
    /// unit: both commit or neither does
    async fn append_event_atomic(
        &self,
        entry: Option<&LedgerEntry>,
        movement: &CashMovement,
    ) -> Result<()>;

    /// Apply a manual opening-balance change: the summary upsert and the
    /// audit row commit together or not at all; the audit row is only
    /// written when the upsert applies
    async fn apply_opening_balance(
        &self,
        summary: &DailySummary,
        expected_version: Option<u64>,
        audit: &OpeningBalanceAudit,
    ) -> Result<UpsertOutcome>;

    /// Document-deletion cascade: remove the entries born from `document`,
    /// the movements linked to those entries (reference kind `Ledger`),
    /// and, when given, the movements pointing at `reference`, atomically.
    /// Returns the deleted movements (their dates need recomputing).
    async fn remove_document_atomic(
        &self,
        document: &SourceDocument,
        reference: Option<&DocumentRef>,
    ) -> Result<Vec<CashMovement>>;

    /// Delete a single ledger entry together with the movements that
    /// reference it. Returns the deleted movements.
    async fn remove_entry_atomic(&self, entry_id: Uuid) -> Result<Vec<CashMovement>>;
}
