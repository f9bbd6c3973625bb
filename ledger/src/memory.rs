//! In-memory reference store
//!
//! Backs the test suite and stands in for the relational store in demos.
//! One `parking_lot::RwLock` guards all tables; the lock scope is the
//! atomicity boundary, so the atomic combinations of [`AccountingStore`]
//! hold by construction. Summary rows carry a monotonic version for
//! compare-and-swap, mirroring what a relational implementation would do
//! with a version column.

use crate::store::{AccountingStore, UpsertOutcome};
use crate::types::{
    CashMovement, CashSource, DailySummary, DocumentRef, LedgerEntry, OpeningBalanceAudit,
    ReferenceKind, SourceDocument, VersionedSummary,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

type Triple = (Uuid, ReferenceKind, CashSource);

#[derive(Default)]
struct Inner {
    customers: HashSet<Uuid>,
    entries: HashMap<Uuid, LedgerEntry>,
    movements: HashMap<Uuid, CashMovement>,
    /// Duplicate-prevention index: (reference id, reference kind, source) -> movement id
    triple_index: HashMap<Triple, Uuid>,
    summaries: BTreeMap<NaiveDate, (DailySummary, u64)>,
    audits: Vec<OpeningBalanceAudit>,
}

/// In-memory [`AccountingStore`] implementation
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a customer so existence checks pass
    pub fn seed_customer(&self, customer_id: Uuid) {
        self.inner.write().customers.insert(customer_id);
    }

    fn triple(movement: &CashMovement) -> Option<Triple> {
        movement
            .reference
            .map(|r| (r.id, r.kind, movement.source))
    }

    fn insert_movement_locked(inner: &mut Inner, movement: &CashMovement) -> Result<()> {
        if let Some(triple) = Self::triple(movement) {
            if inner.triple_index.contains_key(&triple) {
                return Err(Error::DuplicateEntry {
                    reference_id: triple.0,
                    reference_kind: triple.1,
                    movement_source: triple.2,
                });
            }
            inner.triple_index.insert(triple, movement.id);
        }
        inner.movements.insert(movement.id, movement.clone());
        Ok(())
    }

    fn remove_movement_locked(inner: &mut Inner, id: Uuid) -> Option<CashMovement> {
        let movement = inner.movements.remove(&id)?;
        if let Some(triple) = Self::triple(&movement) {
            inner.triple_index.remove(&triple);
        }
        Some(movement)
    }

    fn delete_for_reference_locked(
        inner: &mut Inner,
        reference: &DocumentRef,
    ) -> Vec<CashMovement> {
        let ids: Vec<Uuid> = inner
            .movements
            .values()
            .filter(|m| m.reference.as_ref() == Some(reference))
            .map(|m| m.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| Self::remove_movement_locked(inner, id))
            .collect()
    }

    fn upsert_summary_locked(
        inner: &mut Inner,
        summary: &DailySummary,
        expected_version: Option<u64>,
    ) -> UpsertOutcome {
        match (inner.summaries.get(&summary.date), expected_version) {
            (None, None) => {
                inner.summaries.insert(summary.date, (summary.clone(), 1));
                UpsertOutcome::Applied(VersionedSummary {
                    summary: summary.clone(),
                    version: 1,
                })
            }
            (Some((_, version)), Some(expected)) if *version == expected => {
                let next = expected + 1;
                inner.summaries.insert(summary.date, (summary.clone(), next));
                UpsertOutcome::Applied(VersionedSummary {
                    summary: summary.clone(),
                    version: next,
                })
            }
            _ => UpsertOutcome::Conflict,
        }
    }
}

#[async_trait]
impl AccountingStore for MemoryStore {
    async fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let mut inner = self.inner.write();
        inner.entries.insert(entry.id, entry.clone());
        tracing::debug!(entry_id = %entry.id, customer_id = %entry.customer_id, "ledger entry appended");
        Ok(())
    }

    async fn get_entry(&self, id: Uuid) -> Result<LedgerEntry> {
        self.inner
            .read()
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("ledger_entry", id))
    }

    async fn entries_for_customer(&self, customer_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .inner
            .read()
            .entries
            .values()
            .filter(|e| e.customer_id == customer_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(entries)
    }

    async fn entries_for_document(&self, document: &SourceDocument) -> Result<Vec<LedgerEntry>> {
        let entries = self
            .inner
            .read()
            .entries
            .values()
            .filter(|e| e.document.as_ref() == Some(document))
            .cloned()
            .collect();
        Ok(entries)
    }

    async fn insert_movement(&self, movement: &CashMovement) -> Result<()> {
        let mut inner = self.inner.write();
        Self::insert_movement_locked(&mut inner, movement)?;
        tracing::debug!(movement_id = %movement.id, date = %movement.date, "cash movement inserted");
        Ok(())
    }

    async fn movements_for_reference(&self, reference: &DocumentRef) -> Result<Vec<CashMovement>> {
        let movements = self
            .inner
            .read()
            .movements
            .values()
            .filter(|m| m.reference.as_ref() == Some(reference))
            .cloned()
            .collect();
        Ok(movements)
    }

    async fn update_movement(&self, movement: &CashMovement) -> Result<()> {
        let mut inner = self.inner.write();
        let old = inner
            .movements
            .get(&movement.id)
            .cloned()
            .ok_or_else(|| Error::not_found("cash_movement", movement.id))?;

        let old_triple = Self::triple(&old);
        let new_triple = Self::triple(movement);
        if old_triple != new_triple {
            if let Some(triple) = new_triple {
                if inner.triple_index.contains_key(&triple) {
                    return Err(Error::DuplicateEntry {
                        reference_id: triple.0,
                        reference_kind: triple.1,
                        movement_source: triple.2,
                    });
                }
                inner.triple_index.insert(triple, movement.id);
            }
            if let Some(triple) = old_triple {
                inner.triple_index.remove(&triple);
            }
        }
        inner.movements.insert(movement.id, movement.clone());
        Ok(())
    }

    async fn delete_movements_for_reference(
        &self,
        reference: &DocumentRef,
    ) -> Result<Vec<CashMovement>> {
        let mut inner = self.inner.write();
        Ok(Self::delete_for_reference_locked(&mut inner, reference))
    }

    async fn movements_for_day(&self, date: NaiveDate) -> Result<Vec<CashMovement>> {
        let movements = self
            .inner
            .read()
            .movements
            .values()
            .filter(|m| m.date == date)
            .cloned()
            .collect();
        Ok(movements)
    }

    async fn summary_for_day(&self, date: NaiveDate) -> Result<Option<VersionedSummary>> {
        Ok(self
            .inner
            .read()
            .summaries
            .get(&date)
            .map(|(summary, version)| VersionedSummary {
                summary: summary.clone(),
                version: *version,
            }))
    }

    async fn latest_summary_before(&self, date: NaiveDate) -> Result<Option<DailySummary>> {
        Ok(self
            .inner
            .read()
            .summaries
            .range(..date)
            .next_back()
            .map(|(_, (summary, _))| summary.clone()))
    }

    async fn upsert_summary(
        &self,
        summary: &DailySummary,
        expected_version: Option<u64>,
    ) -> Result<UpsertOutcome> {
        let mut inner = self.inner.write();
        Ok(Self::upsert_summary_locked(&mut inner, summary, expected_version))
    }

    async fn audits_for_day(&self, date: NaiveDate) -> Result<Vec<OpeningBalanceAudit>> {
        let audits = self
            .inner
            .read()
            .audits
            .iter()
            .filter(|a| a.summary_date == date)
            .cloned()
            .collect();
        Ok(audits)
    }

    async fn customer_exists(&self, customer_id: Uuid) -> Result<bool> {
        Ok(self.inner.read().customers.contains(&customer_id))
    }

    async fn append_event_atomic(
        &self,
        entry: Option<&LedgerEntry>,
        movement: &CashMovement,
    ) -> Result<()> {
        let mut inner = self.inner.write();

        // Duplicate check happens inside the lock, before any write,
        // so a failure leaves both tables untouched.
        Self::insert_movement_locked(&mut inner, movement)?;
        if let Some(entry) = entry {
            inner.entries.insert(entry.id, entry.clone());
        }

        tracing::debug!(
            movement_id = %movement.id,
            has_entry = entry.is_some(),
            date = %movement.date,
            "financial event committed"
        );
        Ok(())
    }

    async fn apply_opening_balance(
        &self,
        summary: &DailySummary,
        expected_version: Option<u64>,
        audit: &OpeningBalanceAudit,
    ) -> Result<UpsertOutcome> {
        let mut inner = self.inner.write();
        let outcome = Self::upsert_summary_locked(&mut inner, summary, expected_version);
        if let UpsertOutcome::Applied(_) = outcome {
            inner.audits.push(audit.clone());
            tracing::info!(
                date = %summary.date,
                old = %audit.old_opening_balance,
                new = %audit.new_opening_balance,
                changed_by = %audit.changed_by,
                "opening balance overridden"
            );
        }
        Ok(outcome)
    }

    async fn remove_document_atomic(
        &self,
        document: &SourceDocument,
        reference: Option<&DocumentRef>,
    ) -> Result<Vec<CashMovement>> {
        let mut inner = self.inner.write();

        let entry_ids: Vec<Uuid> = inner
            .entries
            .values()
            .filter(|e| e.document.as_ref() == Some(document))
            .map(|e| e.id)
            .collect();
        for id in &entry_ids {
            inner.entries.remove(id);
        }

        // Movements linked directly to the deleted entries go with them
        let mut deleted = Vec::new();
        for id in &entry_ids {
            let entry_ref = DocumentRef {
                id: *id,
                kind: ReferenceKind::Ledger,
            };
            deleted.extend(Self::delete_for_reference_locked(&mut inner, &entry_ref));
        }

        if let Some(reference) = reference {
            deleted.extend(Self::delete_for_reference_locked(&mut inner, reference));
        }

        tracing::info!(
            document_id = %document.document_id(),
            entries_deleted = entry_ids.len(),
            movements_deleted = deleted.len(),
            "document cascade removed"
        );
        Ok(deleted)
    }

    async fn remove_entry_atomic(&self, entry_id: Uuid) -> Result<Vec<CashMovement>> {
        let mut inner = self.inner.write();
        inner
            .entries
            .remove(&entry_id)
            .ok_or_else(|| Error::not_found("ledger_entry", entry_id))?;

        let reference = DocumentRef {
            id: entry_id,
            kind: ReferenceKind::Ledger,
        };
        Ok(Self::delete_for_reference_locked(&mut inner, &reference))
    }
}
