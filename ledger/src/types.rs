//! Core types for the customer ledger and cash book
//!
//! All types are designed for:
//! - Exact arithmetic (Decimal for money)
//! - Closed tagged unions for every classification (no stringly-typed records)
//! - Calendar-day granularity for summaries, full timestamps for entries/movements

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// True if the amount carries at most two fractional digits.
pub fn max_two_decimals(amount: Decimal) -> bool {
    amount == amount.round_dp(2)
}

/// Classification of a customer ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerKind {
    /// Goods entered into cold storage (customer starts owing)
    InventoryAdded,
    /// Goods cleared out and settled
    Clearance,
    /// Manually entered cash against the customer account
    DirectCash,
    /// Anything else (adjustments, write-offs)
    Other,
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LedgerKind::InventoryAdded => "inventory_added",
            LedgerKind::Clearance => "clearance",
            LedgerKind::DirectCash => "direct_cash",
            LedgerKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Originating document of a ledger entry
///
/// An entry is born from at most one document; the two receipt kinds are
/// mutually exclusive with each other and with direct cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceDocument {
    /// Inventory entry receipt
    EntryReceipt(Uuid),
    /// Clearance receipt
    ClearanceReceipt(Uuid),
}

impl SourceDocument {
    /// Id of the underlying receipt
    pub fn document_id(&self) -> Uuid {
        match self {
            SourceDocument::EntryReceipt(id) | SourceDocument::ClearanceReceipt(id) => *id,
        }
    }
}

/// One customer financial event (a single directional movement)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (UUIDv7 for time-ordering; the ordering tie-break)
    pub id: Uuid,

    /// Customer this entry belongs to
    pub customer_id: Uuid,

    /// Classification
    pub kind: LedgerKind,

    /// Originating document, if any
    pub document: Option<SourceDocument>,

    /// Human-readable description
    pub description: String,

    /// Debit amount (customer owes more), >= 0
    pub debit: Decimal,

    /// Credit amount (customer owes less), >= 0
    pub credit: Decimal,

    /// Manually entered cash, deletable without a document cascade
    pub is_direct_cash: bool,

    /// Authoritative ordering timestamp
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Net effect of this entry on the customer balance
    pub fn signed_amount(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Check entry invariants
    ///
    /// Exactly one of debit/credit must be nonzero, amounts must be
    /// non-negative with at most two decimal places, and a direct-cash
    /// entry cannot also carry a document link.
    pub fn validate(&self) -> crate::Result<()> {
        if self.debit < Decimal::ZERO || self.credit < Decimal::ZERO {
            return Err(crate::Error::validation(
                "amount",
                "debit and credit must be non-negative",
            ));
        }
        if (self.debit.is_zero()) == (self.credit.is_zero()) {
            return Err(crate::Error::validation(
                "amount",
                "exactly one of debit/credit must be nonzero",
            ));
        }
        if !max_two_decimals(self.debit) || !max_two_decimals(self.credit) {
            return Err(crate::Error::validation(
                "amount",
                "amounts are limited to two decimal places",
            ));
        }
        if self.description.trim().is_empty() {
            return Err(crate::Error::validation(
                "description",
                "description must not be empty",
            ));
        }
        if self.is_direct_cash && self.document.is_some() {
            return Err(crate::Error::validation(
                "document",
                "a direct-cash entry cannot reference a document",
            ));
        }
        if (self.kind == LedgerKind::DirectCash) != self.is_direct_cash {
            return Err(crate::Error::validation(
                "kind",
                "direct-cash flag must match the direct-cash kind",
            ));
        }
        Ok(())
    }
}

/// Direction of a physical cash event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CashDirection {
    /// Cash received
    Inflow,
    /// Cash paid out
    Outflow,
}

impl fmt::Display for CashDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CashDirection::Inflow => "inflow",
            CashDirection::Outflow => "outflow",
        };
        write!(f, "{}", s)
    }
}

/// Origin of a cash movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CashSource {
    /// Derived from a clearance receipt
    Clearance,
    /// Derived from a customer ledger entry
    Ledger,
    /// Business expense
    Expense,
    /// Entered manually
    Manual,
}

impl fmt::Display for CashSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CashSource::Clearance => "clearance",
            CashSource::Ledger => "ledger",
            CashSource::Expense => "expense",
            CashSource::Manual => "manual",
        };
        write!(f, "{}", s)
    }
}

/// What a cash movement reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// A customer ledger entry
    Ledger,
    /// A clearance receipt
    Clearance,
    /// An expense record
    Expense,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReferenceKind::Ledger => "ledger",
            ReferenceKind::Clearance => "clearance",
            ReferenceKind::Expense => "expense",
        };
        write!(f, "{}", s)
    }
}

/// Pointer from a cash movement back to its originating record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Id of the originating ledger entry / clearance / expense
    pub id: Uuid,
    /// Which table the id points into
    pub kind: ReferenceKind,
}

/// One physical cash inflow/outflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashMovement {
    /// Unique movement ID
    pub id: Uuid,

    /// Calendar day the cash moved (time-truncated)
    pub date: NaiveDate,

    /// Inflow or outflow
    pub direction: CashDirection,

    /// Amount, strictly positive, at most two decimal places
    pub amount: Decimal,

    /// Human-readable description
    pub description: String,

    /// Where this movement came from
    pub source: CashSource,

    /// Originating record; at most one movement may exist per
    /// (reference id, reference kind, source) triple
    pub reference: Option<DocumentRef>,

    /// Customer involved, if any
    pub customer_id: Option<Uuid>,

    /// Manually entered cash
    pub is_direct_cash: bool,

    /// Who recorded the movement
    pub created_by: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl CashMovement {
    /// Signed effect on the cash balance (inflow positive)
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            CashDirection::Inflow => self.amount,
            CashDirection::Outflow => -self.amount,
        }
    }
}

/// Materialized per-day aggregate of cash movements
///
/// `closing_balance == opening_balance + total_inflows - total_outflows`
/// always holds; the totals always equal the sums of same-day movements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Calendar day (unique key)
    pub date: NaiveDate,

    /// Opening balance: previous day's closing, or a manual override
    pub opening_balance: Decimal,

    /// Sum of the day's inflows
    pub total_inflows: Decimal,

    /// Sum of the day's outflows
    pub total_outflows: Decimal,

    /// opening + inflows - outflows
    pub closing_balance: Decimal,

    /// Marked reconciled by an operator
    pub is_reconciled: bool,

    /// Who reconciled the day
    pub reconciled_by: Option<String>,

    /// When the day was reconciled
    pub reconciled_at: Option<DateTime<Utc>>,
}

impl DailySummary {
    /// Check the closing-balance identity
    pub fn is_balanced(&self) -> bool {
        self.closing_balance == self.opening_balance + self.total_inflows - self.total_outflows
    }
}

/// A daily summary together with its store version (for compare-and-swap)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedSummary {
    /// The summary row
    pub summary: DailySummary,
    /// Monotonic version, bumped on every successful upsert
    pub version: u64,
}

/// Immutable record of one manual opening-balance override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningBalanceAudit {
    /// Unique audit row ID
    pub id: Uuid,

    /// Day whose opening balance changed
    pub summary_date: NaiveDate,

    /// Value before the change
    pub old_opening_balance: Decimal,

    /// Value after the change
    pub new_opening_balance: Decimal,

    /// Operator-supplied reason
    pub change_reason: String,

    /// Who made the change
    pub changed_by: String,

    /// When the change happened
    pub changed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(debit: Decimal, credit: Decimal) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::now_v7(),
            customer_id: Uuid::new_v4(),
            kind: LedgerKind::InventoryAdded,
            document: Some(SourceDocument::EntryReceipt(Uuid::new_v4())),
            description: "20 crates of apples".to_string(),
            debit,
            credit,
            is_direct_cash: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_entry_exactly_one_side_nonzero() {
        assert!(entry(Decimal::new(500000, 2), Decimal::ZERO).validate().is_ok());
        assert!(entry(Decimal::ZERO, Decimal::new(500000, 2)).validate().is_ok());

        // Both zero and both nonzero are rejected
        assert!(entry(Decimal::ZERO, Decimal::ZERO).validate().is_err());
        assert!(entry(Decimal::ONE, Decimal::ONE).validate().is_err());
    }

    #[test]
    fn test_entry_rejects_negative_and_sub_cent_amounts() {
        assert!(entry(Decimal::new(-100, 2), Decimal::ZERO).validate().is_err());
        assert!(entry(Decimal::new(10001, 3), Decimal::ZERO).validate().is_err());
    }

    #[test]
    fn test_direct_cash_excludes_document() {
        let mut e = entry(Decimal::new(1000, 2), Decimal::ZERO);
        e.kind = LedgerKind::DirectCash;
        e.is_direct_cash = true;
        assert!(e.validate().is_err());

        e.document = None;
        assert!(e.validate().is_ok());
    }

    #[test]
    fn test_signed_amounts() {
        let e = entry(Decimal::new(250000, 2), Decimal::ZERO);
        assert_eq!(e.signed_amount(), Decimal::new(250000, 2));

        let movement = CashMovement {
            id: Uuid::now_v7(),
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            direction: CashDirection::Outflow,
            amount: Decimal::new(4000, 2),
            description: "transport".to_string(),
            source: CashSource::Expense,
            reference: None,
            customer_id: None,
            is_direct_cash: false,
            created_by: "ops".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(movement.signed_amount(), Decimal::new(-4000, 2));
    }

    #[test]
    fn test_max_two_decimals() {
        assert!(max_two_decimals(Decimal::new(12345, 2)));
        assert!(max_two_decimals(Decimal::new(100, 0)));
        assert!(!max_two_decimals(Decimal::new(12345, 3)));
    }

    #[test]
    fn test_summary_balanced() {
        let summary = DailySummary {
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            opening_balance: Decimal::new(30000, 2),
            total_inflows: Decimal::new(10000, 2),
            total_outflows: Decimal::new(4000, 2),
            closing_balance: Decimal::new(36000, 2),
            is_reconciled: false,
            reconciled_by: None,
            reconciled_at: None,
        };
        assert!(summary.is_balanced());
    }
}
