//! ColdBook Ledger
//!
//! Data layer of the cold-storage accounting core: the append-only customer
//! ledger, the cash movement store, daily summary rows, and the
//! opening-balance audit log.
//!
//! # Architecture
//!
//! - **Append-only ledger**: customer balance is always re-derived from the
//!   stored entries, never kept as a counter
//! - **Closed tagged unions**: every classification is an enum validated at
//!   the boundary once and trusted internally
//! - **Injected store**: components receive an [`AccountingStore`] at
//!   construction; [`MemoryStore`] is the reference implementation
//! - **Explicit conflict signal**: summary upserts report
//!   [`store::UpsertOutcome::Conflict`] instead of leaking engine error codes

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod balance;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

// Re-exports
pub use balance::{running_balances, BalancedEntry, CustomerLedger, LedgerPage};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use store::{AccountingStore, UpsertOutcome};
pub use types::{
    CashDirection, CashMovement, CashSource, DailySummary, DocumentRef, LedgerEntry, LedgerKind,
    OpeningBalanceAudit, ReferenceKind, SourceDocument, VersionedSummary,
};
