//! Ledger balance calculator
//!
//! The customer balance is defined purely by the stored entries: a running
//! sum over the complete `(created_at, id)`-ordered sequence, never an
//! incrementally-maintained counter. Any paginated or filtered view must
//! compute balances over the full unpaged set first, then cut the page.

use crate::types::LedgerEntry;
use crate::{Error, Result};
use rust_decimal::Decimal;

/// One ledger entry with its running balance
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedEntry {
    /// The entry
    pub entry: LedgerEntry,
    /// Balance after applying this entry
    pub running_balance: Decimal,
}

/// Full customer ledger with running balances
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerLedger {
    /// Entries in `(created_at, id)` order, each with its running balance
    pub entries: Vec<BalancedEntry>,
    /// Final running balance: positive means the customer owes money,
    /// negative means the business owes the customer
    pub outstanding: Decimal,
}

/// One page of a customer ledger
///
/// `outstanding` and the running balances are computed over the complete
/// entry set before pagination; only the entry slice is paged.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerPage {
    /// The entries on this page
    pub entries: Vec<BalancedEntry>,
    /// Outstanding balance over the full ledger, not just this page
    pub outstanding: Decimal,
    /// Total entry count before pagination
    pub total_entries: usize,
    /// 1-based page number
    pub page: usize,
    /// Page size
    pub page_size: usize,
}

/// Compute running balances over a customer's complete entry set
///
/// Ordering key is `created_at` ascending with `id` ascending as the
/// tie-break, so batch-inserted entries sharing a timestamp still get a
/// deterministic, reproducible order.
pub fn running_balances(mut entries: Vec<LedgerEntry>) -> CustomerLedger {
    entries.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

    let mut balance = Decimal::ZERO;
    let entries = entries
        .into_iter()
        .map(|entry| {
            balance += entry.signed_amount();
            BalancedEntry {
                entry,
                running_balance: balance,
            }
        })
        .collect();

    CustomerLedger {
        entries,
        outstanding: balance,
    }
}

/// Cut one page out of a fully-computed ledger
///
/// Pages are 1-based; a page past the end is empty, not an error.
pub fn paginate(ledger: CustomerLedger, page: usize, page_size: usize) -> Result<LedgerPage> {
    if page == 0 {
        return Err(Error::validation("page", "pages are numbered from 1"));
    }
    if page_size == 0 {
        return Err(Error::validation("page_size", "page size must be positive"));
    }

    let total_entries = ledger.entries.len();
    let start = (page - 1).saturating_mul(page_size);
    let entries = ledger
        .entries
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect();

    Ok(LedgerPage {
        entries,
        outstanding: ledger.outstanding,
        total_entries,
        page,
        page_size,
    })
}
