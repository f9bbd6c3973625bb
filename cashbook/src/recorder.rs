//! Cash movement recorder
//!
//! Validates and persists physical cash events, and revises or deletes the
//! movements derived from a document when that document is edited or
//! deleted. Duplicate prevention lives on the (reference id, reference
//! kind, source) triple: the second recording of the same fact fails
//! loudly instead of being silently ignored or overwritten.

use crate::{Error, Result};
use chrono::{NaiveDate, Utc};
use ledger::types::max_two_decimals;
use ledger::{AccountingStore, CashDirection, CashMovement, CashSource, DocumentRef};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Input for recording one cash movement
#[derive(Debug, Clone)]
pub struct NewCashMovement {
    /// Calendar day the cash moved
    pub date: NaiveDate,
    /// Inflow or outflow
    pub direction: CashDirection,
    /// Amount, strictly positive, at most two decimal places
    pub amount: Decimal,
    /// Description, non-empty
    pub description: String,
    /// Origin of the movement
    pub source: CashSource,
    /// Originating record, if any
    pub reference: Option<DocumentRef>,
    /// Customer involved, if any (must exist)
    pub customer_id: Option<Uuid>,
    /// Manually entered cash
    pub is_direct_cash: bool,
    /// Who recorded it
    pub created_by: String,
}

/// In-place revision of the movements derived from one document
///
/// Unset fields keep their stored value. Rows are edited, not
/// deleted-and-recreated, so movement identity is preserved.
#[derive(Debug, Clone, Default)]
pub struct CashMovementUpdate {
    /// New amount
    pub amount: Option<Decimal>,
    /// New description
    pub description: Option<String>,
    /// New direction
    pub direction: Option<CashDirection>,
    /// New customer
    pub customer_id: Option<Uuid>,
    /// New calendar day
    pub date: Option<NaiveDate>,
}

/// Validates and persists cash movements
pub struct CashMovementRecorder {
    store: Arc<dyn AccountingStore>,
    future_date_grace_days: i64,
}

impl CashMovementRecorder {
    /// Create a recorder over a store
    pub fn new(store: Arc<dyn AccountingStore>, future_date_grace_days: i64) -> Self {
        Self {
            store,
            future_date_grace_days,
        }
    }

    fn validate_amount(&self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(ledger::Error::validation("amount", "amount must be strictly positive").into());
        }
        if !max_two_decimals(amount) {
            return Err(
                ledger::Error::validation("amount", "amounts are limited to two decimal places")
                    .into(),
            );
        }
        Ok(())
    }

    fn validate_date(&self, date: NaiveDate) -> Result<()> {
        let limit = Utc::now().date_naive() + chrono::Duration::days(self.future_date_grace_days);
        if date > limit {
            return Err(ledger::Error::validation(
                "date",
                format!("date {} is more than {} day(s) in the future", date, self.future_date_grace_days),
            )
            .into());
        }
        Ok(())
    }

    fn validate_description(&self, description: &str) -> Result<()> {
        if description.trim().is_empty() {
            return Err(ledger::Error::validation("description", "description must not be empty").into());
        }
        Ok(())
    }

    async fn validate_customer(&self, customer_id: Uuid) -> Result<()> {
        if !self.store.customer_exists(customer_id).await? {
            return Err(ledger::Error::not_found("customer", customer_id).into());
        }
        Ok(())
    }

    /// Validate an input and materialize the movement row without
    /// persisting it (the coordinator persists it inside the atomic pair
    /// write). The store re-checks the duplicate triple at insert time, so
    /// a racing writer still cannot slip a second row in.
    pub async fn prepare(&self, new: NewCashMovement) -> Result<CashMovement> {
        self.validate_amount(new.amount)?;
        self.validate_description(&new.description)?;
        self.validate_date(new.date)?;

        if let Some(customer_id) = new.customer_id {
            self.validate_customer(customer_id).await?;
        }

        if let Some(reference) = new.reference {
            let existing = self.store.movements_for_reference(&reference).await?;
            if existing.iter().any(|m| m.source == new.source) {
                return Err(ledger::Error::DuplicateEntry {
                    reference_id: reference.id,
                    reference_kind: reference.kind,
                    movement_source: new.source,
                }
                .into());
            }
        }

        Ok(CashMovement {
            id: Uuid::now_v7(),
            date: new.date,
            direction: new.direction,
            amount: new.amount,
            description: new.description,
            source: new.source,
            reference: new.reference,
            customer_id: new.customer_id,
            is_direct_cash: new.is_direct_cash,
            created_by: new.created_by,
            created_at: Utc::now(),
        })
    }

    /// Validate and persist one standalone movement
    pub async fn record(&self, new: NewCashMovement) -> Result<CashMovement> {
        let movement = self.prepare(new).await?;
        self.store.insert_movement(&movement).await?;
        info!(
            movement_id = %movement.id,
            date = %movement.date,
            direction = %movement.direction,
            amount = %movement.amount,
            source = %movement.source,
            "cash movement recorded"
        );
        Ok(movement)
    }

    /// Revise (or, with `update == None`, delete) every movement derived
    /// from a reference. Returns the distinct dates touched; the caller
    /// must feed them into the aggregator.
    ///
    /// Updating a reference with no movements is an error; deleting one is
    /// a silent no-op, so document deletion stays idempotent.
    pub async fn revise_for_source(
        &self,
        reference: &DocumentRef,
        update: Option<CashMovementUpdate>,
    ) -> Result<Vec<NaiveDate>> {
        match update {
            Some(update) => self.apply_update(reference, update).await,
            None => {
                let deleted = self.store.delete_movements_for_reference(reference).await?;
                if !deleted.is_empty() {
                    info!(
                        reference_id = %reference.id,
                        reference_kind = %reference.kind,
                        count = deleted.len(),
                        "cash movements deleted for source"
                    );
                }
                Ok(distinct_dates(deleted.iter().map(|m| m.date)))
            }
        }
    }

    async fn apply_update(
        &self,
        reference: &DocumentRef,
        update: CashMovementUpdate,
    ) -> Result<Vec<NaiveDate>> {
        if let Some(amount) = update.amount {
            self.validate_amount(amount)?;
        }
        if let Some(ref description) = update.description {
            self.validate_description(description)?;
        }
        if let Some(date) = update.date {
            self.validate_date(date)?;
        }
        if let Some(customer_id) = update.customer_id {
            self.validate_customer(customer_id).await?;
        }

        let movements = self.store.movements_for_reference(reference).await?;
        if movements.is_empty() {
            return Err(Error::Ledger(ledger::Error::not_found(
                "cash_movement",
                reference.id,
            )));
        }

        let mut dates = Vec::new();
        for mut movement in movements {
            dates.push(movement.date);

            if let Some(amount) = update.amount {
                movement.amount = amount;
            }
            if let Some(ref description) = update.description {
                movement.description = description.clone();
            }
            if let Some(direction) = update.direction {
                movement.direction = direction;
            }
            if let Some(customer_id) = update.customer_id {
                movement.customer_id = Some(customer_id);
            }
            if let Some(date) = update.date {
                movement.date = date;
            }

            dates.push(movement.date);
            self.store.update_movement(&movement).await?;
        }

        info!(
            reference_id = %reference.id,
            reference_kind = %reference.kind,
            "cash movements revised for source"
        );
        Ok(distinct_dates(dates.into_iter()))
    }
}

/// Sorted, de-duplicated dates
pub(crate) fn distinct_dates(dates: impl Iterator<Item = NaiveDate>) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = dates.collect();
    dates.sort();
    dates.dedup();
    dates
}
