//! Error types for the ledger data layer
//!
//! Every variant carries structured details plus a stable machine-readable
//! code so calling layers can branch on cause instead of parsing messages.

use crate::types::{CashSource, ReferenceKind};
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger data-layer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Bad input shape or range; client-caused, never retryable
    #[error("validation failed on {field}: {reason}")]
    Validation {
        /// Field that failed validation
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// A cash movement with the same (reference, kind, source) triple
    /// already exists; the caller must treat this as "already done"
    #[error("cash movement already recorded for {reference_kind} {reference_id} (source: {movement_source})")]
    DuplicateEntry {
        /// Id of the originating record
        reference_id: Uuid,
        /// Which table the reference points into
        reference_kind: ReferenceKind,
        /// Source of the duplicate movement
        movement_source: CashSource,
    },

    /// Referenced customer/entry/movement does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (customer, ledger_entry, cash_movement, ...)
        entity: &'static str,
        /// Identifier that missed
        id: String,
    },

    /// Underlying store failure
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Build a validation error
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Build a not-found error
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation_failed",
            Error::DuplicateEntry { .. } => "duplicate_entry",
            Error::NotFound { .. } => "not_found",
            Error::Storage(_) => "storage_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::validation("amount", "negative").code(), "validation_failed");
        assert_eq!(Error::not_found("customer", Uuid::nil()).code(), "not_found");
        assert_eq!(
            Error::DuplicateEntry {
                reference_id: Uuid::nil(),
                reference_kind: ReferenceKind::Clearance,
                movement_source: CashSource::Clearance,
            }
            .code(),
            "duplicate_entry"
        );
        assert_eq!(Error::Storage("disk full".to_string()).code(), "storage_error");
    }

    #[test]
    fn test_duplicate_message_names_the_triple() {
        let err = Error::DuplicateEntry {
            reference_id: Uuid::nil(),
            reference_kind: ReferenceKind::Expense,
            movement_source: CashSource::Expense,
        };
        let msg = err.to_string();
        assert!(msg.contains("expense"));
        assert!(msg.contains("already recorded"));
        // thiserror must not treat the movement source as an error chain
        assert!(std::error::Error::source(&err).is_none());
    }
}
