//! # Ledger Errors
//!
//! Typed failures for ledger operations. Expected business conditions
//! (insufficient stock, duplicate transaction numbers) are variants here,
//! never panics.

use kasira_core::ValidationError;
use thiserror::Error;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// An operation could not be satisfied at authoritative-read time.
    /// The client must refresh its availability and retry.
    #[error(
        "insufficient stock for {variant_id}@{branch_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        variant_id: String,
        branch_id: String,
        requested: i64,
        available: i64,
    },

    /// The (variant, branch) has never been stocked.
    #[error("no stock record for {variant_id}@{branch_id}")]
    UnknownStock {
        variant_id: String,
        branch_id: String,
    },

    #[error("transfer '{0}' not found")]
    TransferNotFound(String),

    /// A lifecycle operation applied to a transfer in the wrong state.
    #[error("transfer '{id}' is {status}, expected {expected}")]
    InvalidTransferState {
        id: String,
        status: String,
        expected: String,
    },

    #[error("no alert rule for {variant_id}@{branch_id}")]
    AlertNotFound {
        variant_id: String,
        branch_id: String,
    },

    /// A sale with this transaction number already exists. Never silently
    /// merged; the reconciler surfaces it for manual resolution.
    #[error("transaction number '{number}' already recorded")]
    DuplicateTransaction { number: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Convenience alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
