//! # Terminal Error Types
//!
//! Errors surfaced by terminal workflows.
//!
//! ## Propagation Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Terminal Error Propagation                           │
//! │                                                                         │
//! │  Cart errors (StockExhausted, LineNotFound)                            │
//! │       └── resolved synchronously at the terminal, never leave it       │
//! │                                                                         │
//! │  Ledger errors (InsufficientStock, DuplicateTransaction)               │
//! │       └── propagate to the calling workflow, which decides             │
//! │           per-item continuation                                        │
//! │                                                                         │
//! │  Network errors                                                        │
//! │       └── reads fall back to cache, writes fail explicitly             │
//! │           (no silent retry loop - the operator stays in control)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use kasira_core::{CartError, ValidationError};
use kasira_ledger::LedgerError;
use kasira_store::StoreError;

/// Result type alias for terminal operations.
pub type TerminalResult<T> = Result<T, TerminalError>;

/// Errors from terminal workflows.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// The ledger is unreachable. Triggers cache fallback for reads and
    /// offline queueing for checkout.
    #[error("Network unavailable: {0}")]
    Network(String),

    /// Checkout was attempted on an empty cart.
    #[error("Cannot check out an empty cart")]
    EmptyCart,

    /// A variant id that is not in the cached catalog.
    #[error("Variant not in catalog: {0}")]
    UnknownVariant(String),

    /// A ledger operation failed (shortage, duplicate, unknown stock, ...).
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A local cache operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A cart mutation was rejected.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Input validation failed before any operation ran.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl TerminalError {
    /// True when the failure was connectivity, not a business rejection.
    pub fn is_network(&self) -> bool {
        matches!(self, TerminalError::Network(_))
    }
}
