//! # Domain Errors
//!
//! Typed errors for the pure business-logic layer. Every failure mode is a
//! variant with enough context to log or display without re-deriving state.

use thiserror::Error;

// =============================================================================
// Validation Errors
// =============================================================================

/// Input validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was missing or empty.
    #[error("field '{field}' is required")]
    Required { field: String },

    /// A numeric field must be strictly positive.
    #[error("field '{field}' must be positive, got {value}")]
    MustBePositive { field: String, value: i64 },

    /// A numeric field must not be negative (zero allowed).
    #[error("field '{field}' must not be negative, got {value}")]
    MustBeNonNegative { field: String, value: i64 },

    /// A reason code that does not exist for the stated direction.
    #[error("unknown reason code '{code}' for direction '{direction}'")]
    UnknownReasonCode { direction: String, code: String },

    /// Percentage discounts are whole percents in 0..=100.
    #[error("discount percentage {value} is out of range (0-100)")]
    PercentOutOfRange { value: u32 },

    /// A transfer cannot target its own source branch.
    #[error("transfer source and destination are the same branch '{branch_id}'")]
    SameBranchTransfer { branch_id: String },

    /// A transfer needs at least one item.
    #[error("transfer has no items")]
    EmptyTransfer,
}

// =============================================================================
// Cart Errors
// =============================================================================

/// Failures of reservation-cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Requested quantity exceeds the last-known availability.
    /// The cart is left unchanged.
    #[error("insufficient stock for '{sku}': requested {requested}, available {available}")]
    StockExhausted {
        sku: String,
        requested: i64,
        available: i64,
    },

    /// The variant is not in the cart.
    #[error("line '{0}' not found in cart")]
    LineNotFound(String),

    /// Retrieving a held transaction requires an empty active cart.
    #[error("active cart is not empty; clear or hold it first")]
    ActiveCartNotEmpty,

    /// No held transaction with this id.
    #[error("held transaction '{0}' not found")]
    HeldNotFound(String),

    /// The cart already holds the maximum number of distinct lines.
    #[error("cart is full ({max} lines)")]
    CartFull { max: usize },

    /// A single line cannot exceed the per-line quantity ceiling.
    #[error("quantity {requested} exceeds per-line maximum {max}")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Quantities must be positive (zero means "remove", use set_quantity).
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(i64),
}

/// Convenience alias for cart operations.
pub type CartResult<T> = Result<T, CartError>;

// =============================================================================
// Top-Level Core Error
// =============================================================================

/// Umbrella error for callers that cross module boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cart(#[from] CartError),
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CartError::StockExhausted {
            sku: "KOPI-250".into(),
            requested: 5,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for 'KOPI-250': requested 5, available 3"
        );

        let err = ValidationError::UnknownReasonCode {
            direction: "add".into(),
            code: "damaged".into(),
        };
        assert!(err.to_string().contains("damaged"));
    }

    #[test]
    fn test_core_error_from_conversions() {
        let core: CoreError = ValidationError::EmptyTransfer.into();
        assert!(matches!(core, CoreError::Validation(_)));

        let core: CoreError = CartError::ActiveCartNotEmpty.into();
        assert!(matches!(core, CoreError::Cart(_)));
    }
}
