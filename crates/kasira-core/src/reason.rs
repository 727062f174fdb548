//! # Adjustment Reason Codes
//!
//! Reason codes for manual stock adjustments, with the direction encoded in
//! the variant itself. An invalid (direction, reason) pairing is
//! unrepresentable: `Damaged` is always subtractive, `Restock` always
//! additive, and `Correction` exists once per direction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

// =============================================================================
// Stock Direction
// =============================================================================

/// The direction of a stock mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    /// Quantity goes up.
    Add,
    /// Quantity goes down (clamped at zero at the ledger).
    Subtract,
}

impl fmt::Display for StockDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockDirection::Add => write!(f, "add"),
            StockDirection::Subtract => write!(f, "subtract"),
        }
    }
}

// =============================================================================
// Adjustment Reason
// =============================================================================

/// A typed reason for a manual stock adjustment.
///
/// The first five variants are additive, the rest subtractive. `Correction`
/// appears once per direction since operators use it both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    // Additive
    Restock,
    CustomerReturn,
    Found,
    CorrectionAdd,
    OtherAdd,
    // Subtractive
    Damaged,
    Expired,
    Lost,
    Sample,
    CorrectionSubtract,
    OtherSubtract,
}

impl AdjustmentReason {
    /// Returns the direction this reason implies.
    pub const fn direction(&self) -> StockDirection {
        match self {
            AdjustmentReason::Restock
            | AdjustmentReason::CustomerReturn
            | AdjustmentReason::Found
            | AdjustmentReason::CorrectionAdd
            | AdjustmentReason::OtherAdd => StockDirection::Add,
            AdjustmentReason::Damaged
            | AdjustmentReason::Expired
            | AdjustmentReason::Lost
            | AdjustmentReason::Sample
            | AdjustmentReason::CorrectionSubtract
            | AdjustmentReason::OtherSubtract => StockDirection::Subtract,
        }
    }

    /// The wire/storage code for this reason.
    pub const fn code(&self) -> &'static str {
        match self {
            AdjustmentReason::Restock => "restock",
            AdjustmentReason::CustomerReturn => "return",
            AdjustmentReason::Found => "found",
            AdjustmentReason::CorrectionAdd | AdjustmentReason::CorrectionSubtract => "correction",
            AdjustmentReason::OtherAdd => "other_add",
            AdjustmentReason::OtherSubtract => "other_subtract",
            AdjustmentReason::Damaged => "damaged",
            AdjustmentReason::Expired => "expired",
            AdjustmentReason::Lost => "lost",
            AdjustmentReason::Sample => "sample",
        }
    }

    /// Parses a (direction, code) pair coming from an external caller.
    ///
    /// The code set is partitioned by direction, so `("add", "damaged")` is
    /// rejected rather than silently accepted the way a free-form string
    /// field would be.
    pub fn parse(direction: StockDirection, code: &str) -> Result<Self, ValidationError> {
        let reason = match (direction, code) {
            (StockDirection::Add, "restock") => AdjustmentReason::Restock,
            (StockDirection::Add, "return") => AdjustmentReason::CustomerReturn,
            (StockDirection::Add, "found") => AdjustmentReason::Found,
            (StockDirection::Add, "correction") => AdjustmentReason::CorrectionAdd,
            (StockDirection::Add, "other_add") | (StockDirection::Add, "other") => {
                AdjustmentReason::OtherAdd
            }
            (StockDirection::Subtract, "damaged") => AdjustmentReason::Damaged,
            (StockDirection::Subtract, "expired") => AdjustmentReason::Expired,
            (StockDirection::Subtract, "lost") => AdjustmentReason::Lost,
            (StockDirection::Subtract, "sample") => AdjustmentReason::Sample,
            (StockDirection::Subtract, "correction") => AdjustmentReason::CorrectionSubtract,
            (StockDirection::Subtract, "other_subtract") | (StockDirection::Subtract, "other") => {
                AdjustmentReason::OtherSubtract
            }
            (direction, code) => {
                return Err(ValidationError::UnknownReasonCode {
                    direction: direction.to_string(),
                    code: code.to_string(),
                })
            }
        };
        Ok(reason)
    }
}

impl fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_is_encoded_in_variant() {
        assert_eq!(AdjustmentReason::Restock.direction(), StockDirection::Add);
        assert_eq!(
            AdjustmentReason::Damaged.direction(),
            StockDirection::Subtract
        );
        assert_eq!(
            AdjustmentReason::CorrectionAdd.direction(),
            StockDirection::Add
        );
        assert_eq!(
            AdjustmentReason::CorrectionSubtract.direction(),
            StockDirection::Subtract
        );
    }

    #[test]
    fn test_parse_valid_pairs() {
        assert_eq!(
            AdjustmentReason::parse(StockDirection::Add, "restock").unwrap(),
            AdjustmentReason::Restock
        );
        assert_eq!(
            AdjustmentReason::parse(StockDirection::Subtract, "correction").unwrap(),
            AdjustmentReason::CorrectionSubtract
        );
    }

    #[test]
    fn test_parse_rejects_cross_direction_pair() {
        // "damaged" only exists as a subtractive reason
        let err = AdjustmentReason::parse(StockDirection::Add, "damaged").unwrap_err();
        assert!(matches!(err, ValidationError::UnknownReasonCode { .. }));
    }

    #[test]
    fn test_parse_rejects_unknown_code() {
        assert!(AdjustmentReason::parse(StockDirection::Subtract, "vanished").is_err());
    }

    #[test]
    fn test_code_round_trip() {
        let reason = AdjustmentReason::Expired;
        assert_eq!(
            AdjustmentReason::parse(reason.direction(), reason.code()).unwrap(),
            reason
        );
    }
}
