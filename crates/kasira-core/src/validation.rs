//! # Validation
//!
//! Business rule validation for ledger-bound commands. All checks run before
//! any I/O: a request that fails here never reaches the ledger.

use crate::error::ValidationError;
use crate::types::TransferItem;

// =============================================================================
// Field Helpers
// =============================================================================

/// Requires a non-empty string field.
pub fn require_field(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Requires a strictly positive quantity.
pub fn require_positive(field: &str, value: i64) -> Result<(), ValidationError> {
    if value <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

/// Requires a non-negative value (zero allowed, used for alert thresholds).
pub fn require_non_negative(field: &str, value: i64) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

// =============================================================================
// Command Validation
// =============================================================================

/// Validates an adjustment submission before it touches the ledger.
/// The reason code itself is validated by [`crate::AdjustmentReason::parse`].
pub fn validate_adjustment(
    variant_id: &str,
    branch_id: &str,
    quantity: i64,
) -> Result<(), ValidationError> {
    require_field("variantId", variant_id)?;
    require_field("branchId", branch_id)?;
    require_positive("quantity", quantity)?;
    Ok(())
}

/// Validates a transfer creation request.
pub fn validate_transfer(
    from_branch_id: &str,
    to_branch_id: &str,
    items: &[TransferItem],
) -> Result<(), ValidationError> {
    require_field("fromBranchId", from_branch_id)?;
    require_field("toBranchId", to_branch_id)?;
    if from_branch_id == to_branch_id {
        return Err(ValidationError::SameBranchTransfer {
            branch_id: from_branch_id.to_string(),
        });
    }
    if items.is_empty() {
        return Err(ValidationError::EmptyTransfer);
    }
    for item in items {
        require_field("items.variantId", &item.variant_id)?;
        require_positive("items.quantity", item.quantity)?;
    }
    Ok(())
}

/// Validates an alert upsert.
pub fn validate_alert(
    variant_id: &str,
    branch_id: &str,
    min_stock: i64,
) -> Result<(), ValidationError> {
    require_field("variantId", variant_id)?;
    require_field("branchId", branch_id)?;
    require_non_negative("minStock", min_stock)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjustment_requires_positive_quantity() {
        assert!(validate_adjustment("v1", "b1", 5).is_ok());
        assert!(matches!(
            validate_adjustment("v1", "b1", 0),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_adjustment("v1", "b1", -3),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_adjustment_requires_ids() {
        assert!(matches!(
            validate_adjustment("", "b1", 5),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_adjustment("v1", "  ", 5),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_transfer_rejects_same_branch() {
        let items = vec![TransferItem {
            variant_id: "v1".into(),
            quantity: 2,
        }];
        assert!(matches!(
            validate_transfer("b1", "b1", &items),
            Err(ValidationError::SameBranchTransfer { .. })
        ));
        assert!(validate_transfer("b1", "b2", &items).is_ok());
    }

    #[test]
    fn test_transfer_rejects_empty_and_non_positive_items() {
        assert!(matches!(
            validate_transfer("b1", "b2", &[]),
            Err(ValidationError::EmptyTransfer)
        ));
        let items = vec![TransferItem {
            variant_id: "v1".into(),
            quantity: 0,
        }];
        assert!(validate_transfer("b1", "b2", &items).is_err());
    }

    #[test]
    fn test_alert_allows_zero_threshold() {
        assert!(validate_alert("v1", "b1", 0).is_ok());
        assert!(matches!(
            validate_alert("v1", "b1", -1),
            Err(ValidationError::MustBeNonNegative { .. })
        ));
    }
}
