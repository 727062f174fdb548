//! # Push Events
//!
//! Events fanned out by the synchronization channel to every connected
//! terminal. Each event carries the **latest absolute state** of the entity
//! it names, never a delta: applying the same event twice is a no-op, and a
//! terminal that misses events recovers by refetching, not by replaying.
//!
//! ## Event Flow
//! ```text
//!   Ledger mutation                Channel                 Terminals
//!  ┌──────────────┐          ┌───────────────┐        ┌──────────────┐
//!  │ adjustment   │──event──►│   broadcast   │──ws───►│ session A    │
//!  │ transfer     │          │   (fan-out)   │──ws───►│ session B    │
//!  │ sale         │          └───────────────┘──ws───►│ session C    │
//!  └──────────────┘                                    └──────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::ProductInfo;

// =============================================================================
// Push Event
// =============================================================================

/// A state-change notification pushed to terminals.
///
/// ## Invariant: absolute, not incremental
/// `StockUpdated` carries the full current quantity, not "+2" or "-1".
/// Terminals overwrite their cached value; they never add to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum PushEvent {
    /// Stock for one (variant, branch) changed; carries the new quantity.
    #[serde(rename = "stock:updated")]
    StockUpdated {
        variant_id: String,
        branch_id: String,
        /// The current on-hand quantity after the change.
        quantity: i64,
        /// The current selling price at this branch.
        price: Money,
    },

    /// A product was created; carries the full product with variants.
    #[serde(rename = "product:created")]
    ProductCreated { product: ProductInfo },

    /// A product was edited; carries the full updated product.
    #[serde(rename = "product:updated")]
    ProductUpdated { product: ProductInfo },

    /// A product was removed from the catalog.
    #[serde(rename = "product:deleted")]
    ProductDeleted { product_id: String },
}

impl PushEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PushEvent::StockUpdated { .. } => "stock:updated",
            PushEvent::ProductCreated { .. } => "product:created",
            PushEvent::ProductUpdated { .. } => "product:updated",
            PushEvent::ProductDeleted { .. } => "product:deleted",
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_updated_wire_format() {
        let event = PushEvent::StockUpdated {
            variant_id: "var-1".into(),
            branch_id: "branch-a".into(),
            quantity: 7,
            price: Money::new(45_000),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "stock:updated");
        assert_eq!(json["data"]["variantId"], "var-1");
        assert_eq!(json["data"]["quantity"], 7);
        assert_eq!(json["data"]["price"], 45_000);
    }

    #[test]
    fn test_product_deleted_round_trip() {
        let event = PushEvent::ProductDeleted {
            product_id: "prod-9".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PushEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_kind_names() {
        let event = PushEvent::ProductDeleted {
            product_id: "p".into(),
        };
        assert_eq!(event.kind(), "product:deleted");
    }
}
