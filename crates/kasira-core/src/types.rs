//! # Domain Types
//!
//! Core domain types used throughout Kasira.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockUnit     │   │ AdjustmentRecord│   │ TransferRecord  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  (variant,      │   │  previous_qty   │   │  from/to branch │       │
//! │  │   branch) key   │   │  new_qty        │   │  items[]        │       │
//! │  │  quantity ≥ 0   │   │  difference     │   │  status machine │       │
//! │  │  price          │   │  reason (typed) │   │  PENDING→...    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   AlertRule     │   │TransactionRecord│   │CachedTransaction│       │
//! │  │  min_stock      │   │  lines[], meta  │   │  sync_status    │       │
//! │  │  Active|Inactive│   │  number, totals │   │  synced|pending │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Sale lines and cart lines freeze product name/label/sku/price at the time
//! the line is created, so history stays readable after catalog edits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::{Discount, Money};
use crate::reason::AdjustmentReason;

// =============================================================================
// Stock Key & Stock Unit
// =============================================================================

/// Identity of one stock record: a variant at a branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockKey {
    /// Variant identifier (the unit of stock tracking).
    pub variant_id: String,
    /// Branch (cabang) identifier.
    pub branch_id: String,
}

impl StockKey {
    pub fn new(variant_id: impl Into<String>, branch_id: impl Into<String>) -> Self {
        StockKey {
            variant_id: variant_id.into(),
            branch_id: branch_id.into(),
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.variant_id, self.branch_id)
    }
}

/// The authoritative quantity + price record for one variant at one branch.
///
/// ## Invariants
/// - `quantity` is never negative; subtractions clamp at zero.
/// - Terminals never mutate this directly; only ledger operations do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUnit {
    /// On-hand quantity. Clamped at zero, never negative.
    pub quantity: i64,
    /// Selling price at this branch.
    pub price: Money,
    /// When this unit last changed.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Adjustment Record
// =============================================================================

/// Immutable audit entry for one applied adjustment.
///
/// `difference` is the *actual* applied change: subtracting 5 from a unit
/// holding 3 records -3, because the quantity clamps at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRecord {
    /// Record id (UUID v4).
    pub id: String,
    pub variant_id: String,
    pub branch_id: String,
    /// Quantity before the adjustment.
    pub previous_qty: i64,
    /// Quantity after the adjustment.
    pub new_qty: i64,
    /// Actual applied delta (`new_qty - previous_qty`).
    pub difference: i64,
    /// Typed reason; the direction is part of the variant.
    pub reason: AdjustmentReason,
    /// Free-form operator notes.
    pub notes: Option<String>,
    /// Who performed the adjustment.
    pub actor: String,
    pub recorded_at: DateTime<Utc>,
}

// =============================================================================
// Transfers
// =============================================================================

/// Lifecycle state of an inter-branch transfer.
///
/// ```text
/// PENDING ──approve──► APPROVED ──apply──► COMPLETED
///    │
///    └────reject─────► REJECTED   (terminal, no quantity change)
/// ```
///
/// Approval re-validates source quantities; a failed approval leaves the
/// transfer PENDING for retry or edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Pending => write!(f, "PENDING"),
            TransferStatus::Approved => write!(f, "APPROVED"),
            TransferStatus::Rejected => write!(f, "REJECTED"),
            TransferStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// One line of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub variant_id: String,
    pub quantity: i64,
}

/// An inter-branch stock movement with an approval lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    /// Transfer id (UUID v4).
    pub id: String,
    pub from_branch_id: String,
    pub to_branch_id: String,
    pub items: Vec<TransferItem>,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Alerts
// =============================================================================

/// Lifecycle of an alert rule. Deactivation is explicit, not deletion, so
/// the last-configured threshold stays visible for reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Inactive,
}

/// A declarative low-stock threshold for one (variant, branch).
///
/// Not a trigger mechanism: display/query logic compares the current
/// quantity against `min_stock` when it wants to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    pub variant_id: String,
    pub branch_id: String,
    /// Quantity at or below which the variant counts as low stock.
    pub min_stock: i64,
    pub status: AlertStatus,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    /// Returns true if the rule is active.
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}

/// A low-stock finding produced by comparing units to active alert rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockEntry {
    pub variant_id: String,
    pub branch_id: String,
    pub quantity: i64,
    pub min_stock: i64,
}

// =============================================================================
// Catalog Views
// =============================================================================

/// Descriptive data for one sellable variant (name/label/sku/price).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantInfo {
    pub variant_id: String,
    pub product_id: String,
    pub product_name: String,
    pub variant_label: String,
    pub sku: String,
    pub price: Money,
}

/// A product with its variants, as carried by product push events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub id: String,
    pub name: String,
    pub variants: Vec<VariantInfo>,
}

/// One catalog row as a terminal sees it: variant data plus the last-known
/// availability at the terminal's branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub variant: VariantInfo,
    /// Last-known on-hand quantity at the terminal's branch. Advisory only;
    /// the ledger is the arbiter at sale completion.
    pub available: i64,
}

// =============================================================================
// Payments & Checkout Metadata
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// QRIS scan payment.
    Qris,
}

/// Payment-intent fields carried by the cart and snapshotted on hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutMeta {
    /// Customer name or id, free-form.
    pub customer: Option<String>,
    pub discount: Option<Discount>,
    pub payment_method: Option<PaymentMethod>,
}

// =============================================================================
// Sale Lines & Transactions
// =============================================================================

/// A line item in a completed (or in-flight) sale.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub variant_id: String,
    /// SKU at time of sale (frozen).
    pub sku: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    /// Variant label at time of sale (frozen).
    pub variant_label: String,
    /// Unit price at time of sale (frozen).
    pub unit_price: Money,
    pub quantity: i64,
}

impl SaleLine {
    /// Line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// A completed sale as recorded by the ledger and cached by terminals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Terminal-generated transaction number; the ledger's idempotency key.
    pub transaction_number: String,
    pub branch_id: String,
    pub terminal_id: String,
    pub lines: Vec<SaleLine>,
    pub meta: CheckoutMeta,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub total: Money,
    /// History flag: true if the sale was completed while disconnected.
    /// Stays true forever; only `sync_status` changes on reconciliation.
    pub is_offline: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Reconciliation state of a locally cached transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The server is known to have this transaction.
    Synced,
    /// Recorded locally, not yet confirmed by the server.
    Pending,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Pending => write!(f, "pending"),
        }
    }
}

/// A completed sale persisted in the terminal-local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedTransaction {
    pub transaction: TransactionRecord,
    pub sync_status: SyncStatus,
    pub cached_at: DateTime<Utc>,
}

impl CachedTransaction {
    /// Shorthand for the offline history flag on the inner record.
    pub fn is_offline(&self) -> bool {
        self.transaction.is_offline
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_key_display() {
        let key = StockKey::new("var-1", "branch-a");
        assert_eq!(key.to_string(), "var-1@branch-a");
    }

    #[test]
    fn test_transfer_status_serialization() {
        let json = serde_json::to_string(&TransferStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
        let back: TransferStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(back, TransferStatus::Completed);
    }

    #[test]
    fn test_sale_line_total() {
        let line = SaleLine {
            variant_id: "var-1".into(),
            sku: "KOPI-250".into(),
            product_name: "Kopi Gayo".into(),
            variant_label: "250g".into(),
            unit_price: Money::new(45_000),
            quantity: 3,
        };
        assert_eq!(line.line_total().amount(), 135_000);
    }

    #[test]
    fn test_alert_rule_active_check() {
        let rule = AlertRule {
            variant_id: "var-1".into(),
            branch_id: "branch-a".into(),
            min_stock: 5,
            status: AlertStatus::Inactive,
            updated_at: Utc::now(),
        };
        assert!(!rule.is_active());
    }
}
