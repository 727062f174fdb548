//! # Reservation Cart
//!
//! The per-terminal, in-memory model of "what this cashier intends to sell".
//!
//! ## The Optimism Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Reservation Cart Invariant                         │
//! │                                                                         │
//! │   For every line, at all times:   quantity ≤ available_stock            │
//! │                                                                         │
//! │   • Violating attempts are REJECTED, never silently clamped.            │
//! │   • `available_stock` is the LAST-KNOWN ceiling, not a server           │
//! │     reservation: the ledger is the sole arbiter at sale completion.     │
//! │   • An availability push that drops the ceiling below an existing       │
//! │     quantity does NOT trim the line; the next mutating call fails       │
//! │     and surfaces the conflict to the cashier.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Hold / Retrieve
//! Holding snapshots the whole cart (lines + checkout metadata) into a
//! terminal-local `HeldTransaction` and clears the active cart. Retrieval
//! restores it and removes it from the held list. Holds are never visible
//! to other terminals and reserve nothing at the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CartError, CartResult, ValidationError};
use crate::money::{Discount, Money};
use crate::types::{CatalogEntry, CheckoutMeta, PaymentMethod, SaleLine, VariantInfo};
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

// =============================================================================
// Line Snapshot
// =============================================================================

/// Frozen descriptive data for a cart line.
///
/// Captured when the line is created so the cart displays consistent data
/// even if the catalog changes underneath it. `unit_price` is the one field
/// a later availability push may refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSnapshot {
    pub variant_id: String,
    pub sku: String,
    pub product_name: String,
    pub variant_label: String,
    pub unit_price: Money,
}

impl LineSnapshot {
    /// Freezes the relevant fields of a catalog variant.
    pub fn from_variant(variant: &VariantInfo) -> Self {
        LineSnapshot {
            variant_id: variant.variant_id.clone(),
            sku: variant.sku.clone(),
            product_name: variant.product_name.clone(),
            variant_label: variant.variant_label.clone(),
            unit_price: variant.price,
        }
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One line in the reservation cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub snapshot: LineSnapshot,
    /// Units the cashier intends to sell. Always >= 1 while the line exists.
    pub quantity: i64,
    /// Last-known availability ceiling at the terminal's branch.
    pub available_stock: i64,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.snapshot.unit_price.multiply_quantity(self.quantity)
    }

    /// True if an availability push dropped the ceiling below the committed
    /// quantity. The line is left intact; mutation will fail until resolved.
    #[inline]
    pub fn is_over_committed(&self) -> bool {
        self.quantity > self.available_stock
    }

    /// Converts this line into a sale line for checkout.
    pub fn to_sale_line(&self) -> SaleLine {
        SaleLine {
            variant_id: self.snapshot.variant_id.clone(),
            sku: self.snapshot.sku.clone(),
            product_name: self.snapshot.product_name.clone(),
            variant_label: self.snapshot.variant_label.clone(),
            unit_price: self.snapshot.unit_price,
            quantity: self.quantity,
        }
    }
}

// =============================================================================
// Held Transaction
// =============================================================================

/// A complete terminal-local snapshot of a suspended cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldTransaction {
    /// Locally generated id (UUID v4).
    pub id: String,
    pub lines: Vec<CartLine>,
    pub meta: CheckoutMeta,
    pub held_at: DateTime<Utc>,
}

// =============================================================================
// Reservation Cart
// =============================================================================

/// The active cart plus the terminal-local held list.
///
/// ## Invariants
/// - Lines are unique by `variant_id`.
/// - `quantity ≤ available_stock` after every successful mutation.
/// - Maximum distinct lines: [`MAX_CART_LINES`].
/// - Maximum quantity per line: [`MAX_LINE_QUANTITY`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationCart {
    lines: Vec<CartLine>,
    meta: CheckoutMeta,
    held: Vec<HeldTransaction>,
    created_at: DateTime<Utc>,
}

impl ReservationCart {
    /// Creates an empty cart with no held transactions.
    pub fn new() -> Self {
        ReservationCart {
            lines: Vec::new(),
            meta: CheckoutMeta::default(),
            held: Vec::new(),
            created_at: Utc::now(),
        }
    }

    // -------------------------------------------------------------------------
    // Line Mutations
    // -------------------------------------------------------------------------

    /// Adds one unit of a catalog entry, or increments an existing line by one.
    ///
    /// ## Behavior
    /// - New line: created with `quantity = 1`, provided availability > 0.
    /// - Existing line: availability ceiling is refreshed from the entry,
    ///   then quantity incremented only if it stays within the ceiling.
    /// - On failure the cart is completely unchanged.
    pub fn add_line(&mut self, entry: &CatalogEntry) -> CartResult<()> {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.snapshot.variant_id == entry.variant.variant_id)
        {
            // latest push wins for the ceiling
            line.available_stock = entry.available;
            if line.quantity + 1 > line.available_stock {
                return Err(CartError::StockExhausted {
                    sku: line.snapshot.sku.clone(),
                    requested: line.quantity + 1,
                    available: line.available_stock,
                });
            }
            if line.quantity + 1 > MAX_LINE_QUANTITY {
                return Err(CartError::QuantityTooLarge {
                    requested: line.quantity + 1,
                    max: MAX_LINE_QUANTITY,
                });
            }
            line.quantity += 1;
            return Ok(());
        }

        if entry.available <= 0 {
            return Err(CartError::StockExhausted {
                sku: entry.variant.sku.clone(),
                requested: 1,
                available: entry.available,
            });
        }
        if self.lines.len() >= MAX_CART_LINES {
            return Err(CartError::CartFull {
                max: MAX_CART_LINES,
            });
        }

        self.lines.push(CartLine {
            snapshot: LineSnapshot::from_variant(&entry.variant),
            quantity: 1,
            available_stock: entry.available,
            added_at: Utc::now(),
        });
        Ok(())
    }

    /// Replaces a line's quantity atomically.
    ///
    /// ## Behavior
    /// - `n <= 0` removes the line (treated as success).
    /// - `n > available_stock` fails without mutating.
    /// - Missing line fails with `LineNotFound`, whatever `n` is.
    pub fn set_quantity(&mut self, variant_id: &str, n: i64) -> CartResult<()> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.snapshot.variant_id == variant_id)
            .ok_or_else(|| CartError::LineNotFound(variant_id.to_string()))?;

        if n <= 0 {
            self.lines.remove(idx);
            return Ok(());
        }
        if n > MAX_LINE_QUANTITY {
            return Err(CartError::QuantityTooLarge {
                requested: n,
                max: MAX_LINE_QUANTITY,
            });
        }

        let line = &mut self.lines[idx];
        if n > line.available_stock {
            return Err(CartError::StockExhausted {
                sku: line.snapshot.sku.clone(),
                requested: n,
                available: line.available_stock,
            });
        }
        line.quantity = n;
        Ok(())
    }

    /// Removes a line unconditionally (no stock checks).
    pub fn remove_line(&mut self, variant_id: &str) -> CartResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.snapshot.variant_id != variant_id);
        if self.lines.len() == before {
            Err(CartError::LineNotFound(variant_id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Clears the active cart and its checkout metadata.
    /// Held transactions are untouched.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.meta = CheckoutMeta::default();
        self.created_at = Utc::now();
    }

    /// Merges a pushed availability (and optionally price) into the matching
    /// line. Returns `true` if a line matched.
    ///
    /// Never alters `quantity`: an over-committed line stays over-committed
    /// until the cashier acts, and the next mutating call on it fails.
    pub fn apply_availability_update(
        &mut self,
        variant_id: &str,
        new_available: i64,
        new_price: Option<Money>,
    ) -> bool {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.snapshot.variant_id == variant_id)
        {
            line.available_stock = new_available;
            if let Some(price) = new_price {
                line.snapshot.unit_price = price;
            }
            true
        } else {
            false
        }
    }

    // -------------------------------------------------------------------------
    // Checkout Metadata
    // -------------------------------------------------------------------------

    pub fn set_customer(&mut self, customer: Option<String>) {
        self.meta.customer = customer;
    }

    /// Sets or clears the cart discount. Percentage discounts are validated
    /// to whole percents in 0..=100; nominal amounts are not bounded here.
    pub fn set_discount(&mut self, discount: Option<Discount>) -> Result<(), ValidationError> {
        if let Some(Discount::Percentage(pct)) = discount {
            if pct > 100 {
                return Err(ValidationError::PercentOutOfRange { value: pct });
            }
        }
        self.meta.discount = discount;
        Ok(())
    }

    pub fn set_payment_method(&mut self, method: Option<PaymentMethod>) {
        self.meta.payment_method = method;
    }

    pub fn meta(&self) -> &CheckoutMeta {
        &self.meta
    }

    // -------------------------------------------------------------------------
    // Hold / Retrieve
    // -------------------------------------------------------------------------

    /// Snapshots the full cart plus metadata into a held transaction, then
    /// clears the active cart. Returns the held id, or `None` if the cart
    /// was empty (holding nothing is a no-op).
    pub fn hold(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let id = Uuid::new_v4().to_string();
        self.held.push(HeldTransaction {
            id: id.clone(),
            lines: std::mem::take(&mut self.lines),
            meta: std::mem::take(&mut self.meta),
            held_at: Utc::now(),
        });
        self.created_at = Utc::now();
        Some(id)
    }

    /// Restores a held transaction as the active cart and removes it from
    /// the held list.
    ///
    /// Fails with `ActiveCartNotEmpty` if lines are present: the caller must
    /// explicitly clear or hold the active cart first, a destructive merge
    /// is never performed silently.
    pub fn retrieve(&mut self, held_id: &str) -> CartResult<()> {
        if !self.lines.is_empty() {
            return Err(CartError::ActiveCartNotEmpty);
        }
        let idx = self
            .held
            .iter()
            .position(|h| h.id == held_id)
            .ok_or_else(|| CartError::HeldNotFound(held_id.to_string()))?;

        let held = self.held.remove(idx);
        self.lines = held.lines;
        self.meta = held.meta;
        Ok(())
    }

    /// Deletes a held transaction. Purely local cleanup; nothing exists
    /// server-side to cancel.
    pub fn delete_held(&mut self, held_id: &str) -> CartResult<()> {
        let before = self.held.len();
        self.held.retain(|h| h.id != held_id);
        if self.held.len() == before {
            Err(CartError::HeldNotFound(held_id.to_string()))
        } else {
            Ok(())
        }
    }

    /// The current held transactions, oldest first.
    pub fn held_list(&self) -> &[HeldTransaction] {
        &self.held
    }

    /// Replaces the held list wholesale, used when restoring persisted holds
    /// at session start.
    pub fn restore_held(&mut self, held: Vec<HeldTransaction>) {
        self.held = held;
    }

    // -------------------------------------------------------------------------
    // Derived Values
    // -------------------------------------------------------------------------

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Σ unit_price × quantity over all lines.
    pub fn subtotal(&self) -> Money {
        self.lines
            .iter()
            .fold(Money::zero(), |acc, l| acc + l.line_total())
    }

    /// The discount applied against the current subtotal. Zero when no
    /// discount is set. Never negative; deliberately NOT clamped above the
    /// subtotal.
    pub fn discount_amount(&self) -> Money {
        match &self.meta.discount {
            Some(discount) => discount.amount_on(self.subtotal()),
            None => Money::zero(),
        }
    }

    /// `subtotal - discount_amount`. May be negative when a nominal discount
    /// exceeds the subtotal; this layer does not guard that.
    pub fn total(&self) -> Money {
        self.subtotal() - self.discount_amount()
    }
}

impl Default for ReservationCart {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(variant_id: &str, price: i64, available: i64) -> CatalogEntry {
        CatalogEntry {
            variant: VariantInfo {
                variant_id: variant_id.to_string(),
                product_id: format!("prod-{variant_id}"),
                product_name: format!("Product {variant_id}"),
                variant_label: "default".to_string(),
                sku: format!("SKU-{variant_id}"),
                price: Money::new(price),
            },
            available,
        }
    }

    #[test]
    fn test_add_line_creates_with_quantity_one() {
        let mut cart = ReservationCart::new();
        cart.add_line(&entry("v1", 19_000, 5)).unwrap();

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].quantity, 1);
        assert_eq!(cart.subtotal().amount(), 19_000);
    }

    #[test]
    fn test_add_line_increments_existing() {
        let mut cart = ReservationCart::new();
        let e = entry("v1", 19_000, 5);
        cart.add_line(&e).unwrap();
        cart.add_line(&e).unwrap();

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn test_add_at_zero_availability_fails_unchanged() {
        let mut cart = ReservationCart::new();
        let err = cart.add_line(&entry("v1", 19_000, 0)).unwrap_err();

        assert!(matches!(err, CartError::StockExhausted { .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_past_ceiling_fails_without_partial_change() {
        let mut cart = ReservationCart::new();
        let e = entry("v1", 19_000, 2);
        cart.add_line(&e).unwrap();
        cart.add_line(&e).unwrap();

        let err = cart.add_line(&e).unwrap_err();
        assert!(matches!(
            err,
            CartError::StockExhausted {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn test_set_quantity_replaces_atomically() {
        let mut cart = ReservationCart::new();
        cart.add_line(&entry("v1", 19_000, 10)).unwrap();

        cart.set_quantity("v1", 7).unwrap();
        assert_eq!(cart.lines()[0].quantity, 7);

        let err = cart.set_quantity("v1", 11).unwrap_err();
        assert!(matches!(err, CartError::StockExhausted { .. }));
        assert_eq!(cart.lines()[0].quantity, 7);
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut cart = ReservationCart::new();
        cart.add_line(&entry("v1", 19_000, 10)).unwrap();

        cart.set_quantity("v1", 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_missing_line_is_not_found() {
        let mut cart = ReservationCart::new();
        let err = cart.set_quantity("ghost", 0).unwrap_err();
        assert!(matches!(err, CartError::LineNotFound(_)));
    }

    #[test]
    fn test_availability_update_never_auto_trims() {
        let mut cart = ReservationCart::new();
        cart.add_line(&entry("v1", 19_000, 10)).unwrap();
        cart.set_quantity("v1", 8).unwrap();

        // push drops the ceiling below the committed quantity
        assert!(cart.apply_availability_update("v1", 3, None));
        assert_eq!(cart.lines()[0].quantity, 8);
        assert!(cart.lines()[0].is_over_committed());

        // next mutation surfaces the conflict
        let err = cart.set_quantity("v1", 8).unwrap_err();
        assert!(matches!(err, CartError::StockExhausted { .. }));
    }

    #[test]
    fn test_availability_update_refreshes_price() {
        let mut cart = ReservationCart::new();
        cart.add_line(&entry("v1", 19_000, 10)).unwrap();

        cart.apply_availability_update("v1", 10, Some(Money::new(21_000)));
        assert_eq!(cart.subtotal().amount(), 21_000);
    }

    #[test]
    fn test_availability_update_unmatched_variant() {
        let mut cart = ReservationCart::new();
        assert!(!cart.apply_availability_update("ghost", 4, None));
    }

    #[test]
    fn test_hold_retrieve_round_trip() {
        let mut cart = ReservationCart::new();
        cart.add_line(&entry("v1", 19_000, 10)).unwrap();
        cart.add_line(&entry("v2", 7_500, 4)).unwrap();
        cart.set_quantity("v1", 3).unwrap();
        cart.set_customer(Some("Ibu Sari".to_string()));
        cart.set_discount(Some(Discount::Percentage(10))).unwrap();
        cart.set_payment_method(Some(PaymentMethod::Qris));

        let lines_before = cart.lines().to_vec();
        let meta_before = cart.meta().clone();

        let held_id = cart.hold().unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.meta(), &CheckoutMeta::default());
        assert_eq!(cart.held_list().len(), 1);

        cart.retrieve(&held_id).unwrap();
        assert_eq!(cart.lines(), lines_before.as_slice());
        assert_eq!(cart.meta(), &meta_before);
        assert!(cart.held_list().is_empty());
    }

    #[test]
    fn test_hold_empty_cart_is_noop() {
        let mut cart = ReservationCart::new();
        assert!(cart.hold().is_none());
        assert!(cart.held_list().is_empty());
    }

    #[test]
    fn test_retrieve_into_non_empty_cart_fails() {
        let mut cart = ReservationCart::new();
        cart.add_line(&entry("v1", 19_000, 10)).unwrap();
        let held_id = cart.hold().unwrap();

        cart.add_line(&entry("v2", 7_500, 4)).unwrap();
        let err = cart.retrieve(&held_id).unwrap_err();
        assert!(matches!(err, CartError::ActiveCartNotEmpty));
        // held transaction is still there
        assert_eq!(cart.held_list().len(), 1);
    }

    #[test]
    fn test_delete_held() {
        let mut cart = ReservationCart::new();
        cart.add_line(&entry("v1", 19_000, 10)).unwrap();
        let held_id = cart.hold().unwrap();

        cart.delete_held(&held_id).unwrap();
        assert!(cart.held_list().is_empty());
        assert!(matches!(
            cart.delete_held(&held_id),
            Err(CartError::HeldNotFound(_))
        ));
    }

    #[test]
    fn test_discount_totals_percentage() {
        let mut cart = ReservationCart::new();
        cart.add_line(&entry("v1", 95_000, 10)).unwrap();
        cart.set_discount(Some(Discount::Percentage(10))).unwrap();

        assert_eq!(cart.subtotal().amount(), 95_000);
        assert_eq!(cart.discount_amount().amount(), 9_500);
        assert_eq!(cart.total().amount(), 85_500);
    }

    #[test]
    fn test_discount_totals_nominal() {
        let mut cart = ReservationCart::new();
        cart.add_line(&entry("v1", 95_000, 10)).unwrap();
        cart.set_discount(Some(Discount::Nominal(Money::new(5_000))))
            .unwrap();

        assert_eq!(cart.total().amount(), 90_000);
    }

    #[test]
    fn test_percentage_over_100_rejected() {
        let mut cart = ReservationCart::new();
        let err = cart.set_discount(Some(Discount::Percentage(120))).unwrap_err();
        assert!(matches!(err, ValidationError::PercentOutOfRange { .. }));
    }

    #[test]
    fn test_invariant_quantity_never_exceeds_ceiling() {
        // exhaustive small walk over mutation outcomes
        let mut cart = ReservationCart::new();
        let e = entry("v1", 1_000, 3);
        for _ in 0..5 {
            let _ = cart.add_line(&e);
            assert!(cart.lines().iter().all(|l| l.quantity <= l.available_stock));
        }
        let _ = cart.set_quantity("v1", 2);
        let _ = cart.set_quantity("v1", 99);
        assert!(cart.lines().iter().all(|l| l.quantity <= l.available_stock));
    }
}
