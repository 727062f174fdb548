//! # Terminal Session
//!
//! Per-terminal mutable state: the reservation cart, the cached catalog,
//! and the merge of pushed events into both.
//!
//! ## Push Merge
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Push-Event Merge                                 │
//! │                                                                         │
//! │  stock:updated (this branch)                                           │
//! │       ├── catalog entry: availability + price overwritten              │
//! │       └── cart line: ceiling + price refreshed, quantity NEVER trimmed │
//! │                                                                         │
//! │  stock:updated (other branch)  ──► ignored entirely                    │
//! │                                                                         │
//! │  product:created / product:updated                                    │
//! │       └── catalog variants upserted; availability carried over         │
//! │                                                                         │
//! │  product:deleted                                                       │
//! │       ├── catalog entries purged (no longer sellable going forward)    │
//! │       └── cart lines UNTOUCHED: the snapshot keeps the sale valid      │
//! │                                                                         │
//! │  Every event carries absolute state, so replaying one is a no-op.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use tracing::debug;

use crate::error::{TerminalError, TerminalResult};
use kasira_core::{CatalogEntry, HeldTransaction, PushEvent, ReservationCart};
use kasira_store::Database;

/// One cashier-facing terminal session.
///
/// Owned exclusively by a single terminal loop; nothing here needs
/// cross-actor locking.
pub struct TerminalSession {
    branch_id: String,
    terminal_id: String,
    cart: ReservationCart,
    /// Catalog keyed by variant id, with last-known availability.
    catalog: HashMap<String, CatalogEntry>,
    /// Per-session sale counter feeding transaction numbers.
    sale_seq: u64,
}

impl TerminalSession {
    pub fn new(branch_id: impl Into<String>, terminal_id: impl Into<String>) -> Self {
        TerminalSession {
            branch_id: branch_id.into(),
            terminal_id: terminal_id.into(),
            cart: ReservationCart::new(),
            catalog: HashMap::new(),
            sale_seq: 0,
        }
    }

    pub fn branch_id(&self) -> &str {
        &self.branch_id
    }

    pub fn terminal_id(&self) -> &str {
        &self.terminal_id
    }

    pub fn cart(&self) -> &ReservationCart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut ReservationCart {
        &mut self.cart
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    /// Replaces the cached catalog wholesale with a fresh fetch.
    ///
    /// Called after `Established` on the sync channel: a reconnected
    /// terminal may have missed pushes, so it refetches instead of
    /// trusting stale entries.
    pub fn refresh_catalog(&mut self, entries: Vec<CatalogEntry>) {
        debug!(count = entries.len(), "catalog refreshed");
        self.catalog = entries
            .into_iter()
            .map(|e| (e.variant.variant_id.clone(), e))
            .collect();

        // carry fresh ceilings into any open cart lines
        let updates: Vec<(String, i64, kasira_core::Money)> = self
            .catalog
            .values()
            .map(|e| (e.variant.variant_id.clone(), e.available, e.variant.price))
            .collect();
        for (variant_id, available, price) in updates {
            self.cart
                .apply_availability_update(&variant_id, available, Some(price));
        }
    }

    pub fn catalog_entry(&self, variant_id: &str) -> Option<&CatalogEntry> {
        self.catalog.get(variant_id)
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }

    /// Case-insensitive substring search over name, label and SKU,
    /// sorted by SKU for stable display.
    pub fn search(&self, query: &str) -> Vec<&CatalogEntry> {
        let needle = query.to_lowercase();
        let mut hits: Vec<&CatalogEntry> = self
            .catalog
            .values()
            .filter(|e| {
                e.variant.product_name.to_lowercase().contains(&needle)
                    || e.variant.variant_label.to_lowercase().contains(&needle)
                    || e.variant.sku.to_lowercase().contains(&needle)
            })
            .collect();
        hits.sort_by(|a, b| a.variant.sku.cmp(&b.variant.sku));
        hits
    }

    /// Adds one unit of a cataloged variant to the cart.
    pub fn add_to_cart(&mut self, variant_id: &str) -> TerminalResult<()> {
        let entry = self
            .catalog
            .get(variant_id)
            .ok_or_else(|| TerminalError::UnknownVariant(variant_id.to_string()))?;
        self.cart.add_line(entry)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Push Merge
    // -------------------------------------------------------------------------

    /// Merges one pushed event into the session. Idempotent: events carry
    /// absolute state, so applying the same event twice changes nothing.
    ///
    /// Returns `true` if the session state changed.
    pub fn apply_push_event(&mut self, event: &PushEvent) -> bool {
        match event {
            PushEvent::StockUpdated {
                variant_id,
                branch_id,
                quantity,
                price,
            } => {
                if branch_id != &self.branch_id {
                    return false;
                }
                let mut changed = false;
                if let Some(entry) = self.catalog.get_mut(variant_id) {
                    entry.available = *quantity;
                    entry.variant.price = *price;
                    changed = true;
                }
                changed |= self
                    .cart
                    .apply_availability_update(variant_id, *quantity, Some(*price));
                changed
            }

            PushEvent::ProductCreated { product } | PushEvent::ProductUpdated { product } => {
                // drop variants the edit removed
                self.catalog.retain(|_, entry| {
                    entry.variant.product_id != product.id
                        || product
                            .variants
                            .iter()
                            .any(|v| v.variant_id == entry.variant.variant_id)
                });

                for variant in &product.variants {
                    let available = self
                        .catalog
                        .get(&variant.variant_id)
                        .map(|e| e.available)
                        .unwrap_or(0);
                    self.catalog.insert(
                        variant.variant_id.clone(),
                        CatalogEntry {
                            variant: variant.clone(),
                            available,
                        },
                    );
                }
                true
            }

            PushEvent::ProductDeleted { product_id } => {
                let before = self.catalog.len();
                self.catalog
                    .retain(|_, entry| entry.variant.product_id != *product_id);
                // cart lines keep their snapshots; an in-flight sale of a
                // just-deleted product is still a valid sale
                self.catalog.len() != before
            }
        }
    }

    // -------------------------------------------------------------------------
    // Hold Persistence
    // -------------------------------------------------------------------------

    /// Holds the active cart and persists the snapshot, so it survives a
    /// terminal restart. Returns the hold id, or `None` for an empty cart.
    pub async fn hold_cart(&mut self, db: &Database) -> TerminalResult<Option<String>> {
        let Some(id) = self.cart.hold() else {
            return Ok(None);
        };
        // the hold just created is the newest entry
        if let Some(held) = self.cart.held_list().iter().find(|h| h.id == id) {
            db.held().save(held).await?;
        }
        Ok(Some(id))
    }

    /// Retrieves a held cart and removes its persisted copy.
    pub async fn retrieve_hold(&mut self, db: &Database, hold_id: &str) -> TerminalResult<()> {
        self.cart.retrieve(hold_id)?;
        db.held().delete(hold_id).await?;
        Ok(())
    }

    /// Discards a held cart locally and in the store.
    pub async fn delete_hold(&mut self, db: &Database, hold_id: &str) -> TerminalResult<()> {
        self.cart.delete_held(hold_id)?;
        db.held().delete(hold_id).await?;
        Ok(())
    }

    /// Loads persisted holds at session start.
    pub async fn restore_holds(&mut self, db: &Database) -> TerminalResult<usize> {
        let holds: Vec<HeldTransaction> = db.held().list().await?;
        let count = holds.len();
        self.cart.restore_held(holds);
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Transaction Numbering
    // -------------------------------------------------------------------------

    /// Next locally unique transaction number:
    /// `YYYYMMDD-<terminal>-<seq>`, e.g. `20250817-kasir1-0007`.
    ///
    /// Unique per terminal without coordination, so it works offline.
    pub(crate) fn next_transaction_number(&mut self) -> String {
        self.sale_seq += 1;
        format!(
            "{}-{}-{:04}",
            chrono::Utc::now().format("%Y%m%d"),
            self.terminal_id,
            self.sale_seq
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasira_core::{Money, ProductInfo, VariantInfo};

    fn variant(variant_id: &str, product_id: &str, sku: &str, price: i64) -> VariantInfo {
        VariantInfo {
            variant_id: variant_id.to_string(),
            product_id: product_id.to_string(),
            product_name: format!("Product {product_id}"),
            variant_label: "default".to_string(),
            sku: sku.to_string(),
            price: Money::new(price),
        }
    }

    fn entry(variant_id: &str, product_id: &str, sku: &str, price: i64, available: i64) -> CatalogEntry {
        CatalogEntry {
            variant: variant(variant_id, product_id, sku, price),
            available,
        }
    }

    fn session_with_catalog() -> TerminalSession {
        let mut session = TerminalSession::new("b1", "kasir1");
        session.refresh_catalog(vec![
            entry("v1", "p1", "SKU-1", 15_000, 5),
            entry("v2", "p2", "SKU-2", 22_000, 3),
        ]);
        session
    }

    #[test]
    fn test_stock_push_updates_catalog_and_cart() {
        let mut session = session_with_catalog();
        session.add_to_cart("v1").unwrap();

        let event = PushEvent::StockUpdated {
            variant_id: "v1".to_string(),
            branch_id: "b1".to_string(),
            quantity: 2,
            price: Money::new(16_000),
        };
        assert!(session.apply_push_event(&event));

        assert_eq!(session.catalog_entry("v1").unwrap().available, 2);
        assert_eq!(session.cart().lines()[0].available_stock, 2);
        assert_eq!(
            session.cart().lines()[0].snapshot.unit_price,
            Money::new(16_000)
        );
    }

    #[test]
    fn test_stock_push_is_idempotent() {
        let mut session = session_with_catalog();
        let event = PushEvent::StockUpdated {
            variant_id: "v1".to_string(),
            branch_id: "b1".to_string(),
            quantity: 2,
            price: Money::new(15_000),
        };

        session.apply_push_event(&event);
        let snapshot = session.catalog_entry("v1").unwrap().clone();
        session.apply_push_event(&event);

        assert_eq!(session.catalog_entry("v1").unwrap(), &snapshot);
    }

    #[test]
    fn test_other_branch_push_is_ignored() {
        let mut session = session_with_catalog();
        let event = PushEvent::StockUpdated {
            variant_id: "v1".to_string(),
            branch_id: "b2".to_string(),
            quantity: 99,
            price: Money::new(1),
        };

        assert!(!session.apply_push_event(&event));
        assert_eq!(session.catalog_entry("v1").unwrap().available, 5);
    }

    #[test]
    fn test_push_never_trims_over_committed_line() {
        let mut session = session_with_catalog();
        session.add_to_cart("v1").unwrap();
        session.add_to_cart("v1").unwrap();
        session.add_to_cart("v1").unwrap();

        session.apply_push_event(&PushEvent::StockUpdated {
            variant_id: "v1".to_string(),
            branch_id: "b1".to_string(),
            quantity: 1,
            price: Money::new(15_000),
        });

        let line = &session.cart().lines()[0];
        assert_eq!(line.quantity, 3);
        assert!(line.is_over_committed());
    }

    #[test]
    fn test_product_deleted_purges_catalog_not_cart() {
        let mut session = session_with_catalog();
        session.add_to_cart("v1").unwrap();

        assert!(session.apply_push_event(&PushEvent::ProductDeleted {
            product_id: "p1".to_string(),
        }));

        assert!(session.catalog_entry("v1").is_none());
        assert_eq!(session.cart().line_count(), 1);
        assert_eq!(session.cart().lines()[0].snapshot.variant_id, "v1");
    }

    #[test]
    fn test_product_update_carries_availability_over() {
        let mut session = session_with_catalog();

        let updated = ProductInfo {
            id: "p1".to_string(),
            name: "Product p1 (renamed)".to_string(),
            variants: vec![variant("v1", "p1", "SKU-1-NEW", 18_000)],
        };
        session.apply_push_event(&PushEvent::ProductUpdated { product: updated });

        let entry = session.catalog_entry("v1").unwrap();
        assert_eq!(entry.available, 5); // untouched by a product edit
        assert_eq!(entry.variant.sku, "SKU-1-NEW");
    }

    #[test]
    fn test_product_update_drops_removed_variants() {
        let mut session = TerminalSession::new("b1", "kasir1");
        session.refresh_catalog(vec![
            entry("v1", "p1", "SKU-1", 15_000, 5),
            entry("v1b", "p1", "SKU-1B", 15_500, 2),
        ]);

        let updated = ProductInfo {
            id: "p1".to_string(),
            name: "Product p1".to_string(),
            variants: vec![variant("v1", "p1", "SKU-1", 15_000)],
        };
        session.apply_push_event(&PushEvent::ProductUpdated { product: updated });

        assert!(session.catalog_entry("v1").is_some());
        assert!(session.catalog_entry("v1b").is_none());
    }

    #[test]
    fn test_search_matches_name_and_sku() {
        let session = session_with_catalog();

        assert_eq!(session.search("sku-2").len(), 1);
        assert_eq!(session.search("product").len(), 2);
        assert!(session.search("nothing").is_empty());
    }

    #[test]
    fn test_transaction_numbers_are_sequential() {
        let mut session = session_with_catalog();
        let first = session.next_transaction_number();
        let second = session.next_transaction_number();

        assert!(first.contains("kasir1"));
        assert!(first.ends_with("-0001"));
        assert!(second.ends_with("-0002"));
    }
}
