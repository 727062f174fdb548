//! # Ledger API Seam
//!
//! The trait boundary between terminal workflows and the stock ledger.
//!
//! ## Why a Trait Here
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ledger API Seam                                  │
//! │                                                                         │
//! │  Terminal workflows (checkout, history, reconciler)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  dyn LedgerApi  ◄── the only way a terminal reaches the ledger         │
//! │       │                                                                 │
//! │       ├── InProcessLedger   single-process deployments and tests;      │
//! │       │                     wraps Arc<StockLedger> with a              │
//! │       │                     connectivity gate                          │
//! │       │                                                                 │
//! │       └── (remote client)   same trait over HTTP/WS in a               │
//! │                             multi-host deployment                      │
//! │                                                                         │
//! │  The connectivity gate makes "the network is down" a first-class       │
//! │  state: every call fails with TerminalError::Network, which is what    │
//! │  routes reads to the cache and checkout to the pending queue.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{TerminalError, TerminalResult};
use kasira_core::{
    AdjustmentRecord, AlertRule, CatalogEntry, LowStockEntry, ProductInfo, PushEvent,
    TransactionRecord, TransferItem, TransferRecord,
};
use kasira_ledger::{AdjustmentInput, BatchOutcome, StockInItem, StockLedger};

// =============================================================================
// Ledger API Trait
// =============================================================================

/// Everything a terminal asks of the stock ledger.
///
/// All methods are fallible: any of them may fail with
/// [`TerminalError::Network`] when the ledger is unreachable.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    // -- Sales ---------------------------------------------------------------

    /// Commits a completed sale. The ledger is the sole arbiter: it may
    /// reject with `InsufficientStock` or `DuplicateTransaction`.
    async fn complete_sale(&self, record: TransactionRecord) -> TerminalResult<()>;

    /// True if the ledger already holds a transaction with this number.
    async fn has_transaction(&self, number: &str) -> TerminalResult<bool>;

    /// Fetches a branch's completed transactions, newest first.
    async fn fetch_transactions(&self, branch_id: &str) -> TerminalResult<Vec<TransactionRecord>>;

    // -- Catalog -------------------------------------------------------------

    /// Fetches the sellable catalog for a branch with current availability.
    async fn fetch_catalog(&self, branch_id: &str) -> TerminalResult<Vec<CatalogEntry>>;

    // -- Adjustments ---------------------------------------------------------

    /// Submits a single manual adjustment.
    async fn submit_adjustment(&self, input: AdjustmentInput)
        -> TerminalResult<AdjustmentRecord>;

    /// Submits a batch of adjustments; items succeed or fail independently.
    async fn submit_adjustments(&self, items: Vec<AdjustmentInput>)
        -> TerminalResult<BatchOutcome>;

    /// Submits a stock-in batch (additive, creates units on first stocking).
    async fn stock_in(&self, items: Vec<StockInItem>) -> TerminalResult<BatchOutcome>;

    /// Fetches a variant's adjustment audit trail, optionally narrowed to
    /// one branch. Newest first.
    async fn adjustment_history(
        &self,
        variant_id: &str,
        branch_id: Option<&str>,
    ) -> TerminalResult<Vec<AdjustmentRecord>>;

    // -- Transfers -----------------------------------------------------------

    async fn create_transfer(
        &self,
        from_branch_id: &str,
        to_branch_id: &str,
        items: Vec<TransferItem>,
    ) -> TerminalResult<TransferRecord>;

    async fn approve_transfer(&self, id: &str) -> TerminalResult<TransferRecord>;

    async fn reject_transfer(&self, id: &str) -> TerminalResult<TransferRecord>;

    async fn branch_transfers(&self, branch_id: &str) -> TerminalResult<Vec<TransferRecord>>;

    // -- Alerts --------------------------------------------------------------

    async fn set_alert(
        &self,
        variant_id: &str,
        branch_id: &str,
        min_stock: i64,
    ) -> TerminalResult<AlertRule>;

    async fn deactivate_alert(&self, variant_id: &str, branch_id: &str)
        -> TerminalResult<AlertRule>;

    async fn low_stock(&self, branch_id: &str) -> TerminalResult<Vec<LowStockEntry>>;
}

// =============================================================================
// In-Process Implementation
// =============================================================================

/// [`LedgerApi`] over a ledger living in the same process.
///
/// Carries the product catalog (the ledger itself only tracks stock units)
/// and a connectivity gate. Flipping the gate off makes every call fail
/// with `Network`, which is how tests and the channel-loss path exercise
/// offline behavior without a real network.
pub struct InProcessLedger {
    ledger: Arc<StockLedger>,
    products: RwLock<HashMap<String, ProductInfo>>,
    online: AtomicBool,
}

impl InProcessLedger {
    pub fn new(ledger: Arc<StockLedger>) -> Self {
        InProcessLedger {
            ledger,
            products: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Flips the connectivity gate. Driven by the transport's
    /// Established/Lost channel events.
    pub fn set_online(&self, online: bool) {
        debug!(online, "ledger connectivity gate changed");
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Registers or replaces a product and publishes the catalog event.
    pub async fn upsert_product(&self, product: ProductInfo) {
        let mut products = self.products.write().await;
        let existed = products.insert(product.id.clone(), product.clone()).is_some();
        drop(products);

        let event = if existed {
            PushEvent::ProductUpdated { product }
        } else {
            PushEvent::ProductCreated { product }
        };
        self.ledger.publish_product_event(event);
    }

    /// Removes a product from the catalog and publishes the deletion.
    pub async fn remove_product(&self, product_id: &str) -> bool {
        let removed = self.products.write().await.remove(product_id).is_some();
        if removed {
            self.ledger.publish_product_event(PushEvent::ProductDeleted {
                product_id: product_id.to_string(),
            });
        }
        removed
    }

    fn gate(&self) -> TerminalResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(TerminalError::Network("sync channel is down".to_string()))
        }
    }
}

#[async_trait]
impl LedgerApi for InProcessLedger {
    async fn complete_sale(&self, record: TransactionRecord) -> TerminalResult<()> {
        self.gate()?;
        self.ledger.complete_sale(record).await?;
        Ok(())
    }

    async fn has_transaction(&self, number: &str) -> TerminalResult<bool> {
        self.gate()?;
        Ok(self.ledger.has_transaction(number).await)
    }

    async fn fetch_transactions(&self, branch_id: &str) -> TerminalResult<Vec<TransactionRecord>> {
        self.gate()?;
        Ok(self.ledger.transactions(branch_id).await)
    }

    async fn fetch_catalog(&self, branch_id: &str) -> TerminalResult<Vec<CatalogEntry>> {
        self.gate()?;

        let products = self.products.read().await;
        let mut entries = Vec::new();
        for product in products.values() {
            for variant in &product.variants {
                let unit = self
                    .ledger
                    .stock_unit(&variant.variant_id, branch_id)
                    .await;
                let mut variant = variant.clone();
                let available = match unit {
                    Some(unit) => {
                        // branch price overrides the catalog default
                        variant.price = unit.price;
                        unit.quantity
                    }
                    None => 0,
                };
                entries.push(CatalogEntry { variant, available });
            }
        }
        entries.sort_by(|a, b| a.variant.sku.cmp(&b.variant.sku));
        Ok(entries)
    }

    async fn submit_adjustment(
        &self,
        input: AdjustmentInput,
    ) -> TerminalResult<AdjustmentRecord> {
        self.gate()?;
        Ok(self.ledger.apply_adjustment(input).await?)
    }

    async fn submit_adjustments(
        &self,
        items: Vec<AdjustmentInput>,
    ) -> TerminalResult<BatchOutcome> {
        self.gate()?;
        Ok(self.ledger.apply_adjustments(items).await)
    }

    async fn stock_in(&self, items: Vec<StockInItem>) -> TerminalResult<BatchOutcome> {
        self.gate()?;
        Ok(self.ledger.stock_in(items).await)
    }

    async fn adjustment_history(
        &self,
        variant_id: &str,
        branch_id: Option<&str>,
    ) -> TerminalResult<Vec<AdjustmentRecord>> {
        self.gate()?;
        Ok(self.ledger.adjustment_history(variant_id, branch_id).await)
    }

    async fn create_transfer(
        &self,
        from_branch_id: &str,
        to_branch_id: &str,
        items: Vec<TransferItem>,
    ) -> TerminalResult<TransferRecord> {
        self.gate()?;
        Ok(self
            .ledger
            .create_transfer(from_branch_id, to_branch_id, items)?)
    }

    async fn approve_transfer(&self, id: &str) -> TerminalResult<TransferRecord> {
        self.gate()?;
        Ok(self.ledger.approve_transfer(id).await?)
    }

    async fn reject_transfer(&self, id: &str) -> TerminalResult<TransferRecord> {
        self.gate()?;
        Ok(self.ledger.reject_transfer(id)?)
    }

    async fn branch_transfers(&self, branch_id: &str) -> TerminalResult<Vec<TransferRecord>> {
        self.gate()?;
        Ok(self.ledger.branch_transfers(branch_id))
    }

    async fn set_alert(
        &self,
        variant_id: &str,
        branch_id: &str,
        min_stock: i64,
    ) -> TerminalResult<AlertRule> {
        self.gate()?;
        Ok(self.ledger.set_alert(variant_id, branch_id, min_stock)?)
    }

    async fn deactivate_alert(
        &self,
        variant_id: &str,
        branch_id: &str,
    ) -> TerminalResult<AlertRule> {
        self.gate()?;
        Ok(self.ledger.deactivate_alert(variant_id, branch_id)?)
    }

    async fn low_stock(&self, branch_id: &str) -> TerminalResult<Vec<LowStockEntry>> {
        self.gate()?;
        Ok(self.ledger.low_stock(branch_id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasira_core::{Money, VariantInfo};

    fn product(id: &str, variant_id: &str, sku: &str) -> ProductInfo {
        ProductInfo {
            id: id.to_string(),
            name: format!("Product {id}"),
            variants: vec![VariantInfo {
                variant_id: variant_id.to_string(),
                product_id: id.to_string(),
                product_name: format!("Product {id}"),
                variant_label: "default".to_string(),
                sku: sku.to_string(),
                price: Money::new(10_000),
            }],
        }
    }

    #[tokio::test]
    async fn test_offline_gate_rejects_every_call() {
        let api = InProcessLedger::new(Arc::new(StockLedger::new()));
        api.set_online(false);

        let err = api.fetch_catalog("b1").await.unwrap_err();
        assert!(err.is_network());

        let err = api.has_transaction("T-1").await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_catalog_reflects_branch_stock() {
        let ledger = Arc::new(StockLedger::new());
        let api = InProcessLedger::new(ledger.clone());
        api.upsert_product(product("p1", "v1", "SKU-1")).await;

        // Unstocked variant is browsable with zero availability
        let catalog = api.fetch_catalog("b1").await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].available, 0);

        ledger
            .stock_in(vec![StockInItem {
                variant_id: "v1".to_string(),
                branch_id: "b1".to_string(),
                quantity: 8,
                price: Money::new(12_500),
                actor: "gudang".to_string(),
            }])
            .await;

        let catalog = api.fetch_catalog("b1").await.unwrap();
        assert_eq!(catalog[0].available, 8);
        assert_eq!(catalog[0].variant.price, Money::new(12_500));
    }

    #[tokio::test]
    async fn test_product_events_are_published() {
        let ledger = Arc::new(StockLedger::new());
        let mut events = ledger.subscribe();
        let api = InProcessLedger::new(ledger);

        api.upsert_product(product("p1", "v1", "SKU-1")).await;
        api.upsert_product(product("p1", "v1", "SKU-1")).await;
        assert!(api.remove_product("p1").await);
        assert!(!api.remove_product("p1").await);

        assert_eq!(events.recv().await.unwrap().kind(), "product:created");
        assert_eq!(events.recv().await.unwrap().kind(), "product:updated");
        assert_eq!(events.recv().await.unwrap().kind(), "product:deleted");
    }
}
