//! # Checkout Workflow
//!
//! Turns the reservation cart into a committed sale.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Checkout Workflow                                │
//! │                                                                         │
//! │  build TransactionRecord from cart (lines, totals, meta)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerApi::complete_sale                                              │
//! │       │                                                                 │
//! │       ├── Ok ────────────────► cache as synced, clear cart             │
//! │       │                                                                 │
//! │       ├── Network ───────────► tag isOffline, queue as pending,        │
//! │       │                        clear cart (sale still happened at      │
//! │       │                        the counter; reconciler replays it)     │
//! │       │                                                                 │
//! │       └── InsufficientStock ─► CART INTACT, error surfaced; the        │
//! │           / Duplicate          cashier resolves and retries            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger is the sole arbiter: the cart's `available_stock` ceilings
//! are advisory and never substitute for the server-side check.

use chrono::Utc;
use tracing::{info, warn};

use crate::api::LedgerApi;
use crate::error::{TerminalError, TerminalResult};
use crate::session::TerminalSession;
use kasira_core::TransactionRecord;
use kasira_store::Database;

/// The outcome of a successful checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub transaction: TransactionRecord,
    /// True when the sale was queued offline instead of committed live.
    pub was_offline: bool,
}

/// Completes the sale in the active cart.
///
/// On success (live or queued offline) the cart is cleared and a receipt
/// returned. On a ledger rejection the cart is left fully intact.
pub async fn checkout(
    session: &mut TerminalSession,
    api: &dyn LedgerApi,
    db: &Database,
) -> TerminalResult<CheckoutReceipt> {
    if session.cart().is_empty() {
        return Err(TerminalError::EmptyCart);
    }

    let record = build_transaction(session);

    match api.complete_sale(record.clone()).await {
        Ok(()) => {
            info!(
                transaction_number = %record.transaction_number,
                total = %record.total,
                "sale committed"
            );
            db.transactions().insert_synced(&record).await?;
            session.cart_mut().clear();
            Ok(CheckoutReceipt {
                transaction: record,
                was_offline: false,
            })
        }

        Err(TerminalError::Network(reason)) => {
            warn!(
                transaction_number = %record.transaction_number,
                %reason,
                "ledger unreachable, queueing sale offline"
            );
            let mut record = record;
            record.is_offline = true;
            db.transactions().insert_pending(&record).await?;
            session.cart_mut().clear();
            Ok(CheckoutReceipt {
                transaction: record,
                was_offline: true,
            })
        }

        // shortage, duplicate number, validation: the cashier must act
        Err(err) => Err(err),
    }
}

fn build_transaction(session: &mut TerminalSession) -> TransactionRecord {
    let cart = session.cart();
    let lines = cart.lines().iter().map(|l| l.to_sale_line()).collect();
    let subtotal = cart.subtotal();
    let discount_amount = cart.discount_amount();
    let total = cart.total();
    let meta = cart.meta().clone();
    let branch_id = session.branch_id().to_string();
    let terminal_id = session.terminal_id().to_string();

    TransactionRecord {
        transaction_number: session.next_transaction_number(),
        branch_id,
        terminal_id,
        lines,
        meta,
        subtotal,
        discount_amount,
        total,
        is_offline: false,
        recorded_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InProcessLedger;
    use kasira_core::{CatalogEntry, Discount, Money, SyncStatus, VariantInfo};
    use kasira_ledger::{StockInItem, StockLedger};
    use kasira_store::DbConfig;
    use std::sync::Arc;

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

    async fn fixture(stock: i64) -> (TerminalSession, InProcessLedger, Database, Arc<StockLedger>) {
        let ledger = Arc::new(StockLedger::new());
        ledger
            .stock_in(vec![StockInItem {
                variant_id: "v1".to_string(),
                branch_id: "b1".to_string(),
                quantity: stock,
                price: Money::new(95_000),
                actor: "gudang".to_string(),
            }])
            .await;

        let api = InProcessLedger::new(ledger.clone());
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut session = TerminalSession::new("b1", "kasir1");
        session.refresh_catalog(vec![entry("v1", 95_000, stock)]);

        (session, api, db, ledger)
    }

    #[tokio::test]
    async fn test_online_checkout_commits_and_clears() {
        let (mut session, api, db, ledger) = fixture(5).await;
        session.add_to_cart("v1").unwrap();
        session
            .cart_mut()
            .set_discount(Some(Discount::Percentage(10)))
            .unwrap();

        let receipt = checkout(&mut session, &api, &db).await.unwrap();

        assert!(!receipt.was_offline);
        assert_eq!(receipt.transaction.subtotal, Money::new(95_000));
        assert_eq!(receipt.transaction.discount_amount, Money::new(9_500));
        assert_eq!(receipt.transaction.total, Money::new(85_500));
        assert!(session.cart().is_empty());

        // ledger decremented and the sale is cached as synced
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 4);
        let cached = db.transactions().list_branch("b1").await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_offline_checkout_queues_pending() {
        let (mut session, api, db, ledger) = fixture(5).await;
        session.add_to_cart("v1").unwrap();
        api.set_online(false);

        let receipt = checkout(&mut session, &api, &db).await.unwrap();

        assert!(receipt.was_offline);
        assert!(receipt.transaction.is_offline);
        assert!(session.cart().is_empty());

        // nothing hit the ledger; the sale sits in the pending queue
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 5);
        assert_eq!(db.transactions().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_shortage_leaves_cart_intact() {
        let (mut session, api, db, _ledger) = fixture(1).await;
        // stale catalog claims more than the ledger holds
        session.refresh_catalog(vec![entry("v1", 95_000, 3)]);
        session.add_to_cart("v1").unwrap();
        session.add_to_cart("v1").unwrap();

        let err = checkout(&mut session, &api, &db).await.unwrap_err();

        assert!(matches!(err, TerminalError::Ledger(_)));
        assert_eq!(session.cart().line_count(), 1);
        assert_eq!(session.cart().lines()[0].quantity, 2);
        assert_eq!(db.transactions().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_cart_cannot_check_out() {
        let (mut session, api, db, _ledger) = fixture(5).await;
        let err = checkout(&mut session, &api, &db).await.unwrap_err();
        assert!(matches!(err, TerminalError::EmptyCart));
    }
}
