//! # Reconciler
//!
//! Replays offline sales against the ledger after a reconnect.
//!
//! ## Reconciliation Pass
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Reconciliation Pass                               │
//! │                                                                         │
//! │  for each pending cached transaction (oldest first):                   │
//! │       │                                                                 │
//! │       ├── ledger already has the number? ──► confirm: mark synced      │
//! │       │                                                                 │
//! │       ├── complete_sale succeeds ──────────► confirm: mark synced      │
//! │       │                                                                 │
//! │       ├── ledger rejects (shortage, duplicate race) ──► CONFLICT:      │
//! │       │       stays pending, surfaced for manual resolution.           │
//! │       │       Never silently dropped, never auto-merged.               │
//! │       │                                                                 │
//! │       └── network dies mid-pass ──► abort; untouched rows stay         │
//! │           pending and the next reconnect retries them                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{info, warn};

use crate::api::LedgerApi;
use crate::error::{TerminalError, TerminalResult};
use kasira_store::Database;

/// One pending transaction the ledger rejected.
#[derive(Debug)]
pub struct ReconcileConflict {
    pub transaction_number: String,
    /// The ledger's rejection, verbatim, for the operator.
    pub reason: String,
}

/// The outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Transaction numbers now confirmed server-side and marked synced.
    pub confirmed: Vec<String>,
    /// Rejections needing manual resolution; their rows stay pending.
    pub conflicts: Vec<ReconcileConflict>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Runs one reconciliation pass over the pending queue.
///
/// Call after the sync channel reports `Established`. A mid-pass network
/// failure aborts with the error; already-confirmed rows keep their
/// synced status and the rest retry next time.
pub async fn reconcile(api: &dyn LedgerApi, db: &Database) -> TerminalResult<ReconcileReport> {
    let repo = db.transactions();
    let pending = repo.list_pending().await?;
    let mut report = ReconcileReport::default();

    info!(count = pending.len(), "reconciling pending transactions");

    for cached in pending {
        let number = cached.transaction.transaction_number.clone();

        // an earlier pass may have committed it just before losing the
        // connection; the number check makes the replay idempotent
        if api.has_transaction(&number).await? {
            repo.mark_synced(&number).await?;
            report.confirmed.push(number);
            continue;
        }

        match api.complete_sale(cached.transaction).await {
            Ok(()) => {
                repo.mark_synced(&number).await?;
                report.confirmed.push(number);
            }
            Err(err @ TerminalError::Network(_)) => return Err(err),
            Err(err) => {
                warn!(
                    transaction_number = %number,
                    error = %err,
                    "pending transaction rejected, surfacing conflict"
                );
                report.conflicts.push(ReconcileConflict {
                    transaction_number: number,
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        confirmed = report.confirmed.len(),
        conflicts = report.conflicts.len(),
        "reconciliation pass complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InProcessLedger;
    use chrono::Utc;
    use kasira_core::{CheckoutMeta, Money, SaleLine, SyncStatus, TransactionRecord};
    use kasira_ledger::{StockInItem, StockLedger};
    use kasira_store::DbConfig;
    use std::sync::Arc;

    fn offline_sale(number: &str, quantity: i64) -> TransactionRecord {
        TransactionRecord {
            transaction_number: number.to_string(),
            branch_id: "b1".to_string(),
            terminal_id: "kasir1".to_string(),
            lines: vec![SaleLine {
                variant_id: "v1".to_string(),
                sku: "SKU-1".to_string(),
                product_name: "Product 1".to_string(),
                variant_label: "default".to_string(),
                unit_price: Money::new(20_000),
                quantity,
            }],
            meta: CheckoutMeta::default(),
            subtotal: Money::new(20_000 * quantity),
            discount_amount: Money::zero(),
            total: Money::new(20_000 * quantity),
            is_offline: true,
            recorded_at: Utc::now(),
        }
    }

    async fn fixture(stock: i64) -> (InProcessLedger, Database, Arc<StockLedger>) {
        let ledger = Arc::new(StockLedger::new());
        ledger
            .stock_in(vec![StockInItem {
                variant_id: "v1".to_string(),
                branch_id: "b1".to_string(),
                quantity: stock,
                price: Money::new(20_000),
                actor: "gudang".to_string(),
            }])
            .await;
        let api = InProcessLedger::new(ledger.clone());
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        (api, db, ledger)
    }

    #[tokio::test]
    async fn test_offline_round_trip() {
        let (api, db, ledger) = fixture(10).await;
        db.transactions()
            .insert_pending(&offline_sale("T-OFF", 2))
            .await
            .unwrap();

        let report = reconcile(&api, &db).await.unwrap();

        assert_eq!(report.confirmed, vec!["T-OFF".to_string()]);
        assert!(report.is_clean());
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 8);

        let cached = db.transactions().list_branch("b1").await.unwrap();
        assert_eq!(cached[0].sync_status, SyncStatus::Synced);
        assert!(cached[0].transaction.is_offline); // history flag survives
    }

    #[tokio::test]
    async fn test_already_known_number_confirms_without_replay() {
        let (api, db, ledger) = fixture(10).await;
        // the sale reached the ledger before the connection dropped
        ledger.complete_sale(offline_sale("T-OFF", 2)).await.unwrap();
        db.transactions()
            .insert_pending(&offline_sale("T-OFF", 2))
            .await
            .unwrap();

        let report = reconcile(&api, &db).await.unwrap();

        assert_eq!(report.confirmed, vec!["T-OFF".to_string()]);
        // not decremented twice
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 8);
    }

    #[tokio::test]
    async fn test_shortage_surfaces_conflict_and_stays_pending() {
        let (api, db, _ledger) = fixture(1).await;
        db.transactions()
            .insert_pending(&offline_sale("T-OFF", 5))
            .await
            .unwrap();

        let report = reconcile(&api, &db).await.unwrap();

        assert!(report.confirmed.is_empty());
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].transaction_number, "T-OFF");
        assert_eq!(db.transactions().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_network_loss_aborts_pass() {
        let (api, db, _ledger) = fixture(10).await;
        db.transactions()
            .insert_pending(&offline_sale("T-OFF", 2))
            .await
            .unwrap();
        api.set_online(false);

        let err = reconcile(&api, &db).await.unwrap_err();

        assert!(err.is_network());
        assert_eq!(db.transactions().count_pending().await.unwrap(), 1);
    }
}
