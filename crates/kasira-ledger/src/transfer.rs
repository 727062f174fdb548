//! # Inter-Branch Transfers
//!
//! Transfer lifecycle operations on the [`StockLedger`].
//!
//! ## State Machine
//! ```text
//! PENDING ──approve (re-validate sources)──► APPROVED ──apply──► COMPLETED
//!    │ ▲                                        │
//!    │ └──────── validation failed ◄────────────┘
//!    │
//!    └──reject──► REJECTED
//! ```
//!
//! Creation has no quantity effect. Approval re-validates source quantities
//! at approval time, not creation time: stock may have moved in between. A
//! failed approval puts the transfer back to PENDING for retry or edit; it
//! is never auto-rejected. The transient APPROVED state also serializes two
//! concurrent approvals of the same transfer.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use kasira_core::validation::validate_transfer;
use kasira_core::{PushEvent, StockKey, StockUnit, TransferItem, TransferRecord, TransferStatus};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::StockLedger;

impl StockLedger {
    /// Creates a PENDING transfer. No quantities change.
    pub fn create_transfer(
        &self,
        from_branch_id: &str,
        to_branch_id: &str,
        items: Vec<TransferItem>,
    ) -> LedgerResult<TransferRecord> {
        validate_transfer(from_branch_id, to_branch_id, &items)?;

        let record = TransferRecord {
            id: Uuid::new_v4().to_string(),
            from_branch_id: from_branch_id.to_string(),
            to_branch_id: to_branch_id.to_string(),
            items,
            status: TransferStatus::Pending,
            created_at: Utc::now(),
        };
        info!(
            id = %record.id,
            from = from_branch_id,
            to = to_branch_id,
            items = record.items.len(),
            "transfer created"
        );
        self.transfers.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    /// Approves a PENDING transfer and applies it.
    ///
    /// Source quantities are re-validated under the write lock; on shortage
    /// the transfer reverts to PENDING and `InsufficientStock` is returned.
    /// On success source units are decremented and destination units
    /// incremented (created on first stocking) in one atomic step, and the
    /// transfer lands as COMPLETED.
    pub async fn approve_transfer(&self, id: &str) -> LedgerResult<TransferRecord> {
        // claim the transfer before touching stock
        let claimed = {
            let mut entry = self
                .transfers
                .get_mut(id)
                .ok_or_else(|| LedgerError::TransferNotFound(id.to_string()))?;
            if entry.status != TransferStatus::Pending {
                return Err(LedgerError::InvalidTransferState {
                    id: id.to_string(),
                    status: entry.status.to_string(),
                    expected: TransferStatus::Pending.to_string(),
                });
            }
            entry.status = TransferStatus::Approved;
            entry.clone()
        };

        let applied = self.apply_transfer(&claimed).await;
        match applied {
            Ok(events) => {
                let completed = {
                    let mut entry = self
                        .transfers
                        .get_mut(id)
                        .ok_or_else(|| LedgerError::TransferNotFound(id.to_string()))?;
                    entry.status = TransferStatus::Completed;
                    entry.clone()
                };
                info!(id, "transfer completed");
                for event in events {
                    self.publish(event);
                }
                Ok(completed)
            }
            Err(error) => {
                // back to PENDING for retry or edit, never auto-rejected
                if let Some(mut entry) = self.transfers.get_mut(id) {
                    entry.status = TransferStatus::Pending;
                }
                warn!(id, %error, "transfer approval failed, left pending");
                Err(error)
            }
        }
    }

    /// Rejects a PENDING transfer. Terminal state, no quantity change.
    pub fn reject_transfer(&self, id: &str) -> LedgerResult<TransferRecord> {
        let mut entry = self
            .transfers
            .get_mut(id)
            .ok_or_else(|| LedgerError::TransferNotFound(id.to_string()))?;
        if entry.status != TransferStatus::Pending {
            return Err(LedgerError::InvalidTransferState {
                id: id.to_string(),
                status: entry.status.to_string(),
                expected: TransferStatus::Pending.to_string(),
            });
        }
        entry.status = TransferStatus::Rejected;
        info!(id, "transfer rejected");
        Ok(entry.clone())
    }

    pub fn get_transfer(&self, id: &str) -> Option<TransferRecord> {
        self.transfers.get(id).map(|entry| entry.clone())
    }

    /// All transfers touching a branch (as source or destination),
    /// newest first.
    pub fn branch_transfers(&self, branch_id: &str) -> Vec<TransferRecord> {
        let mut result: Vec<TransferRecord> = self
            .transfers
            .iter()
            .filter(|entry| {
                entry.from_branch_id == branch_id || entry.to_branch_id == branch_id
            })
            .map(|entry| entry.clone())
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    /// Validates and applies the stock movement for an approved transfer
    /// under one write lock. Returns the push events to publish.
    async fn apply_transfer(&self, transfer: &TransferRecord) -> LedgerResult<Vec<PushEvent>> {
        let mut units = self.units.write().await;

        // re-validate every source line before moving anything
        for item in &transfer.items {
            let key = StockKey::new(&item.variant_id, &transfer.from_branch_id);
            let available = units.get(&key).map(|u| u.quantity).unwrap_or(0);
            if item.quantity > available {
                return Err(LedgerError::InsufficientStock {
                    variant_id: item.variant_id.clone(),
                    branch_id: transfer.from_branch_id.clone(),
                    requested: item.quantity,
                    available,
                });
            }
        }

        let mut events = Vec::with_capacity(transfer.items.len() * 2);
        for item in &transfer.items {
            let source_key = StockKey::new(&item.variant_id, &transfer.from_branch_id);
            let price = match units.get_mut(&source_key) {
                Some(unit) => {
                    unit.quantity -= item.quantity;
                    unit.updated_at = Utc::now();
                    events.push(PushEvent::StockUpdated {
                        variant_id: item.variant_id.clone(),
                        branch_id: transfer.from_branch_id.clone(),
                        quantity: unit.quantity,
                        price: unit.price,
                    });
                    unit.price
                }
                // validated above, unreachable in practice
                None => continue,
            };

            let dest_key = StockKey::new(&item.variant_id, &transfer.to_branch_id);
            let dest = units.entry(dest_key).or_insert_with(|| StockUnit {
                quantity: 0,
                price,
                updated_at: Utc::now(),
            });
            dest.quantity += item.quantity;
            dest.updated_at = Utc::now();
            events.push(PushEvent::StockUpdated {
                variant_id: item.variant_id.clone(),
                branch_id: transfer.to_branch_id.clone(),
                quantity: dest.quantity,
                price: dest.price,
            });
        }
        Ok(events)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AdjustmentInput, StockInItem};
    use kasira_core::{Money, StockDirection, ValidationError};

    async fn ledger_with(variant: &str, branch: &str, qty: i64) -> StockLedger {
        let ledger = StockLedger::new();
        let outcome = ledger
            .stock_in(vec![StockInItem {
                variant_id: variant.to_string(),
                branch_id: branch.to_string(),
                quantity: qty,
                price: Money::new(10_000),
                actor: "seed".to_string(),
            }])
            .await;
        assert_eq!(outcome.failed_count(), 0);
        ledger
    }

    fn items(variant: &str, qty: i64) -> Vec<TransferItem> {
        vec![TransferItem {
            variant_id: variant.to_string(),
            quantity: qty,
        }]
    }

    #[tokio::test]
    async fn test_create_has_no_quantity_effect() {
        let ledger = ledger_with("v1", "b1", 10).await;
        let transfer = ledger.create_transfer("b1", "b2", items("v1", 4)).unwrap();

        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 10);
        assert!(ledger.stock_unit("v1", "b2").await.is_none());
    }

    #[tokio::test]
    async fn test_approve_moves_stock_atomically() {
        let ledger = ledger_with("v1", "b1", 10).await;
        let transfer = ledger.create_transfer("b1", "b2", items("v1", 4)).unwrap();

        let completed = ledger.approve_transfer(&transfer.id).await.unwrap();

        assert_eq!(completed.status, TransferStatus::Completed);
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 6);
        let dest = ledger.stock_unit("v1", "b2").await.unwrap();
        assert_eq!(dest.quantity, 4);
        // destination inherits source price on first stocking
        assert_eq!(dest.price.amount(), 10_000);
    }

    #[tokio::test]
    async fn test_approval_revalidates_at_approval_time() {
        let ledger = ledger_with("v1", "b1", 10).await;
        let transfer = ledger.create_transfer("b1", "b2", items("v1", 10)).unwrap();

        // stock moves between creation and approval
        ledger
            .apply_adjustment(AdjustmentInput {
                variant_id: "v1".to_string(),
                branch_id: "b1".to_string(),
                direction: StockDirection::Subtract,
                reason_code: "damaged".to_string(),
                quantity: 5,
                notes: None,
                actor: "tester".to_string(),
            })
            .await
            .unwrap();

        let err = ledger.approve_transfer(&transfer.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { .. }));

        // remains PENDING for retry, not auto-rejected
        let after = ledger.get_transfer(&transfer.id).unwrap();
        assert_eq!(after.status, TransferStatus::Pending);
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn test_reject_is_terminal() {
        let ledger = ledger_with("v1", "b1", 10).await;
        let transfer = ledger.create_transfer("b1", "b2", items("v1", 4)).unwrap();

        let rejected = ledger.reject_transfer(&transfer.id).unwrap();
        assert_eq!(rejected.status, TransferStatus::Rejected);
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 10);

        let err = ledger.approve_transfer(&transfer.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransferState { .. }));
    }

    #[tokio::test]
    async fn test_same_branch_and_empty_transfers_rejected() {
        let ledger = StockLedger::new();
        assert!(matches!(
            ledger.create_transfer("b1", "b1", items("v1", 1)),
            Err(LedgerError::Validation(
                ValidationError::SameBranchTransfer { .. }
            ))
        ));
        assert!(matches!(
            ledger.create_transfer("b1", "b2", Vec::new()),
            Err(LedgerError::Validation(ValidationError::EmptyTransfer))
        ));
    }

    #[tokio::test]
    async fn test_branch_transfers_lists_both_directions() {
        let ledger = ledger_with("v1", "b1", 10).await;
        ledger.create_transfer("b1", "b2", items("v1", 1)).unwrap();
        ledger.create_transfer("b3", "b1", items("v1", 1)).unwrap();
        ledger.create_transfer("b2", "b3", items("v1", 1)).unwrap();

        assert_eq!(ledger.branch_transfers("b1").len(), 2);
        assert_eq!(ledger.branch_transfers("b3").len(), 2);
    }
}
