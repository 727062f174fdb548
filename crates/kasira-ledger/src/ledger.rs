//! # Stock Ledger
//!
//! The authoritative `(variant, branch) → StockUnit` state and the mutations
//! that touch it: manual adjustments, stock-in batches, and sale completion.
//! (Transfers and alerts live in sibling modules as further impl blocks.)
//!
//! ## Atomicity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every quantity mutation is a single read-modify-write under the        │
//! │  ledger's write lock:                                                   │
//! │                                                                         │
//! │  terminal A ──complete_sale──┐                                          │
//! │                              ├──► write lock ──► exactly one wins       │
//! │  terminal B ──complete_sale──┘         │        the last unit           │
//! │                                        ▼                                │
//! │                              events published AFTER release             │
//! │                                                                         │
//! │  Lock order where two locks are needed: transactions, then units.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Clamping
//! Subtractions clamp at zero. The `AdjustmentRecord` stores the *actual*
//! applied difference: subtracting 5 from a unit holding 3 records -3.

use std::collections::HashMap;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use kasira_core::validation::validate_adjustment;
use kasira_core::{
    AdjustmentReason, AdjustmentRecord, AlertRule, Money, PushEvent, StockDirection, StockKey,
    StockUnit, TransactionRecord, TransferRecord,
};

use crate::error::{LedgerError, LedgerResult};

/// Broadcast capacity for the push-event feed. Slow subscribers past this
/// lag are dropped by tokio and must refetch.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Command Inputs
// =============================================================================

/// One manual adjustment as submitted by a terminal.
///
/// The reason arrives as a raw (direction, code) pair and is parsed by the
/// ledger, so a stale or invalid code fails per-item instead of poisoning a
/// whole batch.
#[derive(Debug, Clone)]
pub struct AdjustmentInput {
    pub variant_id: String,
    pub branch_id: String,
    pub direction: StockDirection,
    pub reason_code: String,
    /// Magnitude of the change, strictly positive.
    pub quantity: i64,
    pub notes: Option<String>,
    pub actor: String,
}

/// One additive stock-in line. Creates the unit if the variant has never
/// been stocked at the branch.
#[derive(Debug, Clone)]
pub struct StockInItem {
    pub variant_id: String,
    pub branch_id: String,
    pub quantity: i64,
    pub price: Money,
    pub actor: String,
}

// =============================================================================
// Batch Outcome
// =============================================================================

/// A failed item within a batch, by input position.
#[derive(Debug)]
pub struct BatchFailure {
    pub index: usize,
    pub error: LedgerError,
}

/// Per-item outcome of a batch submission. Batches are independent per
/// item and never atomic across items: succeeded items stay committed.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<AdjustmentRecord>,
    pub failed: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// The server-of-record for stock state.
///
/// Shared across request handlers as `Arc<StockLedger>`. The unit map sits
/// behind a `tokio::sync::RwLock` because cross-key operations (transfers,
/// multi-line sales) must be atomic as a whole; transfers and alerts are
/// keyed records with no cross-key coupling and live in `DashMap`s.
pub struct StockLedger {
    pub(crate) units: RwLock<HashMap<StockKey, StockUnit>>,
    pub(crate) adjustments: RwLock<Vec<AdjustmentRecord>>,
    pub(crate) transactions: RwLock<HashMap<String, TransactionRecord>>,
    pub(crate) transfers: DashMap<String, TransferRecord>,
    pub(crate) alerts: DashMap<StockKey, AlertRule>,
    pub(crate) events: broadcast::Sender<PushEvent>,
}

impl StockLedger {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        StockLedger {
            units: RwLock::new(HashMap::new()),
            adjustments: RwLock::new(Vec::new()),
            transactions: RwLock::new(HashMap::new()),
            transfers: DashMap::new(),
            alerts: DashMap::new(),
            events,
        }
    }

    /// Subscribes to the push-event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }

    /// Publishes an event to all subscribers. A send error only means no
    /// subscriber is currently listening, which is fine.
    pub(crate) fn publish(&self, event: PushEvent) {
        debug!(kind = event.kind(), "publishing push event");
        let _ = self.events.send(event);
    }

    /// Feeds a catalog-layer product event into the push feed.
    /// The ledger itself does not own catalog data.
    pub fn publish_product_event(&self, event: PushEvent) {
        self.publish(event);
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Current unit for a (variant, branch), if it has ever been stocked.
    pub async fn stock_unit(&self, variant_id: &str, branch_id: &str) -> Option<StockUnit> {
        let units = self.units.read().await;
        units.get(&StockKey::new(variant_id, branch_id)).cloned()
    }

    /// All units at a branch, for per-branch stock summaries.
    pub async fn branch_units(&self, branch_id: &str) -> Vec<(StockKey, StockUnit)> {
        let units = self.units.read().await;
        units
            .iter()
            .filter(|(key, _)| key.branch_id == branch_id)
            .map(|(key, unit)| (key.clone(), unit.clone()))
            .collect()
    }

    /// Adjustment history for a variant, optionally narrowed to one branch.
    /// Newest first.
    pub async fn adjustment_history(
        &self,
        variant_id: &str,
        branch_id: Option<&str>,
    ) -> Vec<AdjustmentRecord> {
        let adjustments = self.adjustments.read().await;
        let mut history: Vec<AdjustmentRecord> = adjustments
            .iter()
            .filter(|record| {
                record.variant_id == variant_id
                    && branch_id.map_or(true, |b| record.branch_id == b)
            })
            .cloned()
            .collect();
        history.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        history
    }

    // -------------------------------------------------------------------------
    // Adjustments & Stock-In
    // -------------------------------------------------------------------------

    /// Applies one manual adjustment atomically.
    ///
    /// Subtractions clamp at zero; the returned record carries the actual
    /// applied difference. Emits a `StockUpdated` push event with the new
    /// absolute quantity.
    pub async fn apply_adjustment(&self, input: AdjustmentInput) -> LedgerResult<AdjustmentRecord> {
        validate_adjustment(&input.variant_id, &input.branch_id, input.quantity)?;
        let reason = AdjustmentReason::parse(input.direction, &input.reason_code)?;

        let (record, event) = {
            let mut units = self.units.write().await;
            let key = StockKey::new(&input.variant_id, &input.branch_id);
            let unit = units
                .get_mut(&key)
                .ok_or_else(|| LedgerError::UnknownStock {
                    variant_id: input.variant_id.clone(),
                    branch_id: input.branch_id.clone(),
                })?;

            let previous_qty = unit.quantity;
            let new_qty = match reason.direction() {
                StockDirection::Add => previous_qty + input.quantity,
                StockDirection::Subtract => (previous_qty - input.quantity).max(0),
            };
            unit.quantity = new_qty;
            unit.updated_at = Utc::now();

            let record = AdjustmentRecord {
                id: Uuid::new_v4().to_string(),
                variant_id: input.variant_id.clone(),
                branch_id: input.branch_id.clone(),
                previous_qty,
                new_qty,
                difference: new_qty - previous_qty,
                reason,
                notes: input.notes,
                actor: input.actor,
                recorded_at: Utc::now(),
            };
            let event = PushEvent::StockUpdated {
                variant_id: input.variant_id.clone(),
                branch_id: input.branch_id.clone(),
                quantity: new_qty,
                price: unit.price,
            };
            (record, event)
        };

        info!(
            variant = %record.variant_id,
            branch = %record.branch_id,
            reason = %record.reason,
            difference = record.difference,
            "adjustment applied"
        );

        self.adjustments.write().await.push(record.clone());
        self.publish(event);
        Ok(record)
    }

    /// Applies a batch of adjustments, each independently.
    ///
    /// Not atomic across items: one item's failure (bad reason code, unknown
    /// stock) never blocks or rolls back the others.
    pub async fn apply_adjustments(&self, items: Vec<AdjustmentInput>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (index, item) in items.into_iter().enumerate() {
            match self.apply_adjustment(item).await {
                Ok(record) => outcome.succeeded.push(record),
                Err(error) => {
                    warn!(index, %error, "batch adjustment item failed");
                    outcome.failed.push(BatchFailure { index, error });
                }
            }
        }
        outcome
    }

    /// Additive restock batch with the same per-item independence.
    ///
    /// Unlike adjustments, stock-in creates the unit when the variant has
    /// never been stocked at the branch, and refreshes the price.
    pub async fn stock_in(&self, items: Vec<StockInItem>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (index, item) in items.into_iter().enumerate() {
            match self.stock_in_one(item).await {
                Ok(record) => outcome.succeeded.push(record),
                Err(error) => {
                    warn!(index, %error, "stock-in item failed");
                    outcome.failed.push(BatchFailure { index, error });
                }
            }
        }
        outcome
    }

    async fn stock_in_one(&self, item: StockInItem) -> LedgerResult<AdjustmentRecord> {
        validate_adjustment(&item.variant_id, &item.branch_id, item.quantity)?;

        let (record, event) = {
            let mut units = self.units.write().await;
            let key = StockKey::new(&item.variant_id, &item.branch_id);
            let unit = units.entry(key).or_insert_with(|| StockUnit {
                quantity: 0,
                price: item.price,
                updated_at: Utc::now(),
            });

            let previous_qty = unit.quantity;
            unit.quantity = previous_qty + item.quantity;
            unit.price = item.price;
            unit.updated_at = Utc::now();

            let record = AdjustmentRecord {
                id: Uuid::new_v4().to_string(),
                variant_id: item.variant_id.clone(),
                branch_id: item.branch_id.clone(),
                previous_qty,
                new_qty: unit.quantity,
                difference: item.quantity,
                reason: AdjustmentReason::Restock,
                notes: None,
                actor: item.actor,
                recorded_at: Utc::now(),
            };
            let event = PushEvent::StockUpdated {
                variant_id: item.variant_id,
                branch_id: item.branch_id,
                quantity: unit.quantity,
                price: unit.price,
            };
            (record, event)
        };

        self.adjustments.write().await.push(record.clone());
        self.publish(event);
        Ok(record)
    }

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    /// Completes a sale: decrements every line or fails on the first
    /// shortage with no changes at all.
    ///
    /// The transaction number is the idempotency key: a duplicate is
    /// rejected with `DuplicateTransaction` and never silently merged.
    pub async fn complete_sale(&self, record: TransactionRecord) -> LedgerResult<()> {
        // lock order: transactions, then units
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&record.transaction_number) {
            return Err(LedgerError::DuplicateTransaction {
                number: record.transaction_number.clone(),
            });
        }

        let events = {
            let mut units = self.units.write().await;

            // validate all lines before touching anything
            for line in &record.lines {
                let key = StockKey::new(&line.variant_id, &record.branch_id);
                let available = units.get(&key).map(|u| u.quantity).unwrap_or(0);
                if line.quantity > available {
                    return Err(LedgerError::InsufficientStock {
                        variant_id: line.variant_id.clone(),
                        branch_id: record.branch_id.clone(),
                        requested: line.quantity,
                        available,
                    });
                }
            }

            let mut events = Vec::with_capacity(record.lines.len());
            for line in &record.lines {
                let key = StockKey::new(&line.variant_id, &record.branch_id);
                // validated above, the key exists
                if let Some(unit) = units.get_mut(&key) {
                    unit.quantity -= line.quantity;
                    unit.updated_at = Utc::now();
                    events.push(PushEvent::StockUpdated {
                        variant_id: line.variant_id.clone(),
                        branch_id: record.branch_id.clone(),
                        quantity: unit.quantity,
                        price: unit.price,
                    });
                }
            }
            events
        };

        info!(
            number = %record.transaction_number,
            branch = %record.branch_id,
            lines = record.lines.len(),
            total = %record.total,
            offline = record.is_offline,
            "sale completed"
        );
        transactions.insert(record.transaction_number.clone(), record);
        drop(transactions);

        for event in events {
            self.publish(event);
        }
        Ok(())
    }

    /// Whether a transaction number is already recorded. Used by the
    /// reconciler to confirm server acknowledgment.
    pub async fn has_transaction(&self, number: &str) -> bool {
        self.transactions.read().await.contains_key(number)
    }

    /// All transactions at a branch, newest first.
    pub async fn transactions(&self, branch_id: &str) -> Vec<TransactionRecord> {
        let transactions = self.transactions.read().await;
        let mut result: Vec<TransactionRecord> = transactions
            .values()
            .filter(|t| t.branch_id == branch_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        result
    }
}

impl Default for StockLedger {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use kasira_core::{CheckoutMeta, SaleLine};

    async fn seeded_ledger(entries: &[(&str, &str, i64, i64)]) -> StockLedger {
        let ledger = StockLedger::new();
        let items = entries
            .iter()
            .map(|(variant, branch, qty, price)| StockInItem {
                variant_id: variant.to_string(),
                branch_id: branch.to_string(),
                quantity: *qty,
                price: Money::new(*price),
                actor: "seed".to_string(),
            })
            .collect();
        let outcome = ledger.stock_in(items).await;
        assert_eq!(outcome.failed_count(), 0);
        ledger
    }

    fn subtract(variant: &str, branch: &str, qty: i64, code: &str) -> AdjustmentInput {
        AdjustmentInput {
            variant_id: variant.to_string(),
            branch_id: branch.to_string(),
            direction: StockDirection::Subtract,
            reason_code: code.to_string(),
            quantity: qty,
            notes: None,
            actor: "tester".to_string(),
        }
    }

    fn sale(number: &str, branch: &str, lines: Vec<(&str, i64, i64)>) -> TransactionRecord {
        let lines: Vec<SaleLine> = lines
            .into_iter()
            .map(|(variant, qty, price)| SaleLine {
                variant_id: variant.to_string(),
                sku: format!("SKU-{variant}"),
                product_name: format!("Product {variant}"),
                variant_label: "default".to_string(),
                unit_price: Money::new(price),
                quantity: qty,
            })
            .collect();
        let subtotal = lines
            .iter()
            .fold(Money::zero(), |acc, l| acc + l.line_total());
        TransactionRecord {
            transaction_number: number.to_string(),
            branch_id: branch.to_string(),
            terminal_id: "term-1".to_string(),
            lines,
            meta: CheckoutMeta::default(),
            subtotal,
            discount_amount: Money::zero(),
            total: subtotal,
            is_offline: false,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subtract_clamps_at_zero_and_records_actual_difference() {
        let ledger = seeded_ledger(&[("v1", "b1", 3, 10_000)]).await;

        let record = ledger
            .apply_adjustment(subtract("v1", "b1", 5, "damaged"))
            .await
            .unwrap();

        assert_eq!(record.previous_qty, 3);
        assert_eq!(record.new_qty, 0);
        assert_eq!(record.difference, -3);
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn test_adjustment_emits_absolute_stock_event() {
        let ledger = seeded_ledger(&[("v1", "b1", 10, 10_000)]).await;
        let mut rx = ledger.subscribe();

        ledger
            .apply_adjustment(subtract("v1", "b1", 4, "expired"))
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            PushEvent::StockUpdated {
                variant_id,
                quantity,
                ..
            } => {
                assert_eq!(variant_id, "v1");
                assert_eq!(quantity, 6); // absolute, not -4
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_adjustment_on_unstocked_variant_fails() {
        let ledger = StockLedger::new();
        let err = ledger
            .apply_adjustment(subtract("ghost", "b1", 1, "lost"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownStock { .. }));
    }

    #[tokio::test]
    async fn test_batch_partial_failure_leaves_successes_committed() {
        let ledger = seeded_ledger(&[("v1", "b1", 10, 1_000), ("v2", "b1", 10, 1_000)]).await;

        let outcome = ledger
            .apply_adjustments(vec![
                subtract("v1", "b1", 2, "damaged"),
                subtract("v2", "b1", 3, "no_such_reason"),
                subtract("v2", "b1", 1, "sample"),
            ])
            .await;

        assert_eq!(outcome.succeeded_count(), 2);
        assert_eq!(outcome.failed_count(), 1);
        assert_eq!(outcome.failed[0].index, 1);
        assert!(matches!(
            outcome.failed[0].error,
            LedgerError::Validation(_)
        ));
        // both valid items applied despite the middle failure
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 8);
        assert_eq!(ledger.stock_unit("v2", "b1").await.unwrap().quantity, 9);
    }

    #[tokio::test]
    async fn test_stock_in_creates_unit() {
        let ledger = StockLedger::new();
        let outcome = ledger
            .stock_in(vec![StockInItem {
                variant_id: "new".to_string(),
                branch_id: "b1".to_string(),
                quantity: 12,
                price: Money::new(25_000),
                actor: "gudang".to_string(),
            }])
            .await;

        assert_eq!(outcome.succeeded_count(), 1);
        let unit = ledger.stock_unit("new", "b1").await.unwrap();
        assert_eq!(unit.quantity, 12);
        assert_eq!(unit.price.amount(), 25_000);
    }

    #[tokio::test]
    async fn test_complete_sale_decrements_all_lines() {
        let ledger = seeded_ledger(&[("v1", "b1", 5, 10_000), ("v2", "b1", 5, 4_000)]).await;

        ledger
            .complete_sale(sale("20260823-01-0001", "b1", vec![("v1", 2, 10_000), ("v2", 1, 4_000)]))
            .await
            .unwrap();

        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 3);
        assert_eq!(ledger.stock_unit("v2", "b1").await.unwrap().quantity, 4);
        assert!(ledger.has_transaction("20260823-01-0001").await);
    }

    #[tokio::test]
    async fn test_complete_sale_shortage_changes_nothing() {
        let ledger = seeded_ledger(&[("v1", "b1", 5, 10_000), ("v2", "b1", 1, 4_000)]).await;

        let err = ledger
            .complete_sale(sale("20260823-01-0002", "b1", vec![("v1", 2, 10_000), ("v2", 3, 4_000)]))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientStock { .. }));
        // first line not decremented either
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 5);
        assert!(!ledger.has_transaction("20260823-01-0002").await);
    }

    #[tokio::test]
    async fn test_duplicate_transaction_number_conflicts() {
        let ledger = seeded_ledger(&[("v1", "b1", 10, 10_000)]).await;

        ledger
            .complete_sale(sale("20260823-01-0003", "b1", vec![("v1", 1, 10_000)]))
            .await
            .unwrap();
        let err = ledger
            .complete_sale(sale("20260823-01-0003", "b1", vec![("v1", 1, 10_000)]))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::DuplicateTransaction { .. }));
        // the duplicate did not decrement stock a second time
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 9);
    }

    #[tokio::test]
    async fn test_concurrent_sales_of_last_unit_have_one_winner() {
        let ledger = Arc::new(seeded_ledger(&[("v1", "b1", 1, 10_000)]).await);

        let a = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .complete_sale(sale("20260823-01-1001", "b1", vec![("v1", 1, 10_000)]))
                    .await
            })
        };
        let b = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .complete_sale(sale("20260823-01-1002", "b1", vec![("v1", 1, 10_000)]))
                    .await
            })
        };

        let (ra, rb) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(
            ra.is_ok() as u8 + rb.is_ok() as u8,
            1,
            "exactly one sale must win the last unit"
        );
        let loser = if ra.is_err() { ra } else { rb };
        assert!(matches!(
            loser.unwrap_err(),
            LedgerError::InsufficientStock { .. }
        ));
        assert_eq!(ledger.stock_unit("v1", "b1").await.unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn test_adjustment_history_filters_by_branch() {
        let ledger = seeded_ledger(&[("v1", "b1", 10, 1_000), ("v1", "b2", 10, 1_000)]).await;
        ledger
            .apply_adjustment(subtract("v1", "b1", 1, "damaged"))
            .await
            .unwrap();
        ledger
            .apply_adjustment(subtract("v1", "b2", 2, "lost"))
            .await
            .unwrap();

        // seed stock-ins also appear in the audit trail
        let all = ledger.adjustment_history("v1", None).await;
        assert_eq!(all.len(), 4);
        let b2_only = ledger.adjustment_history("v1", Some("b2")).await;
        assert_eq!(b2_only.len(), 2);
        assert!(b2_only.iter().all(|r| r.branch_id == "b2"));
    }
}
