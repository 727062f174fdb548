//! # Low-Stock Alerts
//!
//! Declarative minimum-stock thresholds per (variant, branch). An alert is
//! not a trigger: the ledger never fires anything when stock crosses the
//! threshold. Display and query logic call [`StockLedger::low_stock`] to
//! compare current quantities against active rules.
//!
//! Deactivation is a lifecycle state, not a deletion, so the last-configured
//! threshold stays readable.

use chrono::Utc;
use tracing::info;

use kasira_core::validation::validate_alert;
use kasira_core::{AlertRule, AlertStatus, LowStockEntry, StockKey};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::StockLedger;

impl StockLedger {
    /// Creates or updates the alert rule for a (variant, branch), making it
    /// active. Upserting reactivates a previously deactivated rule.
    pub fn set_alert(
        &self,
        variant_id: &str,
        branch_id: &str,
        min_stock: i64,
    ) -> LedgerResult<AlertRule> {
        validate_alert(variant_id, branch_id, min_stock)?;

        let rule = AlertRule {
            variant_id: variant_id.to_string(),
            branch_id: branch_id.to_string(),
            min_stock,
            status: AlertStatus::Active,
            updated_at: Utc::now(),
        };
        info!(variant = variant_id, branch = branch_id, min_stock, "alert set");
        self.alerts
            .insert(StockKey::new(variant_id, branch_id), rule.clone());
        Ok(rule)
    }

    pub fn get_alert(&self, variant_id: &str, branch_id: &str) -> Option<AlertRule> {
        self.alerts
            .get(&StockKey::new(variant_id, branch_id))
            .map(|entry| entry.clone())
    }

    /// Soft-deactivates an alert rule. The threshold value remains visible
    /// via [`StockLedger::get_alert`]; only evaluation stops.
    pub fn deactivate_alert(&self, variant_id: &str, branch_id: &str) -> LedgerResult<AlertRule> {
        let mut entry = self
            .alerts
            .get_mut(&StockKey::new(variant_id, branch_id))
            .ok_or_else(|| LedgerError::AlertNotFound {
                variant_id: variant_id.to_string(),
                branch_id: branch_id.to_string(),
            })?;
        entry.status = AlertStatus::Inactive;
        entry.updated_at = Utc::now();
        info!(variant = variant_id, branch = branch_id, "alert deactivated");
        Ok(entry.clone())
    }

    /// Variants at a branch whose current quantity is at or below an active
    /// alert threshold. Never-stocked variants with a rule count as zero.
    pub async fn low_stock(&self, branch_id: &str) -> Vec<LowStockEntry> {
        let units = self.units.read().await;
        let mut entries: Vec<LowStockEntry> = self
            .alerts
            .iter()
            .filter(|rule| rule.branch_id == branch_id && rule.is_active())
            .filter_map(|rule| {
                let key = StockKey::new(&rule.variant_id, &rule.branch_id);
                let quantity = units.get(&key).map(|u| u.quantity).unwrap_or(0);
                (quantity <= rule.min_stock).then(|| LowStockEntry {
                    variant_id: rule.variant_id.clone(),
                    branch_id: rule.branch_id.clone(),
                    quantity,
                    min_stock: rule.min_stock,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.variant_id.cmp(&b.variant_id));
        entries
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::StockInItem;
    use kasira_core::{Money, ValidationError};

    async fn stocked(ledger: &StockLedger, variant: &str, branch: &str, qty: i64) {
        let outcome = ledger
            .stock_in(vec![StockInItem {
                variant_id: variant.to_string(),
                branch_id: branch.to_string(),
                quantity: qty,
                price: Money::new(5_000),
                actor: "seed".to_string(),
            }])
            .await;
        assert_eq!(outcome.failed_count(), 0);
    }

    #[tokio::test]
    async fn test_low_stock_compares_against_active_rules() {
        let ledger = StockLedger::new();
        stocked(&ledger, "v1", "b1", 3).await;
        stocked(&ledger, "v2", "b1", 20).await;
        ledger.set_alert("v1", "b1", 5).unwrap();
        ledger.set_alert("v2", "b1", 5).unwrap();

        let low = ledger.low_stock("b1").await;
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].variant_id, "v1");
        assert_eq!(low[0].quantity, 3);
        assert_eq!(low[0].min_stock, 5);
    }

    #[tokio::test]
    async fn test_deactivated_rule_keeps_threshold_but_stops_matching() {
        let ledger = StockLedger::new();
        stocked(&ledger, "v1", "b1", 1).await;
        ledger.set_alert("v1", "b1", 5).unwrap();
        assert_eq!(ledger.low_stock("b1").await.len(), 1);

        let rule = ledger.deactivate_alert("v1", "b1").unwrap();
        assert_eq!(rule.status, AlertStatus::Inactive);
        // threshold still readable after deactivation
        assert_eq!(ledger.get_alert("v1", "b1").unwrap().min_stock, 5);
        assert!(ledger.low_stock("b1").await.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_reactivates() {
        let ledger = StockLedger::new();
        stocked(&ledger, "v1", "b1", 1).await;
        ledger.set_alert("v1", "b1", 5).unwrap();
        ledger.deactivate_alert("v1", "b1").unwrap();

        ledger.set_alert("v1", "b1", 2).unwrap();
        let low = ledger.low_stock("b1").await;
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].min_stock, 2);
    }

    #[tokio::test]
    async fn test_never_stocked_variant_counts_as_zero() {
        let ledger = StockLedger::new();
        ledger.set_alert("ghost", "b1", 0).unwrap();

        let low = ledger.low_stock("b1").await;
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].quantity, 0);
    }

    #[tokio::test]
    async fn test_negative_threshold_rejected() {
        let ledger = StockLedger::new();
        assert!(matches!(
            ledger.set_alert("v1", "b1", -1),
            Err(LedgerError::Validation(
                ValidationError::MustBeNonNegative { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_deactivate_missing_rule() {
        let ledger = StockLedger::new();
        assert!(matches!(
            ledger.deactivate_alert("v1", "b1"),
            Err(LedgerError::AlertNotFound { .. })
        ));
    }
}
