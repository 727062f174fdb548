//! # Held Transaction Repository
//!
//! Persists parked carts so they survive a terminal restart.
//!
//! ## Hold / Retrieve Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Hold Persistence                                    │
//! │                                                                         │
//! │  Cashier taps "Hold"                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ReservationCart::hold() ──► HeldTransaction { id, lines, meta }       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  save() ──► INSERT INTO held_transactions (id, payload, held_at)       │
//! │                                                                         │
//! │  Terminal restart                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  list() ──► ReservationCart::restore_held(holds)                       │
//! │                                                                         │
//! │  Retrieve or delete                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  delete(id) ──► DELETE FROM held_transactions WHERE id = ?             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The whole `HeldTransaction` is stored as one JSON payload. Line
//! snapshots inside it keep their captured prices, so a price change
//! between hold and retrieve does not alter the parked cart.

use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::StoreResult;
use kasira_core::HeldTransaction;

/// Repository for parked-cart persistence.
#[derive(Debug, Clone)]
pub struct HeldRepository {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct HeldRow {
    payload: String,
}

impl HeldRepository {
    /// Creates a new HeldRepository.
    pub fn new(pool: SqlitePool) -> Self {
        HeldRepository { pool }
    }

    /// Persists a held transaction.
    ///
    /// Upserts by hold ID so re-saving after an edit is safe.
    pub async fn save(&self, held: &HeldTransaction) -> StoreResult<()> {
        let payload = serde_json::to_string(held)?;

        debug!(hold_id = %held.id, lines = held.lines.len(), "Persisting held transaction");

        sqlx::query(
            r#"
            INSERT INTO held_transactions (id, payload, held_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET
                payload = excluded.payload,
                held_at = excluded.held_at
            "#,
        )
        .bind(&held.id)
        .bind(&payload)
        .bind(held.held_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists all held transactions, oldest first.
    ///
    /// Rows with unparseable payloads are skipped with a warning rather
    /// than failing the whole restore.
    pub async fn list(&self) -> StoreResult<Vec<HeldTransaction>> {
        let rows: Vec<HeldRow> = sqlx::query_as(
            r#"
            SELECT payload
            FROM held_transactions
            ORDER BY held_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut holds = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str::<HeldTransaction>(&row.payload) {
                Ok(held) => holds.push(held),
                Err(e) => {
                    tracing::warn!("Skipping corrupt held transaction payload: {}", e);
                }
            }
        }

        Ok(holds)
    }

    /// Deletes a held transaction (after retrieve or explicit discard).
    ///
    /// Returns true if a row was deleted.
    pub async fn delete(&self, hold_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM held_transactions WHERE id = ?1")
            .bind(hold_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts persisted holds.
    pub async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM held_transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use kasira_core::{CheckoutMeta, HeldTransaction};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample_hold(id: &str) -> HeldTransaction {
        HeldTransaction {
            id: id.to_string(),
            lines: Vec::new(),
            meta: CheckoutMeta::default(),
            held_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_list_round_trip() {
        let db = test_db().await;
        let repo = db.held();

        repo.save(&sample_hold("hold-1")).await.unwrap();
        repo.save(&sample_hold("hold-2")).await.unwrap();

        let holds = repo.list().await.unwrap();
        assert_eq!(holds.len(), 2);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let db = test_db().await;
        let repo = db.held();

        repo.save(&sample_hold("hold-1")).await.unwrap();
        repo.save(&sample_hold("hold-1")).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_holds_survive_reopen() {
        let path = std::env::temp_dir().join(format!("kasira-test-{}.db", uuid::Uuid::new_v4()));

        {
            let db = Database::new(DbConfig::new(&path)).await.unwrap();
            db.held().save(&sample_hold("hold-1")).await.unwrap();
            db.close().await;
        }

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let holds = db.held().list().await.unwrap();
        assert_eq!(holds.len(), 1);
        assert_eq!(holds[0].id, "hold-1");

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = test_db().await;
        let repo = db.held();

        repo.save(&sample_hold("hold-1")).await.unwrap();
        assert!(repo.delete("hold-1").await.unwrap());
        assert!(!repo.delete("hold-1").await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
