//! # Transaction Cache Repository
//!
//! Per-branch mirror of completed-sale history plus the pending queue
//! for sales recorded while offline.
//!
//! ## Cache Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Transaction Cache Lifecycle                            │
//! │                                                                         │
//! │  ONLINE HISTORY FETCH                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  replace_branch_cache(branch, txs)                                     │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │  1. DELETE synced rows for the branch (wholesale, no merge)    │   │
//! │  │  2. INSERT fetched rows as synced                              │   │
//! │  │  3. UPSERT cache_meta last_updated                             │   │
//! │  │                                                                 │   │
//! │  │  Pending rows are NEVER deleted here. An offline sale stays    │   │
//! │  │  queued until the Reconciler confirms the server has it.       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  OFFLINE SALE                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  insert_pending(tx) ──► sync_status = 'pending', is_offline = 1        │
//! │                                                                         │
//! │  RECONNECT (Reconciler)                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  mark_synced(transaction_number) ──► sync_status = 'synced'            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use kasira_core::{CachedTransaction, SyncStatus, TransactionRecord};

/// Repository for the per-branch transaction history cache.
#[derive(Debug, Clone)]
pub struct TransactionCacheRepository {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct CachedRow {
    payload: String,
    sync_status: String,
    cached_at: String,
}

impl CachedRow {
    fn into_cached(self) -> StoreResult<CachedTransaction> {
        let transaction: TransactionRecord = serde_json::from_str(&self.payload)?;
        let sync_status = match self.sync_status.as_str() {
            "pending" => SyncStatus::Pending,
            _ => SyncStatus::Synced,
        };
        let cached_at = DateTime::parse_from_rfc3339(&self.cached_at)
            .map_err(|e| StoreError::PayloadInvalid(e.to_string()))?
            .with_timezone(&Utc);

        Ok(CachedTransaction {
            transaction,
            sync_status,
            cached_at,
        })
    }
}

impl TransactionCacheRepository {
    /// Creates a new TransactionCacheRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionCacheRepository { pool }
    }

    /// Replaces a branch's cached history with a freshly fetched result set.
    ///
    /// ## Semantics
    /// - Synced rows for the branch are deleted and rewritten wholesale.
    ///   No incremental merge, so a partial cache can never linger.
    /// - Pending rows survive untouched. If a fetched transaction collides
    ///   with a pending row by transaction number, the pending row wins;
    ///   the Reconciler owns the promotion to synced.
    /// - `cache_meta.last_updated` is bumped in the same transaction.
    pub async fn replace_branch_cache(
        &self,
        branch_id: &str,
        transactions: &[TransactionRecord],
    ) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();

        debug!(
            branch_id = %branch_id,
            count = transactions.len(),
            "Replacing branch transaction cache"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM cached_transactions WHERE branch_id = ?1 AND sync_status = 'synced'",
        )
        .bind(branch_id)
        .execute(&mut *tx)
        .await?;

        for record in transactions {
            let payload = serde_json::to_string(record)?;
            sqlx::query(
                r#"
                INSERT INTO cached_transactions (
                    transaction_number, branch_id, payload,
                    is_offline, sync_status, cached_at
                ) VALUES (?1, ?2, ?3, ?4, 'synced', ?5)
                ON CONFLICT (transaction_number) DO NOTHING
                "#,
            )
            .bind(&record.transaction_number)
            .bind(branch_id)
            .bind(&payload)
            .bind(record.is_offline as i64)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO cache_meta (branch_id, last_updated)
            VALUES (?1, ?2)
            ON CONFLICT (branch_id) DO UPDATE SET last_updated = excluded.last_updated
            "#,
        )
        .bind(branch_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Queues a sale recorded while offline.
    ///
    /// The row is tagged `sync_status = 'pending'` and stays in the cache
    /// until [`mark_synced`](Self::mark_synced) promotes it.
    pub async fn insert_pending(&self, record: &TransactionRecord) -> StoreResult<()> {
        let payload = serde_json::to_string(record)?;
        let now = Utc::now().to_rfc3339();

        debug!(
            transaction_number = %record.transaction_number,
            "Caching offline sale as pending"
        );

        sqlx::query(
            r#"
            INSERT INTO cached_transactions (
                transaction_number, branch_id, payload,
                is_offline, sync_status, cached_at
            ) VALUES (?1, ?2, ?3, ?4, 'pending', ?5)
            "#,
        )
        .bind(&record.transaction_number)
        .bind(&record.branch_id)
        .bind(&payload)
        .bind(record.is_offline as i64)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Caches a sale that the ledger already accepted.
    pub async fn insert_synced(&self, record: &TransactionRecord) -> StoreResult<()> {
        let payload = serde_json::to_string(record)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO cached_transactions (
                transaction_number, branch_id, payload,
                is_offline, sync_status, cached_at
            ) VALUES (?1, ?2, ?3, ?4, 'synced', ?5)
            ON CONFLICT (transaction_number) DO UPDATE SET
                payload = excluded.payload,
                sync_status = 'synced',
                cached_at = excluded.cached_at
            "#,
        )
        .bind(&record.transaction_number)
        .bind(&record.branch_id)
        .bind(&payload)
        .bind(record.is_offline as i64)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Promotes a pending transaction to synced.
    ///
    /// Returns true if a row was updated. The `is_offline` tag is kept,
    /// so a reconciled sale stays distinguishable in history views.
    pub async fn mark_synced(&self, transaction_number: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cached_transactions SET sync_status = 'synced'
            WHERE transaction_number = ?1 AND sync_status = 'pending'
            "#,
        )
        .bind(transaction_number)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists a branch's cached history, newest first.
    pub async fn list_branch(&self, branch_id: &str) -> StoreResult<Vec<CachedTransaction>> {
        let rows: Vec<CachedRow> = sqlx::query_as(
            r#"
            SELECT payload, sync_status, cached_at
            FROM cached_transactions
            WHERE branch_id = ?1
            ORDER BY cached_at DESC, transaction_number DESC
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CachedRow::into_cached).collect()
    }

    /// Lists pending transactions awaiting reconciliation, oldest first.
    pub async fn list_pending(&self) -> StoreResult<Vec<CachedTransaction>> {
        let rows: Vec<CachedRow> = sqlx::query_as(
            r#"
            SELECT payload, sync_status, cached_at
            FROM cached_transactions
            WHERE sync_status = 'pending'
            ORDER BY cached_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CachedRow::into_cached).collect()
    }

    /// Counts pending transactions.
    pub async fn count_pending(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cached_transactions WHERE sync_status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Returns the branch cache's last-updated timestamp, if a fetch has
    /// ever landed for it.
    pub async fn last_updated(&self, branch_id: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT last_updated FROM cache_meta WHERE branch_id = ?1")
                .bind(branch_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(raw) => {
                let parsed = DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| StoreError::PayloadInvalid(e.to_string()))?
                    .with_timezone(&Utc);
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }
}
