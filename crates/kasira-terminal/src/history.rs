//! # Transaction History Views
//!
//! Branch history with offline cache fallback.
//!
//! ## Read Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       History Read Path                                 │
//! │                                                                         │
//! │  LedgerApi::fetch_transactions(branch)                                 │
//! │       │                                                                 │
//! │       ├── Ok(txs) ──► replace branch cache wholesale                   │
//! │       │               return live view (is_from_cache = false)         │
//! │       │                                                                 │
//! │       └── Network ──► serve the cache, flagged is_from_cache = true    │
//! │                       with its last-updated timestamp; an empty        │
//! │                       cache yields an explicitly empty offline view,   │
//! │                       never an error                                   │
//! │                                                                         │
//! │  Pending offline sales always appear in the view, whichever path.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::api::LedgerApi;
use crate::error::{TerminalError, TerminalResult};
use kasira_core::CachedTransaction;
use kasira_store::Database;

/// A branch history view, live or cache-served.
#[derive(Debug)]
pub struct HistoryView {
    pub entries: Vec<CachedTransaction>,
    /// True when the ledger was unreachable and the cache answered.
    pub is_from_cache: bool,
    /// When the cache last saw a successful fetch. `None` if never.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Fetches a branch's transaction history, falling back to the local
/// cache when the ledger is unreachable.
pub async fn branch_history(
    api: &dyn LedgerApi,
    db: &Database,
    branch_id: &str,
) -> TerminalResult<HistoryView> {
    let repo = db.transactions();

    match api.fetch_transactions(branch_id).await {
        Ok(transactions) => {
            debug!(
                branch_id,
                count = transactions.len(),
                "history fetched, replacing cache"
            );
            repo.replace_branch_cache(branch_id, &transactions).await?;
            Ok(HistoryView {
                entries: repo.list_branch(branch_id).await?,
                is_from_cache: false,
                last_updated: repo.last_updated(branch_id).await?,
            })
        }

        Err(TerminalError::Network(reason)) => {
            warn!(branch_id, %reason, "ledger unreachable, serving history from cache");
            Ok(HistoryView {
                entries: repo.list_branch(branch_id).await?,
                is_from_cache: true,
                last_updated: repo.last_updated(branch_id).await?,
            })
        }

        Err(err) => Err(err),
    }
}
