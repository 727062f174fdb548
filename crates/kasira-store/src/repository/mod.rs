//! # Repository Module
//!
//! Cache repository implementations for Kasira terminals.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Terminal Session / Reconciler                                         │
//! │       │                                                                 │
//! │       │  db.transactions().list_pending()                               │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  TransactionCacheRepository                                            │
//! │  ├── replace_branch_cache(&self, branch, txs)                           │
//! │  ├── insert_pending(&self, tx)                                          │
//! │  ├── mark_synced(&self, transaction_number)                             │
//! │  └── list_branch(&self, branch)                                         │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                        │
//! │  • Easy to test (in-memory database per test)                          │
//! │  • SQL is isolated in one place                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`held::HeldRepository`] - Parked-cart persistence
//! - [`transactions::TransactionCacheRepository`] - Transaction history cache

pub mod held;
pub mod transactions;
