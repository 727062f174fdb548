//! # kasira-store: Offline Cache for Kasira Terminals
//!
//! This crate provides terminal-local storage for the Kasira stock system.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Kasira Terminal Data Flow                          │
//! │                                                                         │
//! │  Terminal Session (checkout / history / hold)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   kasira-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (held.rs,    │    │  (embedded)  │  │   │
//! │  │   │               │    │   trans-      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│   actions.rs) │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │    │               │    │              │  │   │
//! │  │   │ Management    │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (terminal-local, survives restarts)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Store error types
//! - [`repository`] - Repository implementations (held carts, history cache)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kasira_store::{Database, DbConfig};
//!
//! let config = DbConfig::new("path/to/kasira.db");
//! let db = Database::new(config).await?;
//!
//! // Park a cart
//! db.held().save(&held_transaction).await?;
//!
//! // Queue an offline sale
//! db.transactions().insert_pending(&record).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::held::HeldRepository;
pub use repository::transactions::TransactionCacheRepository;
