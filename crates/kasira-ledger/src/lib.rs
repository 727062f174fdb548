//! # kasira-ledger: The Server-of-Record Stock Ledger
//!
//! Authoritative per-(variant, branch) stock state and every workflow that
//! mutates it. Terminals never write quantities directly; they submit
//! operations here and learn the outcome through push events.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   terminal A ──┐                                  ┌──► hub fan-out      │
//! │   terminal B ──┼──► ★ StockLedger (THIS CRATE) ──┤    (kasira-sync)    │
//! │   terminal C ──┘         │                        └──► broadcast feed   │
//! │                          │                                              │
//! │              ┌───────────┼───────────────┐                              │
//! │              ▼           ▼               ▼                              │
//! │         adjustments   transfers       alerts                            │
//! │         (audit trail) (approval      (declarative                       │
//! │                        lifecycle)     thresholds)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`ledger`] - The `StockLedger`: units, adjustments, stock-in, sales
//! - [`transfer`] - Inter-branch transfer lifecycle
//! - [`alert`] - Low-stock alert rules and the low-stock view
//! - [`error`] - Typed ledger failures
//!
//! ## Guarantees
//!
//! 1. Every quantity mutation is a single atomic read-modify-write.
//! 2. Every mutation publishes the absolute latest state, never a delta.
//! 3. The transaction number is an idempotency key; duplicates conflict.

pub mod alert;
pub mod error;
pub mod ledger;
pub mod transfer;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{AdjustmentInput, BatchFailure, BatchOutcome, StockInItem, StockLedger};
