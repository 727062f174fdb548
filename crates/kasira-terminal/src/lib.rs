//! # kasira-terminal: Terminal Session Layer
//!
//! The cashier-facing side of Kasira: cart session, checkout, history
//! views and reconnect reconciliation, wired over the ledger API seam.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Kasira Terminal Composition                         │
//! │                                                                         │
//! │              ┌─────────────────────────────────────────┐               │
//! │              │       kasira-terminal (THIS CRATE)      │               │
//! │              │                                         │               │
//! │              │  TerminalSession   checkout / history   │               │
//! │              │  (cart + catalog)  Reconciler           │               │
//! │              └──────┬──────────────────┬───────────────┘               │
//! │                     │                  │                               │
//! │        dyn LedgerApi│                  │kasira_store::Database         │
//! │                     ▼                  ▼                               │
//! │              ┌─────────────┐    ┌─────────────┐                        │
//! │              │kasira-ledger│    │kasira-store │                        │
//! │              │  (truth)    │    │ (local)     │                        │
//! │              └─────────────┘    └─────────────┘                        │
//! │                                                                         │
//! │  Push events from kasira-sync land in                                  │
//! │  TerminalSession::apply_push_event; channel Established triggers       │
//! │  refresh_catalog + reconcile, channel Lost flips the offline gate.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - `session`: cart + catalog state and the push-event merge
//! - `api`: the `LedgerApi` seam and its in-process implementation
//! - `checkout`: sale completion with offline queueing
//! - `history`: history views with cache fallback
//! - `reconciler`: pending-sale replay on reconnect
//! - `error`: terminal error types

pub mod api;
pub mod checkout;
pub mod error;
pub mod history;
pub mod reconciler;
pub mod session;

pub use api::{InProcessLedger, LedgerApi};
pub use checkout::{checkout, CheckoutReceipt};
pub use error::{TerminalError, TerminalResult};
pub use history::{branch_history, HistoryView};
pub use reconciler::{reconcile, ReconcileConflict, ReconcileReport};
pub use session::TerminalSession;
