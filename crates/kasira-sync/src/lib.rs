//! # Kasira Sync
//!
//! Synchronization channel between the central stock ledger and terminals.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Architecture                                │
//! │                                                                         │
//! │   LEDGER SIDE                              TERMINAL SIDE                │
//! │  ┌───────────────┐                        ┌───────────────┐            │
//! │  │  StockLedger  │                        │   Terminal    │            │
//! │  │  (broadcast)  │                        │   Session     │            │
//! │  └───────┬───────┘                        └───────▲───────┘            │
//! │          │ PushEvent                              │ ChannelEvent       │
//! │  ┌───────▼───────┐      WebSocket         ┌───────┴───────┐            │
//! │  │   HubServer   │◄──────────────────────►│   Transport   │            │
//! │  │   (fan-out)   │   SyncMessage (JSON)   │  (reconnect)  │            │
//! │  └───────────────┘                        └───────────────┘            │
//! │                                                                         │
//! │  The hub fans every push out to ALL connected terminals. Delivery      │
//! │  is at-least-once and unordered across keys; every push carries        │
//! │  absolute state, so terminals merge idempotently.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - `protocol`: Wire messages (Hello/Welcome/Push/Ping/Pong/Error)
//! - `hub`: WebSocket fan-out server run next to the ledger
//! - `transport`: Reconnecting WebSocket client for terminals
//! - `config`: TOML configuration with env overrides
//! - `error`: Error types

pub mod config;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod transport;

pub use config::{BranchConfig, ChannelSettings, HubSettings, SyncConfig, TerminalConfig};
pub use error::{SyncError, SyncResult};
pub use hub::{forward_ledger_events, HubConfig, HubHandle, HubServer, DEFAULT_HUB_PORT};
pub use protocol::{HelloPayload, SyncMessage, WelcomePayload, PROTOCOL_VERSION};
pub use transport::{
    ChannelEvent, ConnectionState, Transport, TransportConfig, TransportHandle,
};
