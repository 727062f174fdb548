//! # Sync Protocol Messages
//!
//! Message types for the push channel between the hub and terminals.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sync Protocol Messages                             │
//! │                                                                         │
//! │  HANDSHAKE FLOW                                                        │
//! │  ──────────────                                                        │
//! │  TERMINAL ───► Hello { terminal_id, branch_id, protocol_version }      │
//! │  HUB      ◄─── Welcome { hub_id, server_time }                         │
//! │                                                                         │
//! │  PUSH FAN-OUT (HUB → all terminals)                                    │
//! │  ──────────────────────────────────                                    │
//! │  HUB      ───► Push(stock:updated { variantId, branchId, qty, price }) │
//! │  HUB      ───► Push(product:created/updated/deleted { ... })           │
//! │                                                                         │
//! │  Delivery is at-least-once and unordered across keys. Every push       │
//! │  carries the latest ABSOLUTE state, never a delta.                     │
//! │                                                                         │
//! │  KEEPALIVE                                                             │
//! │  ─────────                                                             │
//! │  Both     ◄──► Ping { timestamp }                                      │
//! │  Both     ◄──► Pong { ping_timestamp, pong_timestamp }                 │
//! │                                                                         │
//! │  ERROR                                                                 │
//! │  ─────                                                                 │
//! │  Both     ◄──► Error { code, message }                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format (JSON)
//! Messages are serialized as tagged JSON using serde's adjacently tagged enum:
//! ```json
//! { "type": "Hello", "payload": { "terminalId": "...", ... } }
//! ```

use serde::{Deserialize, Serialize};

use kasira_core::PushEvent;

/// Current protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Main Message Enum (Tagged Union)
// =============================================================================

/// All sync protocol messages.
///
/// Uses serde's adjacently tagged enum for clean JSON serialization:
/// `{ "type": "Hello", "payload": { ... } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SyncMessage {
    // =========================================================================
    // Handshake Messages
    // =========================================================================
    /// Initial connection message from a terminal.
    Hello(HelloPayload),

    /// Response from the hub after a successful handshake.
    Welcome(WelcomePayload),

    // =========================================================================
    // Push Messages
    // =========================================================================
    /// A state-change event fanned out to all terminals.
    Push(PushEvent),

    // =========================================================================
    // Keepalive Messages
    // =========================================================================
    /// Ping for keepalive.
    Ping { timestamp: String },

    /// Pong response for keepalive.
    Pong {
        ping_timestamp: String,
        pong_timestamp: String,
    },

    // =========================================================================
    // Error Messages
    // =========================================================================
    /// Error message.
    Error { code: String, message: String },
}

// =============================================================================
// Handshake Payloads
// =============================================================================

/// Hello message sent by a terminal on connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloPayload {
    /// Terminal identifier.
    pub terminal_id: String,

    /// Terminal name (human-readable).
    pub terminal_name: String,

    /// Branch this terminal belongs to.
    pub branch_id: String,

    /// Protocol version supported by this terminal.
    pub protocol_version: u32,
}

/// Welcome message sent by the hub after a successful handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    /// Hub identifier.
    pub hub_id: String,

    /// Server time for clock reference.
    pub server_time: String,
}

// =============================================================================
// Helper Functions
// =============================================================================

impl SyncMessage {
    /// Returns the message type name as a string (for logging).
    pub fn type_name(&self) -> &'static str {
        match self {
            SyncMessage::Hello(_) => "Hello",
            SyncMessage::Welcome(_) => "Welcome",
            SyncMessage::Push(_) => "Push",
            SyncMessage::Ping { .. } => "Ping",
            SyncMessage::Pong { .. } => "Pong",
            SyncMessage::Error { .. } => "Error",
        }
    }

    /// Creates a Hello message.
    pub fn hello(terminal_id: &str, terminal_name: &str, branch_id: &str) -> Self {
        SyncMessage::Hello(HelloPayload {
            terminal_id: terminal_id.to_string(),
            terminal_name: terminal_name.to_string(),
            branch_id: branch_id.to_string(),
            protocol_version: PROTOCOL_VERSION,
        })
    }

    /// Creates a Welcome message.
    pub fn welcome(hub_id: &str) -> Self {
        SyncMessage::Welcome(WelcomePayload {
            hub_id: hub_id.to_string(),
            server_time: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Creates a Ping message.
    pub fn ping() -> Self {
        SyncMessage::Ping {
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Creates a Pong message.
    pub fn pong(ping_timestamp: &str) -> Self {
        SyncMessage::Pong {
            ping_timestamp: ping_timestamp.to_string(),
            pong_timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Creates an Error message.
    pub fn error(code: &str, message: &str) -> Self {
        SyncMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Serializes to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
