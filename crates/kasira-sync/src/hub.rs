//! # Sync Hub Server
//!
//! The WebSocket fan-out server running alongside the ledger. Terminals
//! connect, handshake, and then receive every push event the ledger emits.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Hub Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      HubServer (Axum)                           │   │
//! │  │                                                                 │   │
//! │  │  /ws endpoint ──▶ WebSocket upgrade                            │   │
//! │  │                        │                                        │   │
//! │  │                        ▼                                        │   │
//! │  │          Hello ──validate──▶ Welcome ──▶ subscribe broadcast    │   │
//! │  │                                                                 │   │
//! │  │  StockLedger broadcast ──forward_ledger_events──▶ broadcast_tx  │   │
//! │  │         │                                                       │   │
//! │  │         ▼ fan-out (at-least-once, unordered across keys)        │   │
//! │  │  ┌──────────┐  ┌──────────┐  ┌──────────┐                      │   │
//! │  │  │ kasir 1  │  │ kasir 2  │  │ kasir 3  │   Connected          │   │
//! │  │  └──────────┘  └──────────┘  └──────────┘   terminals          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Lagged subscribers are logged and continue from the latest events;    │
//! │  the channel is not a durable log, recovery is a full refetch.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use kasira_core::PushEvent;

use crate::error::{SyncError, SyncResult};
use crate::protocol::{HelloPayload, SyncMessage, PROTOCOL_VERSION};

// =============================================================================
// Constants
// =============================================================================

/// Default WebSocket port for the hub server.
pub const DEFAULT_HUB_PORT: u16 = 8765;

/// Ping interval to keep connections alive.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum message size (1MB).
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

// =============================================================================
// Hub Configuration
// =============================================================================

/// Configuration for the hub server.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Hub identifier sent in Welcome messages.
    pub hub_id: String,
    /// Port to listen on.
    pub port: u16,
    /// Bind address (default: 0.0.0.0).
    pub bind_addr: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            hub_id: "kasira-hub".to_string(),
            port: DEFAULT_HUB_PORT,
            bind_addr: "0.0.0.0".to_string(),
        }
    }
}

impl HubConfig {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Connected Terminal
// =============================================================================

/// Represents a connected terminal.
#[derive(Debug, Clone)]
pub struct ConnectedTerminal {
    pub terminal_id: String,
    pub terminal_name: String,
    pub branch_id: String,
    pub addr: SocketAddr,
    pub connected_at: std::time::Instant,
}

// =============================================================================
// Hub State
// =============================================================================

/// Shared state for the hub server.
pub struct HubState {
    hub_id: String,
    /// Connected terminals by terminal id.
    clients: RwLock<HashMap<String, ConnectedTerminal>>,
    /// Broadcast channel for fanning messages out to all terminals.
    broadcast_tx: broadcast::Sender<SyncMessage>,
}

impl HubState {
    fn new(hub_id: String) -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);
        HubState {
            hub_id,
            clients: RwLock::new(HashMap::new()),
            broadcast_tx,
        }
    }

    /// Broadcasts a message to all connected terminals.
    pub fn broadcast(&self, msg: SyncMessage) {
        let _ = self.broadcast_tx.send(msg);
    }

    /// Returns the number of connected terminals.
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Returns a list of connected terminal IDs.
    pub async fn client_ids(&self) -> Vec<String> {
        self.clients.read().await.keys().cloned().collect()
    }
}

// =============================================================================
// Hub Server
// =============================================================================

/// The hub server that manages terminal WebSocket connections.
pub struct HubServer {
    config: HubConfig,
    state: Arc<HubState>,
}

/// Handle for controlling the hub server.
#[derive(Clone)]
pub struct HubHandle {
    state: Arc<HubState>,
    shutdown_tx: mpsc::Sender<()>,
}

impl HubHandle {
    /// Fans a push event out to every connected terminal.
    pub fn broadcast_event(&self, event: PushEvent) {
        self.state.broadcast(SyncMessage::Push(event));
    }

    /// Returns the number of connected terminals.
    pub async fn client_count(&self) -> usize {
        self.state.client_count().await
    }

    /// Returns a list of connected terminal IDs.
    pub async fn client_ids(&self) -> Vec<String> {
        self.state.client_ids().await
    }

    /// Shuts down the hub server.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Hub shutdown channel closed".into()))
    }
}

impl HubServer {
    pub fn new(config: HubConfig) -> Self {
        let state = Arc::new(HubState::new(config.hub_id.clone()));
        HubServer { config, state }
    }

    /// Starts the hub server and returns a handle.
    pub async fn start(self) -> SyncResult<HubHandle> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = HubHandle {
            state: self.state.clone(),
            shutdown_tx,
        };

        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .with_state(self.state.clone());

        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            SyncError::ConnectionFailed(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        info!(addr = %bind_addr, "Hub server started");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                shutdown_rx.recv().await;
                info!("Hub server shutting down");
            })
            .await
            .ok();
        });

        Ok(handle)
    }
}

/// Forwards the ledger's push-event feed into the hub's fan-out channel.
/// Runs until the feed closes; a lagged receiver logs and continues from
/// the latest events.
pub fn forward_ledger_events(handle: HubHandle, mut feed: broadcast::Receiver<PushEvent>) {
    tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(event) => handle.broadcast_event(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Ledger event feed lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Ledger event feed closed");
                    break;
                }
            }
        }
    });
}

// =============================================================================
// WebSocket Handler
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    "OK"
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<HubState>>,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    info!(addr = %addr, "New WebSocket connection");
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Handles a terminal WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<HubState>, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();

    // Wait for the Hello message
    let hello = match receive_hello(&mut receiver).await {
        Ok(hello) => hello,
        Err(e) => {
            warn!(addr = %addr, ?e, "Failed to receive Hello - closing connection");
            return;
        }
    };

    let terminal_id = hello.terminal_id.clone();

    if hello.protocol_version != PROTOCOL_VERSION {
        warn!(
            terminal_id = %terminal_id,
            version = hello.protocol_version,
            "Protocol version mismatch - rejecting connection"
        );
        let reject = SyncMessage::error("VERSION_MISMATCH", "Unsupported protocol version");
        let _ = send_message(&mut sender, &reject).await;
        return;
    }
    if terminal_id.is_empty() || hello.branch_id.is_empty() {
        let reject = SyncMessage::error("INVALID_HELLO", "Terminal and branch IDs are required");
        let _ = send_message(&mut sender, &reject).await;
        return;
    }

    info!(
        terminal_id = %terminal_id,
        branch_id = %hello.branch_id,
        addr = %addr,
        "Terminal connected"
    );

    // Register the terminal
    {
        let mut clients = state.clients.write().await;
        clients.insert(
            terminal_id.clone(),
            ConnectedTerminal {
                terminal_id: terminal_id.clone(),
                terminal_name: hello.terminal_name.clone(),
                branch_id: hello.branch_id.clone(),
                addr,
                connected_at: std::time::Instant::now(),
            },
        );
    }

    // Send Welcome
    let welcome = SyncMessage::welcome(&state.hub_id);
    if let Err(e) = send_message(&mut sender, &welcome).await {
        warn!(terminal_id = %terminal_id, ?e, "Failed to send Welcome");
        remove_client(&state, &terminal_id).await;
        return;
    }

    // Subscribe to broadcasts
    let mut broadcast_rx = state.broadcast_tx.subscribe();
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(64);

    // Outgoing message task
    let outgoing_handle = tokio::spawn(async move {
        while let Some(msg) = outgoing_rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Broadcast forwarding task
    let forward_terminal_id = terminal_id.clone();
    let outgoing_tx_clone = outgoing_tx.clone();
    let broadcast_handle = tokio::spawn(async move {
        loop {
            match broadcast_rx.recv().await {
                Ok(msg) => {
                    if let Ok(json) = msg.to_json() {
                        if outgoing_tx_clone
                            .send(Message::Text(json.into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(terminal_id = %forward_terminal_id, skipped, "Broadcast receiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Ping task
    let outgoing_tx_ping = outgoing_tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_interval = interval(PING_INTERVAL);
        loop {
            ping_interval.tick().await;
            if outgoing_tx_ping
                .send(Message::Ping(axum::body::Bytes::new()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // Main receive loop
    loop {
        match receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => match SyncMessage::from_json(&text) {
                    Ok(SyncMessage::Ping { timestamp }) => {
                        let pong = SyncMessage::pong(&timestamp);
                        if let Ok(json) = pong.to_json() {
                            let _ = outgoing_tx.send(Message::Text(json.into())).await;
                        }
                    }
                    Ok(SyncMessage::Pong { .. }) => {
                        // connection alive
                    }
                    Ok(other) => {
                        debug!(
                            terminal_id = %terminal_id,
                            msg_type = %other.type_name(),
                            "Ignoring unexpected message from terminal"
                        );
                    }
                    Err(e) => {
                        debug!(terminal_id = %terminal_id, ?e, "Invalid message format");
                    }
                },
                Message::Ping(data) => {
                    let _ = outgoing_tx.send(Message::Pong(data)).await;
                }
                Message::Pong(_) => {}
                Message::Close(_) => {
                    info!(terminal_id = %terminal_id, "Terminal requested close");
                    break;
                }
                Message::Binary(_) => {
                    debug!(terminal_id = %terminal_id, "Ignoring binary message");
                }
            },
            Some(Err(e)) => {
                warn!(terminal_id = %terminal_id, ?e, "WebSocket error");
                break;
            }
            None => {
                info!(terminal_id = %terminal_id, "Terminal disconnected");
                break;
            }
        }
    }

    // Cleanup
    broadcast_handle.abort();
    ping_handle.abort();
    outgoing_handle.abort();
    remove_client(&state, &terminal_id).await;
}

/// Waits for and parses the Hello message from a fresh connection.
async fn receive_hello(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
) -> SyncResult<HelloPayload> {
    match receiver.next().await {
        Some(Ok(Message::Text(text))) => match SyncMessage::from_json(&text)? {
            SyncMessage::Hello(payload) => Ok(payload),
            other => Err(SyncError::InvalidMessage(format!(
                "Expected Hello, got {}",
                other.type_name()
            ))),
        },
        Some(Ok(_)) => Err(SyncError::InvalidMessage(
            "Expected text Hello message".into(),
        )),
        Some(Err(e)) => Err(SyncError::WebSocketError(e.to_string())),
        None => Err(SyncError::Disconnected),
    }
}

/// Sends a message over the raw socket half.
async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &SyncMessage,
) -> SyncResult<()> {
    let json = msg.to_json()?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| SyncError::WebSocketError(e.to_string()))
}

/// Removes a terminal from the registry.
async fn remove_client(state: &Arc<HubState>, terminal_id: &str) {
    let mut clients = state.clients.write().await;
    if clients.remove(terminal_id).is_some() {
        info!(terminal_id = %terminal_id, remaining = clients.len(), "Terminal unregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_config_bind_address() {
        let config = HubConfig {
            hub_id: "hub-1".into(),
            port: 9000,
            bind_addr: "127.0.0.1".into(),
        };
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_hub_state_tracks_clients() {
        let state = HubState::new("hub-1".into());
        assert_eq!(state.client_count().await, 0);

        state.clients.write().await.insert(
            "term-1".into(),
            ConnectedTerminal {
                terminal_id: "term-1".into(),
                terminal_name: "Kasir 1".into(),
                branch_id: "b1".into(),
                addr: "127.0.0.1:5000".parse().unwrap(),
                connected_at: std::time::Instant::now(),
            },
        );
        assert_eq!(state.client_count().await, 1);
        assert_eq!(state.client_ids().await, vec!["term-1".to_string()]);
    }
}
