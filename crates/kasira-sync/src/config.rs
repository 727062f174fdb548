//! # Sync Configuration
//!
//! TOML configuration for the synchronization channel.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KASIRA_TERMINAL_ID=term-123                                        │
//! │     KASIRA_HUB_URL=ws://192.168.1.10:8765/ws                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/kasira/sync.toml (Linux)                                 │
//! │     ~/Library/Application Support/id.kasira.kasira/sync.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     auto-generated terminal id, backoff defaults                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [terminal]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Kasir 1"
//!
//! [branch]
//! id = "cabang-pusat"
//! name = "Toko Pusat"
//!
//! [channel]
//! hub_url = "ws://192.168.1.10:8765/ws"
//! connect_timeout_secs = 10
//! initial_backoff_ms = 500
//! max_backoff_secs = 60
//! ping_interval_secs = 30
//! pong_timeout_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::hub::DEFAULT_HUB_PORT;
use crate::transport::TransportConfig;

// =============================================================================
// Terminal Configuration
// =============================================================================

/// Configuration for this terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Unique terminal identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable terminal name (e.g., "Kasir 1").
    #[serde(default = "default_terminal_name")]
    pub name: String,
}

fn default_terminal_name() -> String {
    "Kasir Terminal".to_string()
}

impl Default for TerminalConfig {
    fn default() -> Self {
        TerminalConfig {
            id: Uuid::new_v4().to_string(),
            name: default_terminal_name(),
        }
    }
}

// =============================================================================
// Branch Configuration
// =============================================================================

/// Configuration for the branch (cabang) this terminal belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Unique branch identifier.
    pub id: String,

    /// Human-readable branch name.
    #[serde(default)]
    pub name: String,
}

impl Default for BranchConfig {
    fn default() -> Self {
        BranchConfig {
            id: "cabang-pusat".to_string(),
            name: "Toko Pusat".to_string(),
        }
    }
}

// =============================================================================
// Channel Settings
// =============================================================================

/// Channel behavior settings (connection + keepalive tunables).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// WebSocket URL of the sync hub.
    #[serde(default)]
    pub hub_url: Option<String>,

    /// Connection timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum reconnection attempts before giving up.
    /// Set to 0 for infinite retries.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff duration (milliseconds) for reconnection.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration (seconds) for reconnection.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Keepalive ping interval (seconds).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Pong timeout (seconds) before the channel counts as stalled.
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    0 // Infinite
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}
fn default_ping_interval() -> u64 {
    30
}
fn default_pong_timeout() -> u64 {
    10
}

impl Default for ChannelSettings {
    fn default() -> Self {
        ChannelSettings {
            hub_url: None,
            connect_timeout_secs: default_connect_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            ping_interval_secs: default_ping_interval(),
            pong_timeout_secs: default_pong_timeout(),
        }
    }
}

// =============================================================================
// Hub Server Settings
// =============================================================================

/// Settings for running the hub server (ledger side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    /// Port for the WebSocket server.
    #[serde(default = "default_hub_port")]
    pub port: u16,

    /// Bind address (default: 0.0.0.0 for all interfaces).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_hub_port() -> u16 {
    DEFAULT_HUB_PORT
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

impl Default for HubSettings {
    fn default() -> Self {
        HubSettings {
            port: default_hub_port(),
            bind_addr: default_bind_addr(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Terminal-specific configuration.
    #[serde(default)]
    pub terminal: TerminalConfig,

    /// Branch configuration.
    #[serde(default)]
    pub branch: BranchConfig,

    /// Channel behavior settings.
    #[serde(default)]
    pub channel: ChannelSettings,

    /// Hub server settings.
    #[serde(default)]
    pub hub: HubSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated terminal ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.terminal.id.is_empty() {
            return Err(SyncError::MissingTerminalId);
        }
        if self.branch.id.is_empty() {
            return Err(SyncError::InvalidConfig("branch id must be set".into()));
        }

        if let Some(ref url) = self.channel.hub_url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(SyncError::InvalidUrl(format!(
                    "Hub URL must start with ws:// or wss://, got: {}",
                    url
                )));
            }
        }

        if self.channel.pong_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "pong_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("KASIRA_TERMINAL_ID") {
            debug!(terminal_id = %id, "Overriding terminal ID from environment");
            self.terminal.id = id;
        }

        if let Ok(name) = std::env::var("KASIRA_TERMINAL_NAME") {
            self.terminal.name = name;
        }

        if let Ok(id) = std::env::var("KASIRA_BRANCH_ID") {
            self.branch.id = id;
        }

        if let Ok(url) = std::env::var("KASIRA_HUB_URL") {
            debug!(url = %url, "Overriding hub URL from environment");
            self.channel.hub_url = Some(url);
        }

        if let Ok(port) = std::env::var("KASIRA_HUB_PORT") {
            if let Ok(p) = port.parse::<u16>() {
                debug!(port = p, "Overriding hub port from environment");
                self.hub.port = p;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("id", "kasira", "kasira").map(|dirs| {
            let config_dir = dirs.config_dir();
            config_dir.join("sync.toml")
        })
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the terminal ID.
    pub fn terminal_id(&self) -> &str {
        &self.terminal.id
    }

    /// Returns the branch ID.
    pub fn branch_id(&self) -> &str {
        &self.branch.id
    }

    /// Returns the hub URL if configured.
    pub fn hub_url(&self) -> Option<&str> {
        self.channel.hub_url.as_deref()
    }

    /// Builds the transport configuration from the channel settings.
    pub fn transport_config(&self) -> SyncResult<TransportConfig> {
        let url = self
            .channel
            .hub_url
            .clone()
            .ok_or_else(|| SyncError::InvalidConfig("hub_url is not configured".into()))?;
        Ok(TransportConfig {
            url,
            connect_timeout: Duration::from_secs(self.channel.connect_timeout_secs),
            initial_backoff: Duration::from_millis(self.channel.initial_backoff_ms),
            max_backoff: Duration::from_secs(self.channel.max_backoff_secs),
            max_retries: self.channel.max_retries,
            ping_interval: Duration::from_secs(self.channel.ping_interval_secs),
            pong_timeout: Duration::from_secs(self.channel.pong_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.terminal.id.is_empty()); // Auto-generated
        assert_eq!(config.channel.ping_interval_secs, 30);
        assert_eq!(config.hub.port, DEFAULT_HUB_PORT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();
        assert!(config.validate().is_ok());

        // Empty terminal ID should fail
        config.terminal.id = String::new();
        assert!(config.validate().is_err());

        // Invalid URL should fail
        config.terminal.id = "test".to_string();
        config.channel.hub_url = Some("http://invalid".to_string());
        assert!(config.validate().is_err());

        // Valid WebSocket URL should pass
        config.channel.hub_url = Some("ws://localhost:8765/ws".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[terminal]"));
        assert!(toml_str.contains("[channel]"));

        let back: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.terminal.id, config.terminal.id);
    }

    #[test]
    fn test_transport_config_requires_hub_url() {
        let mut config = SyncConfig::default();
        assert!(config.transport_config().is_err());

        config.channel.hub_url = Some("ws://localhost:8765/ws".to_string());
        let transport = config.transport_config().unwrap();
        assert_eq!(transport.ping_interval, Duration::from_secs(30));
        assert_eq!(transport.pong_timeout, Duration::from_secs(10));
    }
}
