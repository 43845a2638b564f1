//! RepLog Configuration
//!
//! This module provides configuration structures for the RepLog
//! transaction log streaming server.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main RepLog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplogConfig {
    /// Node-specific configuration
    pub node: NodeConfig,

    /// Streaming server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier, reported in logs and session names
    pub id: String,
}

/// Streaming server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind for replica connections
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Handshake timeout in milliseconds (0 = no timeout)
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Bounded wait for a session task to exit on stop, in seconds
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:2112".to_string()
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_stop_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ReplogConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: ReplogConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.node.id.is_empty() {
            return Err(crate::Error::Config("node.id cannot be empty".into()));
        }

        if self.server.bind_address.is_empty() {
            return Err(crate::Error::Config(
                "server.bind_address cannot be empty".into(),
            ));
        }

        if self.server.stop_timeout_secs == 0 {
            return Err(crate::Error::Config(
                "server.stop_timeout_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Get the handshake timeout as Duration, None when disabled
    pub fn handshake_timeout(&self) -> Option<Duration> {
        if self.server.handshake_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.server.handshake_timeout_ms))
        }
    }

    /// Get the session stop timeout as Duration
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.server.stop_timeout_secs)
    }
}
