//! Session configuration.
//!
//! Configuration is loaded from a TOML file or built in code:
//!
//! ```toml
//! address = "ws://localhost:8000/api/v1/documents/sync/abc/"
//! command_buffer = 64
//! event_buffer = 64
//!
//! [reconnect]
//! initial_delay_ms = 1000
//! max_delay_ms = 30000
//! jitter_ms = 1000
//! connect_timeout_secs = 10
//! ```

use docsync_core::Backoff;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transport::WebSocketConfig;

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Address of the document's sync endpoint.
    pub address: String,
    /// Depth of the local command queue (default: 64).
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
    /// Capacity of the session event broadcast (default: 64).
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Reconnection policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Reconnection policy of the WebSocket transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt (default: 1000).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Cap on the exponential backoff (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Upper bound of random jitter added to each delay (default: 1000).
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    /// Timeout for a single connection attempt (default: 10).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

// Default value functions
fn default_command_buffer() -> usize {
    64
}

fn default_event_buffer() -> usize {
    64
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_ms() -> u64 {
    1000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ReconnectConfig {
    /// Backoff policy described by this configuration.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            initial: Duration::from_millis(self.initial_delay_ms),
            max: Duration::from_millis(self.max_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

impl From<&ReconnectConfig> for WebSocketConfig {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            backoff: config.backoff(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }
}

impl SessionConfig {
    /// Create a configuration for `address` with default settings.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            command_buffer: default_command_buffer(),
            event_buffer: default_event_buffer(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Set the local command queue depth.
    pub fn with_command_buffer(mut self, size: usize) -> Self {
        self.command_buffer = size;
        self
    }

    /// Set the session event broadcast capacity.
    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }

    /// Set the reconnection policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Settings for a [`WebSocketTransport`](crate::WebSocketTransport).
    pub fn websocket(&self) -> WebSocketConfig {
        WebSocketConfig::from(&self.reconnect)
    }

    /// Load configuration from a TOML file and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::Invalid("address must not be empty".into()));
        }
        if self.command_buffer == 0 {
            return Err(ConfigError::Invalid("command_buffer must be at least 1".into()));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("event_buffer must be at least 1".into()));
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "reconnect.initial_delay_ms ({}) exceeds reconnect.max_delay_ms ({})",
                self.reconnect.initial_delay_ms, self.reconnect.max_delay_ms
            )));
        }
        if self.reconnect.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "reconnect.connect_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Configuration values are inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}
