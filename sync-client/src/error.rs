//! Client errors.

use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The engine rejected a local edit.
    #[error("edit failed: {0}")]
    Edit(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The session has been torn down.
    #[error("session closed")]
    SessionClosed,
}
