//! Transport abstraction for docsync.
//!
//! This module provides a pluggable transport layer that abstracts the
//! duplex channel to the sync server (WebSocket, mock for testing).
//!
//! # Design
//!
//! A transport is message-oriented and reconnects on its own:
//! - `connect()` starts the channel to an address
//! - `send()` transmits one wire message (one frame)
//! - `recv()` yields the next [`TransportEvent`]: a message, or the
//!   underlying socket opening or closing
//! - `close()` terminates for good
//!
//! Every reconnect surfaces as a new [`TransportEvent::Opened`], so the
//! owner can re-bind its state to the fresh socket.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.connect("ws://localhost:8000/sync/doc").await?;
//! transport.send(&frame_bytes).await?;
//! let event = transport.recv().await?;
//! ```

mod mock;
mod websocket;

pub use mock::MockTransport;
pub use websocket::{WebSocketConfig, WebSocketTransport};

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

/// Something that happened on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A socket opened (first connect or a reconnect).
    Opened,
    /// One wire message arrived.
    Message(Vec<u8>),
    /// The socket went down; the transport may reconnect.
    Closed {
        /// Why the socket closed.
        reason: String,
    },
}

/// Transport trait for exchanging wire messages with the sync server.
///
/// Implementations handle the underlying connection mechanism
/// (WebSocket, mock, etc) including reconnection.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Start the channel to the server at `address`.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Send one wire message.
    ///
    /// Fails with [`TransportError::NotConnected`] while no socket is open.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Wait for the next channel event.
    ///
    /// Returns an error once the transport is closed for good.
    async fn recv(&self) -> Result<TransportEvent, TransportError>;

    /// Check if a socket is currently open.
    fn is_connected(&self) -> bool;

    /// Close the channel and stop reconnecting.
    async fn close(&self) -> Result<(), TransportError>;
}
