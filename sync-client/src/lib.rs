//! # sync-client
//!
//! Client library for docsync real-time document synchronization.
//!
//! This is the crate applications use to keep a CRDT document in sync with
//! a server over a reconnecting connection.
//!
//! ## Features
//!
//! - **Single-actor session**: one task owns the document and the connection
//! - **Echo suppression**: our own changes coming back are never re-applied
//! - **Transport Abstraction**: Pluggable transport layer (WebSocket, mock)
//! - **Pure State Machines**: Uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use docsync_client::{Session, SessionConfig, WebSocketTransport};
//! use docsync_core::TranscriptEngine;
//!
//! let config = SessionConfig::new("ws://localhost:8000/api/v1/documents/sync/abc/");
//! let transport = WebSocketTransport::with_config(config.websocket());
//! let session = Session::start(config, Arc::new(TranscriptEngine::new()), transport, || {}).await?;
//!
//! let mut editor = session.editor();
//! editor.wait_synced().await?;
//! println!("{}", editor.document().transcript().text());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod editor;
pub mod error;
pub mod session;
pub mod transport;

pub use config::{ConfigError, ReconnectConfig, SessionConfig};
pub use editor::EditorHandle;
pub use error::ClientError;
pub use session::{Session, SessionEvent};
pub use transport::{
    MockTransport, Transport, TransportError, TransportEvent, WebSocketConfig,
    WebSocketTransport,
};
