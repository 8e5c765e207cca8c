//! WebSocket transport with automatic reconnection.
//!
//! A background task owns the socket. Its lifecycle is decided by the pure
//! [`LinkState`] machine from `docsync-core`; this module only performs the
//! actions it asks for (open the socket, wait out the backoff, report
//! open/close) and pumps bytes between the socket and two channels.
//!
//! Each binary WebSocket message is one frame. Text messages are ignored.
//! Outbound messages are only accepted while the socket is open; anything
//! still queued when a new socket opens is discarded, so nothing is replayed
//! after a reconnect.

use super::{Transport, TransportError, TransportEvent};
use async_trait::async_trait;
use docsync_core::{Backoff, LinkAction, LinkEvent, LinkState};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reconnection settings for [`WebSocketTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebSocketConfig {
    /// Delay policy between reconnection attempts.
    pub backoff: Backoff,
    /// Give up on a single connection attempt after this long.
    pub connect_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            backoff: Backoff::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Transport over a reconnecting WebSocket client.
///
/// `connect()` validates the address and starts the background task; the
/// socket itself opens asynchronously and is reported through `recv()` as
/// [`TransportEvent::Opened`]. Every later reconnect reports `Opened` again.
pub struct WebSocketTransport {
    config: WebSocketConfig,
    connected: Arc<AtomicBool>,
    link: Mutex<Option<LinkHandle>>,
    events: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

/// Handles into a running link task.
struct LinkHandle {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Create a transport with default reconnection settings.
    pub fn new() -> Self {
        Self::with_config(WebSocketConfig::default())
    }

    /// Create a transport with the given reconnection settings.
    pub fn with_config(config: WebSocketConfig) -> Self {
        Self {
            config,
            connected: Arc::new(AtomicBool::new(false)),
            link: Mutex::new(None),
            events: tokio::sync::Mutex::new(None),
        }
    }

    /// The reconnection settings in use.
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Check that an address is a WebSocket URL.
fn validate_address(address: &str) -> Result<(), TransportError> {
    let rest = address
        .strip_prefix("ws://")
        .or_else(|| address.strip_prefix("wss://"))
        .ok_or_else(|| {
            TransportError::ConnectionFailed(format!(
                "unsupported address (expected ws:// or wss://): {}",
                address
            ))
        })?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(TransportError::ConnectionFailed(format!(
            "address has no host: {}",
            address
        )));
    }
    Ok(())
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        validate_address(address)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        {
            let mut link = self.link.lock().unwrap();
            if link.is_some() {
                return Err(TransportError::ConnectionFailed(
                    "transport already started".to_string(),
                ));
            }

            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            let (shutdown_tx, shutdown_rx) = watch::channel(false);

            let task = tokio::spawn(run_link(
                address.to_string(),
                self.config,
                Arc::clone(&self.connected),
                outbound_rx,
                events_tx,
                shutdown_rx,
            ));

            *link = Some(LinkHandle {
                outbound: outbound_tx,
                shutdown: shutdown_tx,
                task,
            });
        }

        *self.events.lock().await = Some(events_rx);
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let link = self.link.lock().unwrap();
        let link = link.as_ref().ok_or(TransportError::NotConnected)?;
        link.outbound
            .send(data.to_vec())
            .map_err(|_| TransportError::SendFailed("link task stopped".to_string()))
    }

    async fn recv(&self) -> Result<TransportEvent, TransportError> {
        let mut events = self.events.lock().await;
        let events = events.as_mut().ok_or(TransportError::NotConnected)?;
        events.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        let link = self.link.lock().unwrap().take();
        self.connected.store(false, Ordering::SeqCst);

        if let Some(link) = link {
            let _ = link.shutdown.send(true);
            if let Err(e) = link.task.await {
                tracing::error!("WebSocket link task failed: {}", e);
            }
        }
        Ok(())
    }
}

/// How a pump over an open socket ended.
enum PumpEnd {
    /// Owner asked to close.
    Shutdown,
    /// The socket was lost.
    Lost(String),
}

/// Drive one auto-reconnecting link until it is closed.
async fn run_link(
    address: String,
    config: WebSocketConfig,
    connected: Arc<AtomicBool>,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut state = LinkState::new();
    let mut event = LinkEvent::ConnectRequested;
    let mut socket: Option<WsStream> = None;
    let mut close_reason = String::new();

    loop {
        let (next, actions) = state.on_event(event);
        state = next;

        let mut follow_up = None;
        for action in actions {
            match action {
                LinkAction::Connect => {
                    follow_up = Some(tokio::select! {
                        _ = shutdown.changed() => LinkEvent::CloseRequested,
                        result = open_socket(&address, config.connect_timeout) => match result {
                            Ok(ws) => {
                                socket = Some(ws);
                                LinkEvent::ConnectSucceeded
                            }
                            Err(e) => {
                                tracing::debug!("Connect to {} failed: {}", address, e);
                                LinkEvent::ConnectFailed
                            }
                        },
                    });
                }
                LinkAction::Disconnect => {
                    if let Some(mut ws) = socket.take() {
                        if let Err(e) = ws.close(None).await {
                            tracing::debug!("WebSocket close failed: {}", e);
                        }
                    }
                    connected.store(false, Ordering::SeqCst);
                }
                LinkAction::EmitOpened => {
                    // Nothing sent while the link was down is replayed
                    while outbound.try_recv().is_ok() {}
                    connected.store(true, Ordering::SeqCst);
                    tracing::debug!("WebSocket open: {}", address);
                    let _ = events.send(TransportEvent::Opened);
                }
                LinkAction::EmitClosed => {
                    connected.store(false, Ordering::SeqCst);
                    let reason = std::mem::take(&mut close_reason);
                    let _ = events.send(TransportEvent::Closed { reason });
                }
                LinkAction::StartReconnectTimer { attempt } => {
                    let delay = config.backoff.delay(attempt);
                    tracing::debug!(
                        "Reconnecting to {} in {:?} (attempt {})",
                        address,
                        delay,
                        attempt
                    );
                    follow_up = Some(tokio::select! {
                        _ = shutdown.changed() => LinkEvent::CloseRequested,
                        _ = tokio::time::sleep(delay) => LinkEvent::ReconnectTimer,
                    });
                }
                LinkAction::CancelReconnect => {}
            }
        }

        if let Some(next_event) = follow_up {
            event = next_event;
            continue;
        }

        match (&state, socket.as_mut()) {
            (LinkState::Connected, Some(ws)) => {
                event = match pump(ws, &mut outbound, &events, &mut shutdown).await {
                    PumpEnd::Shutdown => LinkEvent::CloseRequested,
                    PumpEnd::Lost(reason) => {
                        tracing::debug!("WebSocket lost: {}", reason);
                        socket = None;
                        connected.store(false, Ordering::SeqCst);
                        close_reason = reason;
                        LinkEvent::Dropped
                    }
                };
            }
            (LinkState::Disconnected, _) => break,
            (state, _) => {
                tracing::error!("WebSocket link stalled in state {:?}", state);
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

/// Open one socket, bounded by `timeout`.
async fn open_socket(address: &str, timeout: Duration) -> Result<WsStream, TransportError> {
    match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(address)).await {
        Ok(Ok((ws, _response))) => Ok(ws),
        Ok(Err(e)) => Err(TransportError::ConnectionFailed(e.to_string())),
        Err(_) => Err(TransportError::Timeout),
    }
}

/// Move bytes between an open socket and the transport's channels.
async fn pump(
    ws: &mut WsStream,
    outbound: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    events: &mpsc::UnboundedSender<TransportEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpEnd {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return PumpEnd::Shutdown,
            Some(data) = outbound.recv() => {
                if let Err(e) = ws.send(WsMessage::Binary(data)).await {
                    return PumpEnd::Lost(e.to_string());
                }
            }
            incoming = ws.next() => match incoming {
                Some(Ok(WsMessage::Binary(data))) => {
                    let _ = events.send(TransportEvent::Message(data));
                }
                Some(Ok(WsMessage::Text(text))) => {
                    tracing::debug!("Ignoring text message ({} bytes)", text.len());
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    return PumpEnd::Lost(reason);
                }
                // Ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => return PumpEnd::Lost(e.to_string()),
                None => return PumpEnd::Lost("stream ended".to_string()),
            },
        }
    }
}
