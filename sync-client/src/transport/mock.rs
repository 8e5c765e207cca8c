//! Mock transport for testing.
//!
//! Allows scripting inbound events and capturing sent messages for
//! verification.

use super::{Transport, TransportError, TransportEvent};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// Mock transport for testing.
///
/// Inbound events are queued with [`MockTransport::queue_frame`] and friends
/// and handed out by `recv()` in order; `recv()` waits while the queue is
/// empty. Clones share all state.
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    inbound_tx: mpsc::UnboundedSender<TransportEvent>,
    inbound_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<TransportEvent>>>,
    closed: Arc<watch::Sender<bool>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_address: Option<String>,
    sent_messages: Vec<Vec<u8>>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(Mutex::new(MockTransportInner::default())),
            inbound_tx,
            inbound_rx: Arc::new(tokio::sync::Mutex::new(inbound_rx)),
            closed: Arc::new(closed),
        }
    }

    /// Queue an event to be returned by a later `recv()` call.
    pub fn queue_event(&self, event: TransportEvent) {
        // The receiver lives as long as self, so this cannot fail
        let _ = self.inbound_tx.send(event);
    }

    /// Queue one inbound wire message.
    pub fn queue_frame(&self, data: Vec<u8>) {
        self.queue_event(TransportEvent::Message(data));
    }

    /// Simulate the server dropping the socket.
    pub fn simulate_drop(&self, reason: &str) {
        self.inner.lock().unwrap().connected = false;
        self.queue_event(TransportEvent::Closed {
            reason: reason.to_string(),
        });
    }

    /// Simulate the socket coming back after a drop.
    pub fn simulate_reconnect(&self) {
        self.inner.lock().unwrap().connected = true;
        self.queue_event(TransportEvent::Opened);
    }

    /// Get all messages that were sent.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.clone()
    }

    /// Get the last message that was sent.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.last().cloned()
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.connected_address.clone()
    }

    /// Check if `close()` has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        {
            let mut inner = self.inner.lock().unwrap();

            // Check for forced failure
            if let Some(error) = inner.fail_next_connect.take() {
                return Err(TransportError::ConnectionFailed(error));
            }

            inner.connected = true;
            inner.connected_address = Some(address.to_string());
        }
        self.closed.send_replace(false);
        self.queue_event(TransportEvent::Opened);
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_messages.push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<TransportEvent, TransportError> {
        if self.inner.lock().unwrap().connected_address.is_none() {
            return Err(TransportError::NotConnected);
        }

        // close() wakes a pending recv
        let mut closed = self.closed.subscribe();
        let mut inbound = self.inbound_rx.lock().await;
        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => Err(TransportError::ConnectionClosed),
            event = inbound.recv() => event.ok_or(TransportError::ConnectionClosed),
        }
    }

    fn is_connected(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.lock().unwrap().connected = false;
        self.closed.send_replace(true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===========================================
    // MockTransport Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_connects_and_reports_opened() {
        let transport = MockTransport::new();
        assert!(!transport.is_connected());

        transport.connect("ws://test/doc").await.unwrap();

        assert!(transport.is_connected());
        assert_eq!(
            transport.connected_address(),
            Some("ws://test/doc".to_string())
        );
        assert_eq!(transport.recv().await.unwrap(), TransportEvent::Opened);
    }

    #[tokio::test]
    async fn mock_transport_sends_messages() {
        let transport = MockTransport::new();
        transport.connect("node").await.unwrap();

        transport.send(b"message 1").await.unwrap();
        transport.send(b"message 2").await.unwrap();

        let sent = transport.sent_messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], b"message 1");
        assert_eq!(sent[1], b"message 2");
        assert_eq!(transport.last_sent(), Some(b"message 2".to_vec()));
    }

    #[tokio::test]
    async fn mock_transport_receives_queued_frames_in_order() {
        let transport = MockTransport::new();
        transport.connect("node").await.unwrap();

        transport.queue_frame(b"response 1".to_vec());
        transport.queue_frame(b"response 2".to_vec());

        assert_eq!(transport.recv().await.unwrap(), TransportEvent::Opened);
        assert_eq!(
            transport.recv().await.unwrap(),
            TransportEvent::Message(b"response 1".to_vec())
        );
        assert_eq!(
            transport.recv().await.unwrap(),
            TransportEvent::Message(b"response 2".to_vec())
        );
    }

    #[tokio::test]
    async fn recv_waits_for_events() {
        let transport = MockTransport::new();
        transport.connect("node").await.unwrap();
        transport.recv().await.unwrap();

        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            transport.recv(),
        )
        .await;
        assert!(pending.is_err(), "recv should wait on an empty queue");
    }

    #[tokio::test]
    async fn drop_and_reconnect_are_events() {
        let transport = MockTransport::new();
        transport.connect("node").await.unwrap();
        transport.recv().await.unwrap();

        transport.simulate_drop("server restart");
        assert!(!transport.is_connected());
        assert_eq!(
            transport.recv().await.unwrap(),
            TransportEvent::Closed {
                reason: "server restart".into()
            }
        );

        transport.simulate_reconnect();
        assert!(transport.is_connected());
        assert_eq!(transport.recv().await.unwrap(), TransportEvent::Opened);
    }

    // ===========================================
    // Error Condition Tests
    // ===========================================

    #[tokio::test]
    async fn send_without_connect_fails() {
        let transport = MockTransport::new();

        let result = transport.send(b"data").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn recv_without_connect_fails() {
        let transport = MockTransport::new();

        let result = transport.recv().await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn recv_after_close_fails() {
        let transport = MockTransport::new();
        transport.connect("node").await.unwrap();
        transport.close().await.unwrap();

        assert!(transport.is_closed());
        let result = transport.recv().await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn close_wakes_pending_recv() {
        let transport = MockTransport::new();
        transport.connect("node").await.unwrap();
        transport.recv().await.unwrap();

        let waiting = transport.clone();
        let pending = tokio::spawn(async move { waiting.recv().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        transport.close().await.unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn forced_connect_failure() {
        let transport = MockTransport::new();
        transport.fail_next_connect("network unreachable");

        let result = transport.connect("node").await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn forced_send_failure() {
        let transport = MockTransport::new();
        transport.connect("node").await.unwrap();
        transport.fail_next_send("buffer full");

        let result = transport.send(b"data").await;
        assert!(matches!(result, Err(TransportError::SendFailed(_))));

        // Next send should work
        transport.send(b"data").await.unwrap();
    }

    // ===========================================
    // Clone and Shared State Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_clone_shares_state() {
        let transport1 = MockTransport::new();
        let transport2 = transport1.clone();

        transport1.connect("node").await.unwrap();
        assert!(transport2.is_connected());

        transport1.send(b"from t1").await.unwrap();
        transport2.send(b"from t2").await.unwrap();
        assert_eq!(transport1.sent_messages().len(), 2);

        transport2.queue_frame(b"shared".to_vec());
        assert_eq!(transport1.recv().await.unwrap(), TransportEvent::Opened);
        assert_eq!(
            transport1.recv().await.unwrap(),
            TransportEvent::Message(b"shared".to_vec())
        );
    }
}
