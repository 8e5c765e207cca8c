//! Session - binds one document replica to one transport.
//!
//! This module provides [`Session`], the entry point applications use to
//! keep a document in sync with the server.
//!
//! # Architecture
//!
//! A session is a single actor task. It owns the [`Replica`] (document and
//! sync phase), the [`OutboundEmitter`] and the connection handle, and
//! interprets what the pure `docsync-core` state machines decide:
//!
//! ```text
//! EditorHandle ──commands──▶ actor ──Change frames──▶ Transport ──▶ server
//!      ▲                      │  ▲
//!      └──watch (document)────┘  └──TransportEvent (Opened/Message/Closed)
//! ```
//!
//! Local commands and transport events are drained by the same task, so the
//! document is never touched concurrently.
//!
//! # Example
//!
//! ```ignore
//! use docsync_client::{MockTransport, Session, SessionConfig};
//! use docsync_core::TranscriptEngine;
//!
//! let session = Session::start(
//!     SessionConfig::new("ws://localhost:8000/api/v1/documents/sync/abc/"),
//!     Arc::new(TranscriptEngine::new()),
//!     MockTransport::new(),
//!     || println!("initial sync complete"),
//! )
//! .await?;
//!
//! let editor = session.editor();
//! editor.edit(|engine, doc| engine.edit(doc, ops)).await?;
//! session.shutdown().await;
//! ```

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use docsync_core::{
    CrdtEngine, Emission, FrameOutcome, OutboundEmitter, Replica, ReplicaError, SyncPhase,
};

use crate::config::SessionConfig;
use crate::editor::{Command, EditorHandle};
use crate::error::ClientError;
use crate::transport::{Transport, TransportError, TransportEvent};

/// Notable things that happened in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A socket opened and the replica is bound to it.
    ConnectionOpened,
    /// The socket went down. The document is kept.
    ConnectionLost {
        /// Why the socket closed.
        reason: String,
    },
    /// The server delivered its backlog for the first time.
    InitialSyncComplete,
    /// The document was replaced from a server snapshot.
    SnapshotLoaded,
    /// An inbound frame could not be decoded and was skipped.
    FrameRejected {
        /// Decode error.
        reason: String,
    },
}

/// A running sync session for one document.
///
/// Dropping the session and every [`EditorHandle`] tears it down;
/// [`Session::shutdown`] does so explicitly and waits for it.
pub struct Session<E: CrdtEngine> {
    editor: EditorHandle<E>,
    events: broadcast::Sender<SessionEvent>,
    task: JoinHandle<()>,
}

impl<E: CrdtEngine> Session<E> {
    /// Start a session: connect `transport` to the configured address and
    /// begin syncing a fresh empty document.
    ///
    /// `on_initial_sync` runs once, the first time the server reports that
    /// its backlog has been delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the transport
    /// refuses to connect.
    pub async fn start<T, F>(
        config: SessionConfig,
        engine: Arc<E>,
        transport: T,
        on_initial_sync: F,
    ) -> Result<Self, ClientError>
    where
        T: Transport,
        F: FnOnce() + Send + 'static,
    {
        config.validate()?;

        let replica = Replica::new(engine);
        let (document_tx, document_rx) = watch::channel(replica.document().clone());
        let (phase_tx, phase_rx) = watch::channel(replica.phase());
        let (events, _) = broadcast::channel(config.event_buffer);
        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer);

        transport.connect(&config.address).await?;
        tracing::info!(
            "Session for {} started (replica {})",
            config.address,
            replica.replica_id()
        );

        let actor = SessionActor {
            replica,
            emitter: OutboundEmitter::new(),
            connection: Some(Arc::new(transport)),
            document_tx,
            phase_tx,
            events: events.clone(),
            on_initial_sync: Some(Box::new(on_initial_sync)),
        };
        let task = tokio::spawn(actor.run(commands_rx));

        Ok(Self {
            editor: EditorHandle::new(commands_tx, document_rx, phase_rx),
            events,
            task,
        })
    }

    /// A handle for reading and editing the document.
    pub fn editor(&self) -> EditorHandle<E> {
        self.editor.clone()
    }

    /// Subscribe to session events from now on.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Tear the session down and wait until the transport is closed.
    ///
    /// Editor handles that outlive the session get
    /// [`ClientError::SessionClosed`] from then on.
    pub async fn shutdown(self) {
        let (reply, done) = oneshot::channel();
        if self.editor.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = done.await;
        }
        if let Err(e) = self.task.await {
            tracing::error!("Session task failed: {}", e);
        }
    }
}

impl<E: CrdtEngine> std::fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("editor", &self.editor)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

/// The task that owns the document and the connection handle.
struct SessionActor<E: CrdtEngine, T: Transport> {
    replica: Replica<E>,
    emitter: OutboundEmitter,
    /// Cleared before the transport is closed, so nothing is sent after
    /// teardown begins.
    connection: Option<Arc<T>>,
    document_tx: watch::Sender<E::Document>,
    phase_tx: watch::Sender<SyncPhase>,
    events: broadcast::Sender<SessionEvent>,
    on_initial_sync: Option<Box<dyn FnOnce() + Send>>,
}

/// Next event from the connection, or never when there is none.
async fn next_event<T: Transport>(
    connection: Option<Arc<T>>,
) -> Result<TransportEvent, TransportError> {
    match connection {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

impl<E: CrdtEngine, T: Transport> SessionActor<E, T> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command<E>>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            return;
                        }
                    }
                    None => {
                        // Every handle is gone
                        self.teardown().await;
                        return;
                    }
                },
                event = next_event(self.connection.clone()) => match event {
                    Ok(event) => self.handle_transport_event(event),
                    Err(e) => self.connection_failed(e),
                },
            }
        }
    }

    /// Run one command. Returns false once the session is torn down.
    async fn handle_command(&mut self, command: Command<E>) -> bool {
        match command {
            Command::Edit { edit, reply } => {
                let result = edit(&**self.replica.engine(), self.replica.document());
                let result = match result {
                    Ok(document) => {
                        self.apply_local(document).await;
                        Ok(self.replica.document().clone())
                    }
                    Err(e) => {
                        tracing::warn!("Local edit rejected: {}", e);
                        Err(e)
                    }
                };
                let _ = reply.send(result);
                true
            }
            Command::Replace { document, reply } => {
                self.apply_local(document).await;
                let _ = reply.send(());
                true
            }
            Command::Shutdown { reply } => {
                self.teardown().await;
                let _ = reply.send(());
                false
            }
        }
    }

    /// Install a locally produced document and forward its change.
    async fn apply_local(&mut self, document: E::Document) {
        self.replica.replace(document);

        let connected = self
            .connection
            .as_ref()
            .is_some_and(|transport| transport.is_connected());
        let emission =
            self.emitter
                .on_local_change(&**self.replica.engine(), self.replica.document(), connected);

        match emission {
            Emission::Send(frame) => {
                if let Some(transport) = &self.connection {
                    if let Err(e) = transport.send(&frame.to_bytes()).await {
                        tracing::debug!("Dropped local change: {}", e);
                    }
                }
            }
            Emission::Dropped => tracing::debug!("Dropped local change: not connected"),
            Emission::NoChange => {}
        }

        self.publish_document();
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                self.replica.connection_opened();
                self.publish_phase();
                tracing::info!("Connection opened ({:?})", self.replica.phase());
                self.emit(SessionEvent::ConnectionOpened);
            }
            TransportEvent::Closed { reason } => {
                self.replica.connection_lost();
                tracing::info!("Connection lost: {}", reason);
                self.emit(SessionEvent::ConnectionLost { reason });
            }
            TransportEvent::Message(bytes) => self.handle_message(&bytes),
        }
    }

    fn handle_message(&mut self, bytes: &[u8]) {
        match self.replica.handle_bytes(bytes) {
            Ok(FrameOutcome::Applied { author }) => {
                tracing::debug!("Applied change from {}", author);
                self.publish_document();
            }
            Ok(FrameOutcome::EchoSuppressed { author }) => {
                tracing::debug!("Suppressed echo of own change ({})", author);
            }
            Ok(FrameOutcome::SnapshotLoaded) => {
                tracing::debug!(
                    "Loaded snapshot (replica now {})",
                    self.replica.replica_id()
                );
                self.publish_document();
                self.emit(SessionEvent::SnapshotLoaded);
            }
            Ok(FrameOutcome::BacklogComplete { initial }) => {
                self.publish_phase();
                if initial {
                    tracing::info!("Initial sync complete");
                    if let Some(callback) = self.on_initial_sync.take() {
                        callback();
                    }
                    self.emit(SessionEvent::InitialSyncComplete);
                } else {
                    tracing::debug!("Backlog complete after reconnect");
                }
            }
            Ok(FrameOutcome::Ignored { tag }) => {
                tracing::debug!("Ignoring frame with unknown tag {}", tag);
            }
            Err(ReplicaError::Malformed(e)) => {
                tracing::debug!("Ignoring malformed frame: {}", e);
            }
            Err(e @ ReplicaError::Engine { .. }) => {
                tracing::warn!("Rejected frame: {}", e);
                self.emit(SessionEvent::FrameRejected {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// The transport stopped for good; keep the document, drop the handle.
    fn connection_failed(&mut self, error: TransportError) {
        tracing::error!("Transport failed: {}", error);
        self.connection = None;
        self.replica.connection_lost();
        self.emit(SessionEvent::ConnectionLost {
            reason: error.to_string(),
        });
    }

    async fn teardown(&mut self) {
        // Clear the handle first so nothing observes a closing connection
        if let Some(transport) = self.connection.take() {
            if let Err(e) = transport.close().await {
                tracing::debug!("Error closing transport: {}", e);
            }
        }
        tracing::info!("Session closed");
    }

    fn publish_document(&self) {
        self.document_tx.send_replace(self.replica.document().clone());
    }

    fn publish_phase(&self) {
        self.phase_tx.send_replace(self.replica.phase());
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
