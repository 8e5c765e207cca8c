//! The document-holding sync state machine.
//!
//! [`Replica`] owns the single authoritative document of a session and
//! decides what every inbound frame does to it:
//!
//! - `Change`: merged, unless it is an echo of our own change
//! - `ChangeBacklogComplete`: advances the [`SyncPhase`]
//! - `FullDoc`: replaces the document unconditionally
//! - unknown tags: ignored
//!
//! Frames are handled strictly in the order given; nothing is buffered or
//! reordered here. Every transition replaces the document wholesale.

use std::sync::Arc;
use thiserror::Error;

use docsync_types::{Frame, FrameTag, SyncError};

use crate::echo::is_own_change;
use crate::state::{Action, PhaseEvent, SyncPhase};
use crate::CrdtEngine;

/// A frame that could not be handled.
///
/// Either way the held document is left exactly as it was.
#[derive(Debug, Error)]
pub enum ReplicaError<E: std::error::Error + 'static> {
    /// The wire bytes were not a frame at all.
    #[error("malformed frame: {0}")]
    Malformed(#[source] SyncError),

    /// The engine rejected a `Change` or `FullDoc` payload.
    #[error("failed to decode {} payload: {source}", tag.name())]
    Engine {
        /// Kind of the rejected frame.
        tag: FrameTag,
        /// Engine error.
        #[source]
        source: E,
    },
}

/// What a handled frame did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome<R> {
    /// A remote change was merged.
    Applied {
        /// Author of the change.
        author: R,
    },
    /// Our own change came back and was dropped.
    EchoSuppressed {
        /// Author of the change (our replica).
        author: R,
    },
    /// The document was replaced from a snapshot.
    SnapshotLoaded,
    /// The server finished delivering its backlog.
    BacklogComplete {
        /// True only the first time in this session.
        initial: bool,
    },
    /// Unknown tag; nothing changed.
    Ignored {
        /// The unrecognized tag byte.
        tag: u8,
    },
}

/// Holds the session's document and sync phase.
pub struct Replica<E: CrdtEngine> {
    engine: Arc<E>,
    document: E::Document,
    phase: SyncPhase,
}

impl<E: CrdtEngine> Replica<E> {
    /// Create a replica holding a freshly initialized empty document.
    pub fn new(engine: Arc<E>) -> Self {
        let document = engine.init_empty();
        Self {
            engine,
            document,
            phase: SyncPhase::new(),
        }
    }

    /// The engine this replica uses.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The current document.
    pub fn document(&self) -> &E::Document {
        &self.document
    }

    /// The current sync phase.
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// The replica identifier of the current document.
    pub fn replica_id(&self) -> E::ReplicaId {
        self.engine.replica_id(&self.document)
    }

    /// The transport (re)opened. The document is kept as is.
    pub fn connection_opened(&mut self) {
        self.advance(PhaseEvent::ConnectionOpened);
    }

    /// The transport lost its connection. The document is kept as is.
    pub fn connection_lost(&mut self) {
        self.advance(PhaseEvent::ConnectionLost);
    }

    /// Replace the document with one produced by a local edit.
    pub fn replace(&mut self, document: E::Document) {
        self.document = document;
    }

    /// Decode wire bytes and handle the frame.
    pub fn handle_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<FrameOutcome<E::ReplicaId>, ReplicaError<E::Error>> {
        let frame = Frame::from_bytes(bytes).map_err(ReplicaError::Malformed)?;
        self.handle_frame(&frame)
    }

    /// Handle one decoded frame.
    pub fn handle_frame(
        &mut self,
        frame: &Frame,
    ) -> Result<FrameOutcome<E::ReplicaId>, ReplicaError<E::Error>> {
        let tag = match frame.kind() {
            Ok(tag) => tag,
            Err(_) => return Ok(FrameOutcome::Ignored { tag: frame.tag }),
        };

        match tag {
            FrameTag::Change => {
                let engine_err = |source| ReplicaError::Engine { tag, source };
                let (own, author) =
                    is_own_change(&*self.engine, &self.document, &frame.payload)
                        .map_err(engine_err)?;
                if own {
                    return Ok(FrameOutcome::EchoSuppressed { author });
                }
                let merged = self
                    .engine
                    .apply_changes(&self.document, std::slice::from_ref(&frame.payload))
                    .map_err(engine_err)?;
                self.document = merged;
                Ok(FrameOutcome::Applied { author })
            }
            FrameTag::ChangeBacklogComplete => {
                let actions = self.advance(PhaseEvent::BacklogComplete);
                Ok(FrameOutcome::BacklogComplete {
                    initial: actions.contains(&Action::NotifyInitialSync),
                })
            }
            FrameTag::FullDoc => {
                let loaded = self
                    .engine
                    .load_snapshot(&frame.payload)
                    .map_err(|source| ReplicaError::Engine { tag, source })?;
                self.document = loaded;
                Ok(FrameOutcome::SnapshotLoaded)
            }
        }
    }

    fn advance(&mut self, event: PhaseEvent) -> Vec<Action> {
        let (phase, actions) = self.phase.on_event(event);
        self.phase = phase;
        actions
    }
}
