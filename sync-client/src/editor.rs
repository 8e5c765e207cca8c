//! Editor-facing handle onto a running session.
//!
//! The session actor owns the authoritative document. An [`EditorHandle`]
//! reads it through a `watch` channel and changes it only by sending
//! commands to the actor, so local edits and remote changes are applied one
//! at a time in a single order.

use docsync_core::{CrdtEngine, SyncPhase};
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::ClientError;

/// A local edit, run by the actor against its current document.
pub(crate) type EditFn<E> = Box<
    dyn FnOnce(
            &E,
            &<E as CrdtEngine>::Document,
        ) -> Result<<E as CrdtEngine>::Document, <E as CrdtEngine>::Error>
        + Send,
>;

/// Commands from handles to the session actor.
pub(crate) enum Command<E: CrdtEngine> {
    /// Derive a new document from the current one.
    Edit {
        edit: EditFn<E>,
        reply: oneshot::Sender<Result<E::Document, E::Error>>,
    },
    /// Replace the document outright.
    Replace {
        document: E::Document,
        reply: oneshot::Sender<()>,
    },
    /// Tear the session down.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Read view and edit access for one session's document.
///
/// Handles are cheap to clone. The session stays alive while any handle
/// (or the [`Session`](crate::Session) itself) exists.
pub struct EditorHandle<E: CrdtEngine> {
    commands: mpsc::Sender<Command<E>>,
    document: watch::Receiver<E::Document>,
    phase: watch::Receiver<SyncPhase>,
}

impl<E: CrdtEngine> Clone for EditorHandle<E> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            document: self.document.clone(),
            phase: self.phase.clone(),
        }
    }
}

impl<E: CrdtEngine> EditorHandle<E> {
    pub(crate) fn new(
        commands: mpsc::Sender<Command<E>>,
        document: watch::Receiver<E::Document>,
        phase: watch::Receiver<SyncPhase>,
    ) -> Self {
        Self {
            commands,
            document,
            phase,
        }
    }

    /// A copy of the current document.
    pub fn document(&self) -> E::Document {
        self.document.borrow().clone()
    }

    /// The session's current sync phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Wait until the document is replaced (by a local edit or a remote
    /// change) and return the new document.
    pub async fn changed(&mut self) -> Result<E::Document, ClientError> {
        self.document
            .changed()
            .await
            .map_err(|_| ClientError::SessionClosed)?;
        Ok(self.document.borrow_and_update().clone())
    }

    /// Wait until the initial backlog has been delivered.
    pub async fn wait_synced(&mut self) -> Result<(), ClientError> {
        self.phase
            .wait_for(SyncPhase::is_synced)
            .await
            .map_err(|_| ClientError::SessionClosed)?;
        Ok(())
    }

    /// Make a local edit.
    ///
    /// `edit` runs on the session actor against the document as it is at
    /// that moment, and its result becomes the new document. The resulting
    /// change is sent to the server if a connection is open, and dropped
    /// otherwise. Returns the new document.
    ///
    /// If `edit` fails the document is left as it was and the engine error
    /// is returned as [`ClientError::Edit`].
    pub async fn edit<F>(&self, edit: F) -> Result<E::Document, ClientError>
    where
        F: FnOnce(&E, &E::Document) -> Result<E::Document, E::Error> + Send + 'static,
    {
        let (reply, done) = oneshot::channel();
        self.send(Command::Edit {
            edit: Box::new(edit),
            reply,
        })
        .await?;
        done.await
            .map_err(|_| ClientError::SessionClosed)?
            .map_err(|e| ClientError::Edit(Box::new(e)))
    }

    /// Replace the document with one produced elsewhere.
    ///
    /// Goes through the same outbound path as [`EditorHandle::edit`].
    pub async fn replace(&self, document: E::Document) -> Result<(), ClientError> {
        let (reply, done) = oneshot::channel();
        self.send(Command::Replace { document, reply }).await?;
        done.await.map_err(|_| ClientError::SessionClosed)
    }

    pub(crate) async fn send(&self, command: Command<E>) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::SessionClosed)
    }
}

impl<E: CrdtEngine> std::fmt::Debug for EditorHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorHandle")
            .field("phase", &self.phase())
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}
