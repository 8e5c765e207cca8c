//! Outbound change emitter.
//!
//! Turns "the document changed locally" notifications into `Change` frames.
//! Emission is best-effort: with no live connection the change is dropped,
//! never queued. A notification that carries no new local change (the
//! engine still reports the change that was already handled) emits nothing.

use docsync_types::Frame;

use crate::CrdtEngine;

/// Decision for one local-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    /// Send this frame.
    Send(Frame),
    /// A new change exists but there is no connection; it is dropped.
    Dropped,
    /// No new local change since the last notification.
    NoChange,
}

/// Tracks the last local change handled so each is emitted at most once.
#[derive(Debug, Default)]
pub struct OutboundEmitter {
    last_handled: Option<Vec<u8>>,
}

impl OutboundEmitter {
    /// Create an emitter that has handled nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide what to do after the document changed locally.
    pub fn on_local_change<E: CrdtEngine>(
        &mut self,
        engine: &E,
        doc: &E::Document,
        connected: bool,
    ) -> Emission {
        let Some(change) = engine.last_local_change(doc) else {
            return Emission::NoChange;
        };
        if self.last_handled.as_ref() == Some(&change) {
            return Emission::NoChange;
        }
        self.last_handled = Some(change.clone());

        if connected {
            Emission::Send(Frame::change(change))
        } else {
            Emission::Dropped
        }
    }
}
