//! # sync-core
//!
//! Pure logic for docsync (no I/O, instant tests).
//!
//! This crate implements the state machines that decide what happens to the
//! replicated document without any network or disk I/O:
//!
//! - [`Replica`] holds the document and handles inbound frames
//! - [`echo`] drops our own changes when the server echoes them back
//! - [`OutboundEmitter`] turns local edits into `Change` frames
//! - [`SyncPhase`] tracks the initial-sync milestone
//! - [`LinkState`] and [`Backoff`] drive reconnecting transports
//!
//! The CRDT itself stays behind [`CrdtEngine`]; [`TranscriptEngine`] stores
//! transcripts in Automerge documents.
//!
//! The actual I/O (sockets, timers, the editor) is performed by
//! `sync-client`, which interprets what these state machines decide.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod echo;
pub mod emitter;
pub mod engine;
pub mod link;
pub mod replica;
pub mod state;

pub use document::{DocumentError, Op, TranscriptDoc, TranscriptEngine};
pub use emitter::{Emission, OutboundEmitter};
pub use engine::CrdtEngine;
pub use link::{Backoff, LinkAction, LinkEvent, LinkState};
pub use replica::{FrameOutcome, Replica, ReplicaError};
pub use state::{Action, PhaseEvent, SyncPhase};
