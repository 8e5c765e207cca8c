//! # sync-types
//!
//! Wire format and shared types for docsync.
//!
//! This crate provides the foundational types used across all docsync crates:
//! - [`Frame`], [`FrameTag`] - The one-byte-tag wire frame and its codec
//! - [`ReplicaId`] - Identity of the replica that authored a change
//! - [`Transcript`], [`Paragraph`], [`Atom`] - Document content model
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frame;
mod ids;
mod transcript;

pub use error::SyncError;
pub use frame::{decode, encode, Frame, FrameTag};
pub use ids::ReplicaId;
pub use transcript::{Atom, Paragraph, Transcript, UNKNOWN_SPEAKER};
