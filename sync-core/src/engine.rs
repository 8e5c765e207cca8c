//! The CRDT engine seam.
//!
//! docsync does not merge documents itself. Everything that understands the
//! document's internals (merge, causal history, change encoding) sits behind
//! [`CrdtEngine`]. The sync logic only ever sees documents as immutable
//! values and changes as opaque bytes with a decodable author.

use std::fmt;

/// Operations the sync logic needs from a CRDT engine.
///
/// Documents are values: every operation that "modifies" a document returns
/// a new one, and the caller replaces the one it holds.
pub trait CrdtEngine: Send + Sync + 'static {
    /// The replicated document value.
    type Document: Clone + Send + Sync + 'static;
    /// Identifies the replica that authored a change.
    type ReplicaId: Clone + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static;
    /// Failure to decode or apply engine bytes.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create an empty document owned by a fresh local replica.
    fn init_empty(&self) -> Self::Document;

    /// Read the author out of a serialized change without applying it.
    fn decode_change_author(&self, change: &[u8]) -> Result<Self::ReplicaId, Self::Error>;

    /// The replica identifier that owns `doc`.
    fn replica_id(&self, doc: &Self::Document) -> Self::ReplicaId;

    /// Merge serialized changes into `doc`, producing a new document.
    fn apply_changes(
        &self,
        doc: &Self::Document,
        changes: &[Vec<u8>],
    ) -> Result<Self::Document, Self::Error>;

    /// Reconstruct a document from a full snapshot.
    fn load_snapshot(&self, snapshot: &[u8]) -> Result<Self::Document, Self::Error>;

    /// Serialize a full snapshot of `doc`.
    fn save_snapshot(&self, doc: &Self::Document) -> Result<Vec<u8>, Self::Error>;

    /// The most recent change authored by `doc`'s own replica, if any.
    fn last_local_change(&self, doc: &Self::Document) -> Option<Vec<u8>>;
}
