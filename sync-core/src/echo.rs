//! Echo suppression.
//!
//! The server rebroadcasts every change to every connected replica, its
//! author included, and may replay a replica's own history in a backlog long
//! after the fact. A change whose author is the held document's own replica
//! is already part of that document and is dropped before merging.

use crate::CrdtEngine;

/// Check whether `change` was authored by the replica that owns `doc`.
///
/// Returns the decoded author alongside the verdict so callers can log it.
pub fn is_own_change<E: CrdtEngine>(
    engine: &E,
    doc: &E::Document,
    change: &[u8],
) -> Result<(bool, E::ReplicaId), E::Error> {
    let author = engine.decode_change_author(change)?;
    Ok((author == engine.replica_id(doc), author))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Op, TranscriptEngine};
    use docsync_types::ReplicaId;

    #[test]
    fn own_change_is_detected() {
        let engine = TranscriptEngine::new();
        let doc = engine.init_empty();
        let doc = engine.edit(&doc, vec![Op::push_paragraph("A", "en")]).unwrap();
        let change = engine.last_local_change(&doc).unwrap();

        let (own, author) = is_own_change(&engine, &doc, &change).unwrap();
        assert!(own);
        assert_eq!(author, engine.replica_id(&doc));
    }

    #[test]
    fn foreign_change_is_not_an_echo() {
        let engine = TranscriptEngine::new();
        let local = engine.init_empty();
        let remote = engine.init_with_replica(ReplicaId::from_bytes(b"R2"));
        let remote = engine
            .edit(&remote, vec![Op::push_paragraph("B", "en")])
            .unwrap();
        let change = engine.last_local_change(&remote).unwrap();

        let (own, author) = is_own_change(&engine, &local, &change).unwrap();
        assert!(!own);
        assert_eq!(author, ReplicaId::from_bytes(b"R2"));
    }

    #[test]
    fn undecodable_change_is_an_error() {
        let engine = TranscriptEngine::new();
        let doc = engine.init_empty();
        assert!(is_own_change(&engine, &doc, b"\xff\xff garbage").is_err());
    }
}
