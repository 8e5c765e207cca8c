//! Automerge-backed transcript engine.
//!
//! [`TranscriptEngine`] stores a [`Transcript`] in an Automerge document:
//!
//! ```text
//! ROOT
//! └── paragraphs: List
//!     └── Map { type: "paragraph", speaker, lang, children: List }
//!         └── Map { text: Text, start, end, conf }
//! ```
//!
//! Every empty document starts from the same genesis change (the
//! `paragraphs` list, written by a fixed actor at time zero), so replicas
//! that never exchanged a snapshot still share the list object and their
//! concurrent paragraph inserts merge instead of shadowing each other.
//!
//! Edits are expressed as [`Op`]s. Indices in an op refer to the document
//! the edit is made against and are resolved to Automerge object ids at
//! edit time; from then on the change targets those objects wherever
//! concurrent edits move them.

use automerge::transaction::{CommitOptions, Transactable, Transaction};
use automerge::{
    ActorId, Automerge, AutomergeError, Change, ChangeHash, LoadChangeError, ObjId, ObjType,
    Prop, ReadDoc, ScalarValue, Value, ROOT,
};
use thiserror::Error;

use docsync_types::{Atom, Paragraph, ReplicaId, Transcript};

use crate::CrdtEngine;

/// Actor of the shared genesis change.
const GENESIS_ACTOR: &[u8] = b"docsync-genesis";

const PARAGRAPHS: &str = "paragraphs";
const CHILDREN: &str = "children";

/// Errors from the transcript engine.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Change bytes could not be parsed
    #[error("malformed change: {0}")]
    Change(#[from] LoadChangeError),

    /// Automerge rejected an operation, change or snapshot
    #[error("automerge: {0}")]
    Automerge(#[from] AutomergeError),
}

/// An edit operation on a transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Append an empty paragraph.
    PushParagraph {
        /// Speaker label
        speaker: String,
        /// Language code
        lang: String,
    },
    /// Append an atom to a paragraph.
    PushAtom {
        /// Paragraph index
        paragraph: usize,
        /// The atom to append
        atom: Atom,
    },
    /// Append text to an existing atom.
    AppendText {
        /// Paragraph index
        paragraph: usize,
        /// Atom index within the paragraph
        atom: usize,
        /// Text to append
        text: String,
    },
    /// Relabel a paragraph's speaker.
    SetSpeaker {
        /// Paragraph index
        paragraph: usize,
        /// New speaker label
        speaker: String,
    },
}

impl Op {
    /// Shorthand for [`Op::PushParagraph`].
    pub fn push_paragraph(speaker: &str, lang: &str) -> Self {
        Op::PushParagraph {
            speaker: speaker.to_string(),
            lang: lang.to_string(),
        }
    }

    /// Shorthand for [`Op::PushAtom`].
    pub fn push_atom(paragraph: usize, atom: Atom) -> Self {
        Op::PushAtom { paragraph, atom }
    }

    /// Shorthand for [`Op::AppendText`].
    pub fn append_text(paragraph: usize, atom: usize, text: &str) -> Self {
        Op::AppendText {
            paragraph,
            atom,
            text: text.to_string(),
        }
    }

    /// Apply to an open transaction. Ops whose indices do not exist are
    /// skipped.
    fn apply(&self, tx: &mut Transaction<'_>) -> Result<(), AutomergeError> {
        match self {
            Op::PushParagraph { speaker, lang } => {
                let list = match child(&*tx, &ROOT, PARAGRAPHS)? {
                    Some(list) => list,
                    None => tx.put_object(ROOT, PARAGRAPHS, ObjType::List)?,
                };
                let p = tx.insert_object(&list, tx.length(&list), ObjType::Map)?;
                tx.put(&p, "type", "paragraph")?;
                tx.put(&p, "speaker", speaker.as_str())?;
                tx.put(&p, "lang", lang.as_str())?;
                tx.put_object(&p, CHILDREN, ObjType::List)?;
            }
            Op::PushAtom { paragraph, atom } => {
                let Some(p) = paragraph_at(&*tx, *paragraph)? else {
                    return Ok(());
                };
                let children = match child(&*tx, &p, CHILDREN)? {
                    Some(children) => children,
                    None => tx.put_object(&p, CHILDREN, ObjType::List)?,
                };
                let a = tx.insert_object(&children, tx.length(&children), ObjType::Map)?;
                let text = tx.put_object(&a, "text", ObjType::Text)?;
                tx.splice_text(&text, 0, 0, &atom.text)?;
                tx.put(&a, "start", atom.start)?;
                tx.put(&a, "end", atom.end)?;
                tx.put(&a, "conf", atom.conf)?;
            }
            Op::AppendText {
                paragraph,
                atom,
                text,
            } => {
                let Some(p) = paragraph_at(&*tx, *paragraph)? else {
                    return Ok(());
                };
                let Some(children) = child(&*tx, &p, CHILDREN)? else {
                    return Ok(());
                };
                let Some(a) = child(&*tx, &children, *atom)? else {
                    return Ok(());
                };
                match child(&*tx, &a, "text")? {
                    Some(t) => {
                        let end = tx.length(&t);
                        tx.splice_text(&t, end, 0, text)?;
                    }
                    None => {
                        // Scalar text from another writer: upgrade it to a Text object
                        let current = string(&*tx, &a, "text")?;
                        let t = tx.put_object(&a, "text", ObjType::Text)?;
                        tx.splice_text(&t, 0, 0, &format!("{current}{text}"))?;
                    }
                }
            }
            Op::SetSpeaker { paragraph, speaker } => {
                if let Some(p) = paragraph_at(&*tx, *paragraph)? {
                    tx.put(&p, "speaker", speaker.as_str())?;
                }
            }
        }
        Ok(())
    }
}

/// The object at `prop`, if there is one.
fn child<R: ReadDoc, P: Into<Prop>>(
    doc: &R,
    obj: &ObjId,
    prop: P,
) -> Result<Option<ObjId>, AutomergeError> {
    Ok(match doc.get(obj, prop)? {
        Some((Value::Object(_), id)) => Some(id),
        _ => None,
    })
}

fn paragraph_at<R: ReadDoc>(doc: &R, index: usize) -> Result<Option<ObjId>, AutomergeError> {
    match child(doc, &ROOT, PARAGRAPHS)? {
        Some(list) => child(doc, &list, index),
        None => Ok(None),
    }
}

/// A string stored either as a scalar or as a Text object.
fn string<R: ReadDoc>(doc: &R, obj: &ObjId, prop: &str) -> Result<String, AutomergeError> {
    Ok(match doc.get(obj, prop)? {
        Some((Value::Object(ObjType::Text), id)) => doc.text(&id)?,
        Some((Value::Scalar(v), _)) => match &*v {
            ScalarValue::Str(s) => s.to_string(),
            _ => String::new(),
        },
        _ => String::new(),
    })
}

fn number<R: ReadDoc>(doc: &R, obj: &ObjId, prop: &str) -> Result<f64, AutomergeError> {
    Ok(match doc.get(obj, prop)? {
        Some((Value::Scalar(v), _)) => match &*v {
            ScalarValue::F64(n) => *n,
            ScalarValue::Int(n) => *n as f64,
            ScalarValue::Uint(n) => *n as f64,
            _ => 0.0,
        },
        _ => 0.0,
    })
}

/// Materialize the transcript. Entries of the wrong shape are skipped.
fn read_transcript(doc: &Automerge) -> Result<Transcript, AutomergeError> {
    let mut transcript = Transcript::new();
    let Some(list) = child(doc, &ROOT, PARAGRAPHS)? else {
        return Ok(transcript);
    };

    for i in 0..doc.length(&list) {
        let Some(p) = child(doc, &list, i)? else {
            continue;
        };
        let mut paragraph = Paragraph::new(string(doc, &p, "speaker")?, string(doc, &p, "lang")?);
        if let Some(children) = child(doc, &p, CHILDREN)? {
            for j in 0..doc.length(&children) {
                let Some(a) = child(doc, &children, j)? else {
                    continue;
                };
                paragraph.children.push(Atom::new(
                    string(doc, &a, "text")?,
                    number(doc, &a, "start")?,
                    number(doc, &a, "end")?,
                    number(doc, &a, "conf")?,
                ));
            }
        }
        transcript.paragraphs.push(paragraph);
    }
    Ok(transcript)
}

/// The empty document every replica starts from.
fn genesis() -> Automerge {
    let mut doc = Automerge::new().with_actor(ActorId::from(GENESIS_ACTOR));
    // Cannot fail on an empty document; PushParagraph recreates the list if missing
    let _ = doc.transact_with(
        |_| CommitOptions::default().with_time(0),
        |tx| -> Result<ObjId, AutomergeError> { tx.put_object(ROOT, PARAGRAPHS, ObjType::List) },
    );
    doc
}

fn replica_of(actor: &ActorId) -> ReplicaId {
    ReplicaId::from_bytes(actor.to_bytes())
}

/// A document value of the [`TranscriptEngine`].
#[derive(Debug, Clone)]
pub struct TranscriptDoc {
    doc: Automerge,
    replica: ReplicaId,
    transcript: Transcript,
}

impl TranscriptDoc {
    fn new(doc: Automerge) -> Result<Self, AutomergeError> {
        let transcript = read_transcript(&doc)?;
        Ok(Self {
            replica: replica_of(doc.get_actor()),
            doc,
            transcript,
        })
    }

    /// The materialized transcript.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The replica that owns this document.
    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    /// Hashes of the changes no other change depends on yet.
    pub fn heads(&self) -> Vec<ChangeHash> {
        self.doc.get_heads()
    }

    /// The underlying Automerge document.
    pub fn automerge(&self) -> &Automerge {
        &self.doc
    }
}

impl PartialEq for TranscriptDoc {
    fn eq(&self, other: &Self) -> bool {
        self.replica == other.replica && self.heads() == other.heads()
    }
}

/// [`CrdtEngine`] over Automerge transcript documents.
#[derive(Debug, Clone, Default)]
pub struct TranscriptEngine {
    replica: Option<ReplicaId>,
}

impl TranscriptEngine {
    /// Engine whose empty documents get a random replica identifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose empty documents are owned by `replica`.
    pub fn with_replica(replica: ReplicaId) -> Self {
        Self {
            replica: Some(replica),
        }
    }

    /// An empty document owned by `replica`.
    pub fn init_with_replica(&self, replica: ReplicaId) -> TranscriptDoc {
        let mut doc = genesis();
        doc.set_actor(ActorId::from(replica.as_bytes()));
        TranscriptDoc {
            doc,
            replica,
            transcript: Transcript::new(),
        }
    }

    /// Make a local edit: record `ops` as one change authored by the
    /// document's own replica.
    ///
    /// On error the input document is untouched.
    pub fn edit(&self, doc: &TranscriptDoc, ops: Vec<Op>) -> Result<TranscriptDoc, DocumentError> {
        let mut next = doc.doc.clone();
        next.transact(|tx| -> Result<(), AutomergeError> {
            for op in &ops {
                op.apply(tx)?;
            }
            Ok(())
        })
        .map_err(|failure| failure.error)?;
        Ok(TranscriptDoc::new(next)?)
    }
}

impl CrdtEngine for TranscriptEngine {
    type Document = TranscriptDoc;
    type ReplicaId = ReplicaId;
    type Error = DocumentError;

    fn init_empty(&self) -> TranscriptDoc {
        let replica = self
            .replica
            .clone()
            .unwrap_or_else(|| replica_of(&ActorId::random()));
        self.init_with_replica(replica)
    }

    fn decode_change_author(&self, change: &[u8]) -> Result<ReplicaId, DocumentError> {
        let change = Change::try_from(change)?;
        Ok(replica_of(change.actor_id()))
    }

    fn replica_id(&self, doc: &TranscriptDoc) -> ReplicaId {
        doc.replica.clone()
    }

    fn apply_changes(
        &self,
        doc: &TranscriptDoc,
        changes: &[Vec<u8>],
    ) -> Result<TranscriptDoc, DocumentError> {
        let changes = changes
            .iter()
            .map(|bytes| Change::try_from(bytes.as_slice()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut next = doc.doc.clone();
        next.apply_changes(changes)?;
        Ok(TranscriptDoc::new(next)?)
    }

    fn load_snapshot(&self, snapshot: &[u8]) -> Result<TranscriptDoc, DocumentError> {
        // A loaded document belongs to a new random actor
        let doc = Automerge::load(snapshot)?;
        Ok(TranscriptDoc::new(doc)?)
    }

    fn save_snapshot(&self, doc: &TranscriptDoc) -> Result<Vec<u8>, DocumentError> {
        Ok(doc.doc.save())
    }

    fn last_local_change(&self, doc: &TranscriptDoc) -> Option<Vec<u8>> {
        doc.doc
            .get_last_local_change()
            .map(|change| change.raw_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(name: &str) -> ReplicaId {
        ReplicaId::from_bytes(name.as_bytes())
    }

    fn atom(text: &str) -> Atom {
        Atom::new(text, 0.0, 1.0, 1.0)
    }

    fn hello(engine: &TranscriptEngine, doc: &TranscriptDoc, text: &str) -> TranscriptDoc {
        let index = doc.transcript().paragraphs.len();
        engine
            .edit(
                doc,
                vec![Op::push_paragraph("A", "en"), Op::push_atom(index, atom(text))],
            )
            .unwrap()
    }

    // ===========================================
    // Local edits
    // ===========================================

    #[test]
    fn empty_document_has_no_local_change() {
        let engine = TranscriptEngine::with_replica(r("R1"));
        let doc = engine.init_empty();
        assert_eq!(doc.replica(), &r("R1"));
        assert!(doc.transcript().paragraphs.is_empty());
        assert!(engine.last_local_change(&doc).is_none());
    }

    #[test]
    fn random_replicas_differ() {
        let engine = TranscriptEngine::new();
        assert_ne!(engine.init_empty().replica(), engine.init_empty().replica());
    }

    #[test]
    fn empty_documents_share_genesis() {
        let engine = TranscriptEngine::new();
        let a = engine.init_with_replica(r("R1"));
        let b = engine.init_with_replica(r("R2"));
        assert_eq!(a.heads(), b.heads());
        assert_eq!(a.heads().len(), 1);
    }

    #[test]
    fn edit_records_local_change() {
        let engine = TranscriptEngine::new();
        let doc = hello(&engine, &engine.init_with_replica(r("R1")), "hi");

        assert_eq!(doc.transcript().text(), "hi");
        let change = engine.last_local_change(&doc).unwrap();
        assert_eq!(engine.decode_change_author(&change).unwrap(), r("R1"));

        let doc = engine.edit(&doc, vec![Op::append_text(0, 0, "!")]).unwrap();
        assert_eq!(doc.transcript().text(), "hi!");
        assert_ne!(engine.last_local_change(&doc).unwrap(), change);
    }

    #[test]
    fn atom_fields_survive_materialization() {
        let engine = TranscriptEngine::new();
        let doc = engine
            .edit(
                &engine.init_empty(),
                vec![
                    Op::push_paragraph("A", "de"),
                    Op::push_atom(0, Atom::new(" Hallo", 1500.0, 2250.5, 0.75)),
                    Op::SetSpeaker {
                        paragraph: 0,
                        speaker: "B".into(),
                    },
                ],
            )
            .unwrap();

        let paragraph = &doc.transcript().paragraphs[0];
        assert_eq!(paragraph.speaker, "B");
        assert_eq!(paragraph.lang, "de");
        assert_eq!(paragraph.children, vec![Atom::new(" Hallo", 1500.0, 2250.5, 0.75)]);
    }

    #[test]
    fn out_of_range_ops_are_skipped() {
        let engine = TranscriptEngine::new();
        let doc = engine.init_empty();
        let edited = engine
            .edit(
                &doc,
                vec![
                    Op::push_atom(3, atom("lost")),
                    Op::append_text(0, 0, "lost"),
                    Op::SetSpeaker {
                        paragraph: 9,
                        speaker: "B".into(),
                    },
                ],
            )
            .unwrap();
        assert!(edited.transcript().paragraphs.is_empty());
        assert!(engine.last_local_change(&edited).is_none());
    }

    // ===========================================
    // Merging
    // ===========================================

    #[test]
    fn apply_is_idempotent() {
        let engine = TranscriptEngine::new();
        let remote = hello(&engine, &engine.init_with_replica(r("R2")), "ab");
        let change = engine.last_local_change(&remote).unwrap();

        let local = engine.init_with_replica(r("R1"));
        let once = engine.apply_changes(&local, &[change.clone()]).unwrap();
        let twice = engine.apply_changes(&once, &[change]).unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.transcript().text(), "ab");
        assert_eq!(twice.heads(), remote.heads());
        assert_eq!(twice.replica(), &r("R1"));
    }

    #[test]
    fn concurrent_paragraph_appends_keep_their_atoms() {
        let engine = TranscriptEngine::new();
        let a = hello(&engine, &engine.init_with_replica(r("R1")), "x");
        let b = engine
            .edit(
                &engine.init_with_replica(r("R2")),
                vec![Op::push_paragraph("B", "en"), Op::push_atom(0, atom("y"))],
            )
            .unwrap();

        let a_change = engine.last_local_change(&a).unwrap();
        let b_change = engine.last_local_change(&b).unwrap();
        let a = engine.apply_changes(&a, &[b_change]).unwrap();
        let b = engine.apply_changes(&b, &[a_change]).unwrap();

        assert_eq!(a.transcript(), b.transcript());
        let paragraphs = &a.transcript().paragraphs;
        assert_eq!(paragraphs.len(), 2);
        for (speaker, text) in [("A", "x"), ("B", "y")] {
            let p = paragraphs.iter().find(|p| p.speaker == speaker).unwrap();
            assert_eq!(p.text(), text);
        }
    }

    #[test]
    fn concurrent_atoms_in_shared_paragraph_converge() {
        let engine = TranscriptEngine::new();
        let base = engine
            .edit(
                &engine.init_with_replica(r("R1")),
                vec![Op::push_paragraph("A", "en")],
            )
            .unwrap();
        let other = engine
            .apply_changes(
                &engine.init_with_replica(r("R2")),
                &[engine.last_local_change(&base).unwrap()],
            )
            .unwrap();

        let a = engine.edit(&base, vec![Op::push_atom(0, atom("x"))]).unwrap();
        let b = engine.edit(&other, vec![Op::push_atom(0, atom("y"))]).unwrap();
        let a_change = engine.last_local_change(&a).unwrap();
        let b_change = engine.last_local_change(&b).unwrap();
        let a = engine.apply_changes(&a, &[b_change]).unwrap();
        let b = engine.apply_changes(&b, &[a_change]).unwrap();

        assert_eq!(a.transcript(), b.transcript());
        assert_eq!(a.transcript().paragraphs.len(), 1);
        let text = a.transcript().text();
        assert!(text == "xy" || text == "yx", "unexpected merge: {text}");
    }

    #[test]
    fn concurrent_appends_to_one_atom_keep_both() {
        let engine = TranscriptEngine::new();
        let base = hello(&engine, &engine.init_with_replica(r("R1")), "ab");
        let other = engine
            .apply_changes(
                &engine.init_with_replica(r("R2")),
                &[engine.last_local_change(&base).unwrap()],
            )
            .unwrap();

        let a = engine.edit(&base, vec![Op::append_text(0, 0, "1")]).unwrap();
        let b = engine.edit(&other, vec![Op::append_text(0, 0, "2")]).unwrap();
        let merged = engine
            .apply_changes(&a, &[engine.last_local_change(&b).unwrap()])
            .unwrap();

        let text = merged.transcript().text();
        assert!(text == "ab12" || text == "ab21", "unexpected merge: {text}");
    }

    // ===========================================
    // Snapshots and bad input
    // ===========================================

    #[test]
    fn snapshot_roundtrip_assigns_new_replica() {
        let engine = TranscriptEngine::new();
        let doc = hello(&engine, &engine.init_with_replica(r("R1")), "snap");

        let bytes = engine.save_snapshot(&doc).unwrap();
        let loaded = engine.load_snapshot(&bytes).unwrap();

        assert_eq!(loaded.transcript(), doc.transcript());
        assert_ne!(loaded.replica(), doc.replica());
        // Nothing in the snapshot was authored by the new replica
        assert!(engine.last_local_change(&loaded).is_none());
    }

    #[test]
    fn loaded_snapshot_accepts_later_changes() {
        let engine = TranscriptEngine::new();
        let server = hello(&engine, &engine.init_with_replica(r("S")), "one");
        let loaded = engine
            .load_snapshot(&engine.save_snapshot(&server).unwrap())
            .unwrap();

        let server = hello(&engine, &server, "two");
        let merged = engine
            .apply_changes(&loaded, &[engine.last_local_change(&server).unwrap()])
            .unwrap();
        assert_eq!(merged.transcript().text(), "onetwo");
    }

    #[test]
    fn corrupt_bytes_are_errors() {
        let engine = TranscriptEngine::new();
        let doc = engine.init_empty();
        assert!(matches!(
            engine.decode_change_author(b"nope"),
            Err(DocumentError::Change(_))
        ));
        assert!(engine.apply_changes(&doc, &[b"nope".to_vec()]).is_err());
        assert!(engine.load_snapshot(b"nope").is_err());
    }
}
