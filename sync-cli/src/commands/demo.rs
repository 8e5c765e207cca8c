//! Scripted session against an in-memory server.
//!
//! Plays the server side over a [`MockTransport`]: a remote change from
//! another replica, the backlog marker, then an echo of our own edit.

use anyhow::{ensure, Context, Result};
use docsync_client::{EditorHandle, MockTransport, Session, SessionConfig};
use docsync_core::{CrdtEngine, TranscriptDoc, TranscriptEngine};
use docsync_types::{Frame, ReplicaId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::append_paragraph;

const DEMO_ADDRESS: &str = "ws://demo.invalid/api/v1/documents/sync/demo/";

/// Run the demo and print each step.
pub async fn run() -> Result<()> {
    let transport = MockTransport::new();
    let engine = Arc::new(TranscriptEngine::with_replica(ReplicaId::from_bytes(b"R1")));
    let synced = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&synced);

    let session = Session::start(
        SessionConfig::new(DEMO_ADDRESS),
        Arc::clone(&engine),
        transport.clone(),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    )
    .await
    .context("Failed to start demo session")?;
    let mut editor = session.editor();
    println!("1. Joined as replica {}", editor.document().replica());

    // Another replica inserts two characters
    let remote = {
        let other = TranscriptEngine::new();
        let doc = other.init_with_replica(ReplicaId::from_bytes(b"R2"));
        let doc = append_paragraph(&other, &doc, "R2", "en", "hi")?;
        other
            .last_local_change(&doc)
            .context("remote edit produced no change")?
    };
    transport.queue_frame(Frame::change(remote).to_bytes());
    let document = wait_for(&mut editor, |doc| !doc.transcript().is_empty()).await?;
    println!("2. Remote change applied: {:?}", document.transcript().text());

    transport.queue_frame(Frame::backlog_complete().to_bytes());
    editor.wait_synced().await?;
    println!(
        "3. Backlog complete, initial sync callback ran {} time(s)",
        synced.load(Ordering::SeqCst)
    );

    let document = editor
        .edit(|engine, doc| append_paragraph(engine, doc, "R1", "en", "!"))
        .await?;
    let sent = transport
        .last_sent()
        .context("local edit was not sent")?;
    let frame = Frame::from_bytes(&sent)?;
    let author = engine.decode_change_author(&frame.payload)?;
    println!(
        "4. Typed one character; sent {:?} frame authored by {}",
        frame.kind()?,
        author
    );

    // The server echoes our change back; a later remote frame marks the
    // point where the echo has been handled
    transport.queue_frame(sent);
    transport.queue_frame(Frame::backlog_complete().to_bytes());
    transport.queue_frame(vec![99, 0xde, 0xad]);
    let marker = {
        let other = TranscriptEngine::new();
        let doc = other.init_with_replica(ReplicaId::from_bytes(b"R3"));
        let doc = append_paragraph(&other, &doc, "R3", "en", ".")?;
        other
            .last_local_change(&doc)
            .context("marker edit produced no change")?
    };
    let expected = engine.apply_changes(&document, std::slice::from_ref(&marker))?;
    transport.queue_frame(Frame::change(marker).to_bytes());
    let document = wait_for(&mut editor, |doc| doc.transcript().paragraphs.len() == 3).await?;
    ensure!(document == expected, "echo changed the document");
    ensure!(
        synced.load(Ordering::SeqCst) == 1,
        "initial sync callback ran more than once"
    );
    println!(
        "5. Echo of our own change dropped; document: {:?}",
        document.transcript().text()
    );

    session.shutdown().await;
    println!(
        "6. Session closed after sending {} frame(s)",
        transport.sent_messages().len()
    );
    Ok(())
}

/// Wait until the document satisfies `ready`.
async fn wait_for<F>(editor: &mut EditorHandle<TranscriptEngine>, ready: F) -> Result<TranscriptDoc>
where
    F: Fn(&TranscriptDoc) -> bool,
{
    let mut document = editor.document();
    while !ready(&document) {
        document = editor.changed().await?;
    }
    Ok(document)
}
