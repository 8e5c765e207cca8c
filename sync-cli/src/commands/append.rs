//! Append a paragraph to a document.

use anyhow::{Context, Result};
use docsync_client::{Session, SessionConfig, WebSocketTransport};
use docsync_core::TranscriptEngine;
use std::sync::Arc;
use std::time::Duration;

use super::append_paragraph;

/// Time given to the transport to flush the change before closing.
const FLUSH_DELAY: Duration = Duration::from_millis(500);

/// Run the append command.
pub async fn run(
    config: SessionConfig,
    text: &str,
    speaker: &str,
    lang: &str,
    timeout: Duration,
) -> Result<()> {
    let address = config.address.clone();
    let transport = WebSocketTransport::with_config(config.websocket());
    let session = Session::start(config, Arc::new(TranscriptEngine::new()), transport, || {})
        .await
        .with_context(|| format!("Failed to join {}", address))?;

    let mut editor = session.editor();
    println!("Joining {}...", address);
    tokio::time::timeout(timeout, editor.wait_synced())
        .await
        .map_err(|_| anyhow::anyhow!("Timed out after {:?} waiting for initial sync", timeout))?
        .context("Session closed before initial sync")?;

    let (text, speaker, lang) = (text.to_string(), speaker.to_string(), lang.to_string());
    let document = editor
        .edit(move |engine, doc| append_paragraph(engine, doc, &speaker, &lang, &text))
        .await
        .context("Failed to apply edit")?;
    println!(
        "Appended; document now has {} paragraphs",
        document.transcript().paragraphs.len()
    );

    tokio::time::sleep(FLUSH_DELAY).await;
    session.shutdown().await;
    Ok(())
}
