//! Follow a document and print it on every change.

use anyhow::{Context, Result};
use docsync_client::{Session, SessionConfig, SessionEvent, WebSocketTransport};
use docsync_core::TranscriptEngine;
use docsync_types::Transcript;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Run the watch command until Ctrl-C.
pub async fn run(config: SessionConfig, json: bool) -> Result<()> {
    let address = config.address.clone();
    let transport = WebSocketTransport::with_config(config.websocket());
    let session = Session::start(config, Arc::new(TranscriptEngine::new()), transport, || {
        tracing::info!("Document is up to date");
    })
    .await
    .with_context(|| format!("Failed to join {}", address))?;

    let mut editor = session.editor();
    let mut events = session.events();
    println!("Watching {} (Ctrl-C to stop)", address);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = editor.changed() => {
                let document = changed?;
                println!("{}", render(document.transcript(), json)?);
            }
            event = events.recv() => match event {
                Ok(SessionEvent::ConnectionLost { reason }) => {
                    eprintln!("Connection lost ({}), reconnecting...", reason);
                }
                Ok(SessionEvent::FrameRejected { reason }) => {
                    eprintln!("Skipped a frame: {}", reason);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.shutdown().await;
    Ok(())
}

/// Render a transcript as JSON or as one line per language block.
pub fn render(transcript: &Transcript, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(transcript).context("Failed to serialize document");
    }

    let mut out = String::from("---");
    for (lang, atoms) in transcript.lang_blocks() {
        let text: String = atoms.iter().map(|a| a.text.as_str()).collect();
        out.push_str(&format!("\n[{}] {}", lang, text));
    }
    Ok(out)
}
