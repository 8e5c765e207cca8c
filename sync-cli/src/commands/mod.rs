//! CLI command implementations.

pub mod append;
pub mod demo;
pub mod watch;

use anyhow::{Context, Result};
use docsync_client::SessionConfig;
use docsync_core::{DocumentError, Op, TranscriptDoc, TranscriptEngine};
use docsync_types::Atom;
use std::path::Path;

/// Build the session config: the file if given, with `address` taking
/// precedence over the file's.
pub fn session_config(address: &str, path: Option<&Path>) -> Result<SessionConfig> {
    let config = match path {
        Some(path) => {
            let mut config = SessionConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            config.address = address.to_string();
            config
        }
        None => SessionConfig::new(address),
    };
    config.validate().context("Invalid session config")?;
    Ok(config)
}

/// Append a one-atom paragraph after the end of the transcript.
pub fn append_paragraph(
    engine: &TranscriptEngine,
    doc: &TranscriptDoc,
    speaker: &str,
    lang: &str,
    text: &str,
) -> Result<TranscriptDoc, DocumentError> {
    let transcript = doc.transcript();
    let start = transcript.end().unwrap_or(0.0);
    let index = transcript.paragraphs.len();
    engine.edit(
        doc,
        vec![
            Op::push_paragraph(speaker, lang),
            Op::push_atom(index, Atom::new(text, start, start + 1000.0, 1.0)),
        ],
    )
}
