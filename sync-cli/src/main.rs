//! # sync-cli
//!
//! CLI tool for watching and editing docsync documents.
//!
//! ## Commands
//!
//! - `watch`: Join a document and print it on every change
//! - `append`: Join a document, append a paragraph, leave
//! - `demo`: Run a scripted session against an in-memory server
//!
//! ## Example
//!
//! ```bash
//! # Follow a document
//! docsync watch ws://localhost:8000/api/v1/documents/sync/abc/
//!
//! # Add a paragraph
//! docsync append ws://localhost:8000/api/v1/documents/sync/abc/ --text "Hello"
//!
//! # See the protocol in action without a server
//! docsync demo
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{append, demo, watch};

/// CLI tool for watching and editing docsync documents.
#[derive(Parser, Debug)]
#[command(name = "docsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Join a document and print it whenever it changes
    Watch {
        /// WebSocket address of the document
        address: String,

        /// Session config file (TOML)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Print the document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Append a paragraph to a document
    Append {
        /// WebSocket address of the document
        address: String,

        /// Text of the new paragraph
        #[arg(long, short)]
        text: String,

        /// Speaker label
        #[arg(long, default_value = docsync_types::UNKNOWN_SPEAKER)]
        speaker: String,

        /// Language code
        #[arg(long, default_value = "en")]
        lang: String,

        /// Seconds to wait for the initial sync
        #[arg(long, default_value = "10")]
        timeout: u64,

        /// Session config file (TOML)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Run a scripted session against an in-memory server
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match cli.command {
        Commands::Watch {
            address,
            config,
            json,
        } => {
            let config = commands::session_config(&address, config.as_deref())?;
            watch::run(config, json).await?;
        }
        Commands::Append {
            address,
            text,
            speaker,
            lang,
            timeout,
            config,
        } => {
            let config = commands::session_config(&address, config.as_deref())?;
            append::run(config, &text, &speaker, &lang, Duration::from_secs(timeout)).await?;
        }
        Commands::Demo => {
            demo::run().await?;
        }
    }

    Ok(())
}

/// Install the global tracing subscriber (`RUST_LOG`, default `info`).
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch() {
        let cli = Cli::try_parse_from(["docsync", "watch", "ws://h/doc", "--json"]).unwrap();
        match cli.command {
            Commands::Watch {
                address,
                config,
                json,
            } => {
                assert_eq!(address, "ws://h/doc");
                assert!(config.is_none());
                assert!(json);
            }
            other => panic!("Expected Watch, got {:?}", other),
        }
    }

    #[test]
    fn append_has_defaults() {
        let cli =
            Cli::try_parse_from(["docsync", "--log-json", "append", "ws://h/doc", "-t", "hi"])
                .unwrap();
        assert!(cli.log_json);
        match cli.command {
            Commands::Append {
                text,
                speaker,
                lang,
                timeout,
                ..
            } => {
                assert_eq!(text, "hi");
                assert_eq!(speaker, "Speaker 1");
                assert_eq!(lang, "en");
                assert_eq!(timeout, 10);
            }
            other => panic!("Expected Append, got {:?}", other),
        }
    }

    #[test]
    fn append_requires_text() {
        assert!(Cli::try_parse_from(["docsync", "append", "ws://h/doc"]).is_err());
    }
}
